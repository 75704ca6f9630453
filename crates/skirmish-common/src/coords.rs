//! Spatial helpers over world-space positions.
//!
//! World space is Y-up. Ground movement and formation spreads happen on the
//! XZ plane; only parachute descent touches the Y axis.

pub use glam::Vec3;

/// Returns `true` when every component of the position is finite.
#[must_use]
pub fn is_finite_position(pos: Vec3) -> bool {
    pos.x.is_finite() && pos.y.is_finite() && pos.z.is_finite()
}

/// Moves `from` toward `to` by at most `max_step` units.
///
/// Never overshoots: when the target is within `max_step` the result is
/// exactly `to`.
#[must_use]
pub fn steer_toward(from: Vec3, to: Vec3, max_step: f32) -> Vec3 {
    let delta = to - from;
    let dist = delta.length();
    if dist <= max_step.max(0.0) || dist < f32::EPSILON {
        return to;
    }
    from + delta / dist * max_step.max(0.0)
}

/// Distance between two positions projected on the ground plane.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Offset for slot `index` of `count` evenly spread on a ground-plane circle.
#[must_use]
pub fn circle_offset(index: usize, count: usize, radius: f32) -> Vec3 {
    if count == 0 {
        return Vec3::ZERO;
    }
    let angle = std::f32::consts::TAU * index as f32 / count as f32;
    Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
}

/// Point on the ring of `radius` around `center` closest to `pos`.
///
/// A position sitting exactly on the center projects along +X.
#[must_use]
pub fn project_to_ring(center: Vec3, pos: Vec3, radius: f32) -> Vec3 {
    let delta = pos - center;
    let dir = if delta.length_squared() < f32::EPSILON {
        Vec3::X
    } else {
        delta.normalize()
    };
    center + dir * radius
}
