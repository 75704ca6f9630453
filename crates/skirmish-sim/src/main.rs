//! # Skirmish Sim
//!
//! Headless host for the Skirmish AI core.
//!
//! Spawns two small teams on a sandbox world, hands out orders and runs
//! the fixed-step scheduler until one side is wiped out or time runs out.
//!
//! Usage: `skirmish-sim [config.toml] [seconds]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod combat;
mod demo;

use std::path::PathBuf;

use anyhow::{Context, Result};
use skirmish_ai::AiConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Simulated seconds when none are given.
const DEFAULT_SECONDS: f64 = 60.0;

/// Command line options.
#[derive(Debug, Clone, PartialEq)]
struct Options {
    config_path: Option<PathBuf>,
    seconds: f64,
}

impl Options {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter();
        let config_path = args.next().map(PathBuf::from);
        let seconds = match args.next() {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s > 0.0)
                .with_context(|| format!("invalid duration '{raw}'"))?,
            None => DEFAULT_SECONDS,
        };
        Ok(Self {
            config_path,
            seconds,
        })
    }

    /// Loads the config, writing the defaults out when the file is missing.
    fn load_config(&self) -> Result<AiConfig> {
        let Some(path) = &self.config_path else {
            return Ok(AiConfig::default());
        };
        if !path.exists() {
            AiConfig::default()
                .save_to(path)
                .with_context(|| format!("writing default config to {}", path.display()))?;
        }
        Ok(AiConfig::load_from(path))
    }
}

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("skirmish=info".parse()?))
        .init();

    info!("Skirmish sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let options = Options::parse(std::env::args().skip(1))?;
    let config = options.load_config()?;

    let summary = demo::Skirmish::setup(config)?.run(options.seconds)?;

    info!(
        "Finished after {} ticks ({:.1}s): blue={} red={}",
        summary.ticks, summary.seconds, summary.blue_alive, summary.red_alive
    );
    info!(
        "Shots={} hits={} kills={} damage={:.0} faults={} events={}",
        summary.combat.shots,
        summary.combat.hits,
        summary.combat.kills,
        summary.combat.damage,
        summary.faults,
        summary.events
    );
    Ok(())
}
