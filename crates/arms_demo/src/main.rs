//! # arms_demo
//!
//! Wires the coordinator, the built-in processors and a small emitter scene
//! together and runs them for a bounded number of frames.
//!
//! ## Startup Sequence
//!
//! 1. Resolve the enabled tags (`--config`, then `ARMS_ENABLED_TAGS`, then
//!    `--tags` on top).
//! 2. Register capabilities and build the coordinator.
//! 3. Install the world, populate the scene and run the frame loop.

mod scene;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use arms_builtin::{World, builtin_processors, register_builtin_capabilities};
use arms_component::CapabilityRegistry;
use arms_coordinator::{Coordinator, CoordinatorConfig, FrameConfig, FrameLoop};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arms_demo", about = "Run the emitter scene through the processor coordinator")]
struct Args {
    /// Number of frames to run (0 = until interrupted)
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Target frames per second
    #[arg(short = 'r', long, default_value_t = 60.0, value_parser = parse_tick_rate)]
    tick_rate: f64,

    /// Comma-separated cohort tags to enable, e.g. `Untagged,Debug`
    #[arg(short, long)]
    tags: Option<String>,

    /// JSON coordinator config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_tick_rate(value: &str) -> Result<f64, String> {
    let rate: f64 = value.parse().map_err(|e| format!("`{value}` is not a number: {e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("tick rate must be greater than zero, got {value}"))
    }
}

impl Args {
    fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        let config = match &self.config {
            Some(path) => CoordinatorConfig::load(path)
                .with_context(|| format!("loading coordinator config {}", path.display()))?,
            None => CoordinatorConfig::from_env(),
        };
        Ok(match &self.tags {
            Some(tags) => CoordinatorConfig::parse_tag_list(tags),
            None => config,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = args.coordinator_config()?;
    info!(tags = ?config.enabled_tags, frames = args.frames, tick_rate = args.tick_rate, "arms demo starting");

    let mut capabilities = CapabilityRegistry::new();
    register_builtin_capabilities(&mut capabilities)?;
    scene::register_capabilities(&mut capabilities)?;

    let mut registrations = builtin_processors();
    registrations.extend(scene::processors());
    let coordinator = Rc::new(Coordinator::new(config, &capabilities, registrations)?);

    let world = World::install(coordinator.clone());
    let warmed_up = Rc::new(Cell::new(false));
    let emitter = scene::populate(&world, warmed_up.clone())?;

    let frame_loop = FrameLoop::new(
        coordinator.clone(),
        FrameConfig {
            tick_rate: args.tick_rate,
            max_frames: args.frames,
        },
    );
    let frames = frame_loop.run()?;

    let fired = world
        .get::<scene::Emitter>(&emitter)
        .map(|c| c.get::<scene::Emitter>().map(|e| e.fired))
        .transpose()?
        .unwrap_or_default();
    info!(
        frames,
        fired,
        warmed_up = warmed_up.get(),
        entities = world.entity_count(),
        live_components = coordinator.live_component_count(),
        live_entities = coordinator.live_entity_count(),
        "arms demo finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_rate_must_be_positive() {
        assert_eq!(parse_tick_rate("30"), Ok(30.0));
        for bad in ["0", "-5", "NaN", "inf", "fast"] {
            assert!(parse_tick_rate(bad).is_err(), "{bad}");
        }
        assert!(Args::try_parse_from(["arms_demo", "--tick-rate", "0"]).is_err());
        assert_eq!(Args::try_parse_from(["arms_demo", "-r", "120"]).unwrap().tick_rate, 120.0);
    }
}
