//! Orchestration Layer
//!
//! This crate provides orchestration for the fluid solver, including:
//! - JSON configuration parsing and validation
//! - Initial particle placement
//! - Simulation runner with lifecycle management

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod runner;

pub use config::SimulationConfig;
pub use runner::{RunnerState, SimulationRunner};

use solver::FluidSolver;

/// Create a complete simulation from a configuration file
///
/// This function performs the full setup pipeline:
/// 1. Load and validate the configuration
/// 2. Seed the initial particle clusters
/// 3. Build the fluid solver
/// 4. Wrap it in a [`SimulationRunner`] for lifecycle management
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let runner = create_simulation("config/two_blocks.json")?;
/// runner.start();
/// // ... query status, pause, resume, inject motion, etc.
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(
    config_path: &str,
) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    tracing::info!("Creating simulation from config: {}", config_path);

    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    create_from_config(&config)
}

/// Create a simulation runner from an already-validated configuration
pub fn create_from_config(
    config: &SimulationConfig,
) -> Result<SimulationRunner, Box<dyn std::error::Error>> {
    let particles = domain::seed_two_clusters(config)?;
    let solver = FluidSolver::new(config.to_params(), particles)?;

    tracing::info!("Simulation ready to start");
    Ok(SimulationRunner::new(solver, config.max_frames))
}
