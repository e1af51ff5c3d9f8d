//! Configuration parsing and validation for fluid simulations

use serde::{Deserialize, Serialize};
use solver::{BoundaryMode, SimParams};
use std::fs;

/// Main simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Total particle count (fixed for the run)
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Simulation domain bounds
    #[serde(default)]
    pub domain: DomainBounds,
    /// SPH interaction radius (also the hash cell size)
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Gas stiffness constant of the equation of state
    #[serde(default = "default_gas_constant")]
    pub gas_constant: f32,
    /// Rest density of the fluid
    #[serde(default = "default_rest_density")]
    pub rest_density: f32,
    /// Per-particle mass
    #[serde(default = "default_particle_mass")]
    pub particle_mass: f32,
    /// Viscosity coefficient
    #[serde(default = "default_viscosity")]
    pub viscosity: f32,
    /// Downward gravity magnitude
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Fixed timestep (seconds)
    #[serde(default = "default_delta_time")]
    pub delta_time: f32,
    /// Hash table size (buckets)
    #[serde(default = "default_num_buckets")]
    pub num_buckets: usize,
    /// Scan/sort thread-group width
    #[serde(default = "default_group_width")]
    pub group_width: usize,
    /// Initial boundary plane set
    #[serde(default = "default_boundary_mode")]
    pub boundary_mode: BoundaryMode,
    /// Zero out negative pressures in the equation of state
    #[serde(default)]
    pub clamp_negative_pressure: bool,
    /// Boundary plane spring stiffness
    #[serde(default = "default_boundary_stiffness")]
    pub boundary_stiffness: f32,
    /// Boundary plane damping coefficient
    #[serde(default = "default_boundary_damping")]
    pub boundary_damping: f32,
    /// Edge length of the square particle block overwritten per motion
    /// injection
    #[serde(default = "default_injection_block")]
    pub injection_block: usize,
    /// Velocity assigned to injected particles
    #[serde(default = "default_injection_velocity")]
    pub injection_velocity: [f32; 3],
    /// Edge length of the initial particle clusters
    #[serde(default = "default_init_size")]
    pub init_size: f32,
    /// RNG seed for initial particle placement
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Stop after this many frames (run indefinitely when absent)
    pub max_frames: Option<u64>,
}

/// Domain bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainBounds {
    /// Minimum corner [x, y, z]
    pub min: [f32; 3],
    /// Maximum corner [x, y, z]
    pub max: [f32; 3],
}

impl Default for DomainBounds {
    fn default() -> Self {
        Self {
            min: [-10.0; 3],
            max: [10.0; 3],
        }
    }
}

// Default values
fn default_particle_count() -> usize {
    1 << 20
}

fn default_radius() -> f32 {
    1.0
}

fn default_gas_constant() -> f32 {
    2000.0
}

fn default_rest_density() -> f32 {
    10.0
}

fn default_particle_mass() -> f32 {
    1.0
}

fn default_viscosity() -> f32 {
    0.01
}

fn default_gravity() -> f32 {
    9.8
}

fn default_delta_time() -> f32 {
    0.001
}

fn default_num_buckets() -> usize {
    1 << 20
}

fn default_group_width() -> usize {
    1 << 10
}

fn default_boundary_mode() -> BoundaryMode {
    BoundaryMode::ClosedBox
}

fn default_boundary_stiffness() -> f32 {
    2000.0
}

fn default_boundary_damping() -> f32 {
    20.0
}

fn default_injection_block() -> usize {
    10
}

fn default_injection_velocity() -> [f32; 3] {
    [0.0, -70.0, 0.0]
}

fn default_init_size() -> f32 {
    10.0
}

fn default_seed() -> u64 {
    42
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        let config: SimulationConfig = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse config JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.particle_count == 0 {
            return Err("particle_count must be at least 1".to_string());
        }
        if self.init_size <= 0.0 {
            return Err("init_size must be positive".to_string());
        }
        if let Some(max_frames) = self.max_frames {
            if max_frames == 0 {
                return Err("max_frames must be at least 1".to_string());
            }
        }
        // Physics and pipeline parameters share validation with the solver.
        self.to_params().validate()
    }

    /// Solver parameters derived from this configuration
    pub fn to_params(&self) -> SimParams {
        SimParams {
            radius: self.radius,
            gas_constant: self.gas_constant,
            rest_density: self.rest_density,
            particle_mass: self.particle_mass,
            viscosity: self.viscosity,
            gravity: self.gravity,
            delta_time: self.delta_time,
            domain_min: self.domain.min,
            domain_max: self.domain.max,
            num_buckets: self.num_buckets,
            group_width: self.group_width,
            boundary_mode: self.boundary_mode,
            clamp_negative_pressure: self.clamp_negative_pressure,
            boundary_stiffness: self.boundary_stiffness,
            boundary_damping: self.boundary_damping,
            injection_block: self.injection_block,
            injection_velocity: self.injection_velocity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{ "name": "test" }"#
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SimulationConfig = serde_json::from_str(minimal_json()).unwrap();
        assert_eq!(config.particle_count, 1 << 20);
        assert_eq!(config.num_buckets, 1 << 20);
        assert_eq!(config.group_width, 1 << 10);
        assert_eq!(config.gas_constant, 2000.0);
        assert!(!config.clamp_negative_pressure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scan_bound_rejected() {
        let mut config: SimulationConfig = serde_json::from_str(minimal_json()).unwrap();
        // 1024 * 1024 buckets is the limit for a group width of 1024.
        config.num_buckets = 1024 * 1024;
        config.group_width = 1024;
        assert!(config.validate().is_ok());

        config.num_buckets = 1024 * 1024 + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_particles_rejected() {
        let mut config: SimulationConfig = serde_json::from_str(minimal_json()).unwrap();
        config.particle_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_domain_rejected() {
        let mut config: SimulationConfig = serde_json::from_str(minimal_json()).unwrap();
        config.domain.min = [5.0, -10.0, -10.0];
        config.domain.max = [-5.0, 10.0, 10.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn boundary_mode_uses_kebab_case_tokens() {
        for (token, mode) in [
            ("closed-box", BoundaryMode::ClosedBox),
            ("open-ground", BoundaryMode::OpenGround),
        ] {
            let json = format!(r#"{{ "name": "t", "boundary_mode": "{token}" }}"#);
            let config: SimulationConfig = serde_json::from_str(&json).unwrap();
            assert_eq!(config.boundary_mode, mode);
            assert!(serde_json::to_string(&config).unwrap().contains(token));
        }
        // Variant-name spellings are not part of the config surface.
        assert!(serde_json::from_str::<SimulationConfig>(
            r#"{ "name": "t", "boundary_mode": "ClosedBox" }"#
        )
        .is_err());
    }

    #[test]
    fn explicit_fields_parsed() {
        let json = r#"{
            "name": "two blocks",
            "particle_count": 65536,
            "domain": { "min": [-10, -10, -10], "max": [10, 10, 10] },
            "boundary_mode": "open-ground",
            "clamp_negative_pressure": true,
            "max_frames": 500
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.particle_count, 65536);
        assert_eq!(config.boundary_mode, BoundaryMode::OpenGround);
        assert!(config.clamp_negative_pressure);
        assert_eq!(config.max_frames, Some(500));
        assert!(config.validate().is_ok());
    }
}
