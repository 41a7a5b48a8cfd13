use std::time::Duration;

use crate::error::SimError;

/// Minimum wall-clock spacing between two visible progress updates
pub const MIN_TICK: Duration = Duration::from_millis(500);
pub const MIN_MESH_RESOLUTION: usize = 6;
pub const MAX_MESH_RESOLUTION: usize = 14;
pub const MAX_CG_ITER: u64 = 20_000;
/// Conjugate gradient stops once the residual norm drops below this fraction
/// of the load vector norm
pub const CG_RELATIVE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min_resolution: usize,
    pub max_resolution: usize,
}

impl Default for MeshBounds {
    fn default() -> Self {
        MeshBounds {
            min_resolution: MIN_MESH_RESOLUTION,
            max_resolution: MAX_MESH_RESOLUTION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub mesh: MeshBounds,
    pub max_iters: u64,
    pub relative_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            mesh: MeshBounds::default(),
            max_iters: MAX_CG_ITER,
            relative_tolerance: CG_RELATIVE_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    pub min_tick: Duration,
    pub solver: SolverSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            min_tick: MIN_TICK,
            solver: SolverSettings::default(),
        }
    }
}

impl RunnerConfig {
    /// Builds a config from optional overrides, rejecting inconsistent values
    ///
    /// # Arguments
    /// * `min_tick_ms` - Progress throttle spacing in milliseconds
    /// * `min_resolution` - Smallest mesh resolution the solver may pick
    /// * `max_resolution` - Largest mesh resolution the solver may pick
    pub fn from_overrides(
        min_tick_ms: Option<u64>,
        min_resolution: Option<usize>,
        max_resolution: Option<usize>,
    ) -> Result<RunnerConfig, SimError> {
        let mut config = RunnerConfig::default();

        if let Some(ms) = min_tick_ms {
            config.min_tick = Duration::from_millis(ms);
        }
        if let Some(min) = min_resolution {
            config.solver.mesh.min_resolution = min;
        }
        if let Some(max) = max_resolution {
            config.solver.mesh.max_resolution = max;
        }

        let mesh = config.solver.mesh;
        if mesh.min_resolution == 0 {
            return Err(SimError::Input(
                "mesh resolution must be at least 1".to_owned(),
            ));
        }
        if mesh.min_resolution > mesh.max_resolution {
            return Err(SimError::Input(format!(
                "minimum mesh resolution {} exceeds maximum {}",
                mesh.min_resolution, mesh.max_resolution
            )));
        }

        Ok(config)
    }
}
