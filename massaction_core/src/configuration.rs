use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

pub struct Configuration {
    /// Simulation horizon (seconds) used when a model source supplies none
    pub default_simulation_time: f64,
    /// Number of evenly spaced samples in a returned trajectory
    pub num_samples: usize,
    /// Relative tolerance for the adaptive integrators
    pub rtol: f64,
    /// Absolute tolerance for the adaptive integrators
    pub atol: f64,
    /// Integration method used by solvers unless overridden
    pub method: IntegrationMethod,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            default_simulation_time: 30.0,
            num_samples: 100_000,
            rtol: 1e-6,
            atol: 1e-9,
            method: IntegrationMethod::DormandPrince,
        }
    }
}

/// Enum used to specify which integration method a solver should use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrationMethod {
    /// Explicit Dormand-Prince 4(5) pair with adaptive step control
    DormandPrince,
    /// L-stable SDIRK method driven by the analytic Jacobian, for stiff systems
    Sdirk,
}
