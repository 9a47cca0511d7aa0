//! This module provides the EquilibriumSolver, which derives the kinetic
//! equations from a model snapshot and integrates them to the simulation
//! horizon

use indexmap::IndexMap;
use log::debug;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::configuration::{IntegrationMethod, CONFIGURATION};
use crate::reaction_network::model::{Model, ModelError};
use crate::reaction_network::species_index::SpeciesIndex;
use crate::simulate::kinetics::MassActionKinetics;
use crate::simulate::ode::{dormand_prince, sdirk, OdeError, OdeOptions, OdeSystem};
use crate::simulate::rate_law::RateLawTable;
use crate::simulate::stoichiometry::stoichiometry_matrix;

/// Where the solver currently is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// Structures derived from the model snapshot; no integration run yet
    Configured,
    /// The last integration completed and produced a finite trajectory
    Solved,
    /// The last integration failed or produced non-finite concentrations
    Failed,
}

/// Solves a reaction network for its equilibrium state
///
/// Construction derives the species index, stoichiometry, rate laws, and
/// coefficient matrices from a [`Model`] snapshot. The solver does not track
/// later mutations of the model it was built from; reconfigure through
/// [`EquilibriumSolver::equilibrium_solution`] overrides instead.
///
/// A solver instance is not reentrant: one `equilibrium_solution` call should
/// run to completion before the next. Separate instances share no state and
/// may run in parallel.
#[derive(Clone, Debug)]
pub struct EquilibriumSolver {
    model: Model,
    species_index: SpeciesIndex,
    stoichiometry: DMatrix<f64>,
    rate_laws: RateLawTable,
    kinetics: MassActionKinetics,
    initial_conditions: DVector<f64>,
    method: IntegrationMethod,
    options: OdeOptions,
    num_samples: usize,
    status: SolverStatus,
}

impl EquilibriumSolver {
    /// Derive a solver from a model snapshot
    pub fn new(model: Model) -> EquilibriumSolver {
        let species_index = SpeciesIndex::build(model.reactions());
        let stoichiometry = stoichiometry_matrix(&species_index, model.reactions());
        let rate_laws = RateLawTable::from_reactions(&species_index, model.reactions());
        let kinetics = MassActionKinetics::from_reactions(&species_index, model.reactions());
        let configuration = CONFIGURATION.read().expect("configuration lock poisoned");
        let options = OdeOptions {
            rtol: configuration.rtol,
            atol: configuration.atol,
            ..Default::default()
        };
        let mut solver = EquilibriumSolver {
            model,
            species_index,
            stoichiometry,
            rate_laws,
            kinetics,
            initial_conditions: DVector::zeros(0),
            method: configuration.method,
            options,
            num_samples: configuration.num_samples,
            status: SolverStatus::Configured,
        };
        solver.setup_initial_conditions();
        solver
    }

    /// Select the integration method for subsequent solves
    pub fn with_method(mut self, method: IntegrationMethod) -> EquilibriumSolver {
        self.method = method;
        self
    }

    /// Override the integrator tolerances and step limits
    pub fn with_options(mut self, options: OdeOptions) -> EquilibriumSolver {
        self.options = options;
        self
    }

    /// Override the number of trajectory samples returned per solve
    ///
    /// Values below one are clamped to a single sample so the trajectory is
    /// never empty.
    pub fn with_num_samples(mut self, num_samples: usize) -> EquilibriumSolver {
        self.num_samples = num_samples.max(1);
        self
    }

    /// Rebuild the initial concentration vector from the model's current
    /// initial conditions (species without an entry start at zero)
    fn setup_initial_conditions(&mut self) {
        let mut x0 = DVector::zeros(self.species_index.len());
        for (symbol, idx) in self.species_index.iter() {
            if let Some(&value) = self.model.initial_conditions().get(symbol) {
                x0[idx] = value;
            }
        }
        self.initial_conditions = x0;
    }

    pub fn species_index(&self) -> &SpeciesIndex {
        &self.species_index
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    /// The model snapshot this solver was derived from
    pub fn model(&self) -> &Model {
        &self.model
    }

    fn check_rate_constants(&self, k: &DVector<f64>) -> Result<(), SolverError> {
        let expected = 2 * self.model.reactions().len();
        if k.len() != expected {
            return Err(SolverError::RateConstantDimension {
                expected,
                actual: k.len(),
            });
        }
        for (index, &value) in k.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SolverError::InvalidRateConstant { index, value });
            }
        }
        Ok(())
    }

    /// Integrate the network from `t = 0` to the simulation horizon and
    /// return the resulting trajectory
    ///
    /// # Parameters
    /// - `initial_conditions`: optional replacement initial concentrations,
    ///   validated against the model before any solver state changes; on
    ///   validation failure the model and solver keep their prior state.
    /// - `rate_constants`: optional replacement rate-constant vector of
    ///   length `2J`, ordered forward block then reverse block following the
    ///   model's reaction order (print the model to confirm the order).
    ///
    /// The trajectory is sampled on an evenly spaced grid; its columns are
    /// addressed through the returned
    /// [`species index`](EquilibriumSolution::species_index), and its final
    /// row is the equilibrium estimate.
    pub fn equilibrium_solution(
        &mut self,
        initial_conditions: Option<IndexMap<String, f64>>,
        rate_constants: Option<DVector<f64>>,
    ) -> Result<EquilibriumSolution, SolverError> {
        // Validate everything before touching solver state
        if let Some(k) = &rate_constants {
            self.check_rate_constants(k)?;
        }
        if let Some(ic) = initial_conditions {
            self.model.set_initial_conditions(ic)?;
            self.setup_initial_conditions();
        }

        let t_max = self.model.simulation_time();
        debug!(
            "solving {} species / {} reactions to t = {t_max} with {:?}",
            self.species_index.len(),
            self.model.reactions().len(),
            self.method
        );

        let solution = match self.method {
            IntegrationMethod::DormandPrince => {
                let rate_laws = match &rate_constants {
                    Some(k) => self.rate_laws.with_rate_constants(k),
                    None => self.rate_laws.clone(),
                };
                let system = BasicNetworkSystem {
                    stoichiometry: &self.stoichiometry,
                    rate_laws: &rate_laws,
                };
                dormand_prince(&system, &self.initial_conditions, 0.0, t_max, &self.options)
            }
            IntegrationMethod::Sdirk => {
                let kinetics = match &rate_constants {
                    Some(k) => self.kinetics.with_rate_constants(k),
                    None => self.kinetics.clone(),
                };
                let system = JacobianNetworkSystem {
                    kinetics: &kinetics,
                };
                sdirk(&system, &self.initial_conditions, 0.0, t_max, &self.options)
            }
        };
        let solution = match solution {
            Ok(solution) => solution,
            Err(e) => {
                self.status = SolverStatus::Failed;
                return Err(SolverError::Integration(e));
            }
        };

        let times = linspace(0.0, t_max, self.num_samples);
        let trajectory = solution.resample(&times);
        if let Some(sample) = first_non_finite_row(&trajectory) {
            self.status = SolverStatus::Failed;
            return Err(SolverError::NumericalFailure { sample });
        }

        self.status = SolverStatus::Solved;
        Ok(EquilibriumSolution {
            species_index: self.species_index.clone(),
            trajectory,
            times,
        })
    }
}

/// Basic formulation: per-slot rate laws combined through the `N x 2J`
/// stoichiometry matrix; the integrator falls back to a finite-difference
/// Jacobian if it needs one
struct BasicNetworkSystem<'a> {
    stoichiometry: &'a DMatrix<f64>,
    rate_laws: &'a RateLawTable,
}

impl OdeSystem for BasicNetworkSystem<'_> {
    fn dim(&self) -> usize {
        self.stoichiometry.nrows()
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) {
        dydt.copy_from(&(self.stoichiometry * self.rate_laws.rate_vector(y)));
    }
}

/// Jacobian-aware formulation: vectorized mass-action kinetics with the
/// analytic Jacobian supplied to the stiff integrator
struct JacobianNetworkSystem<'a> {
    kinetics: &'a MassActionKinetics,
}

impl OdeSystem for JacobianNetworkSystem<'_> {
    fn dim(&self) -> usize {
        self.kinetics.num_species()
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>) {
        dydt.copy_from(&self.kinetics.derivative(y));
    }

    fn jacobian(&self, _t: f64, y: &DVector<f64>, jac: &mut DMatrix<f64>) {
        jac.copy_from(&self.kinetics.jacobian(y));
    }
}

/// The solved time evolution of a reaction network
#[derive(Clone, Debug)]
pub struct EquilibriumSolution {
    species_index: SpeciesIndex,
    trajectory: DMatrix<f64>,
    times: DVector<f64>,
}

impl EquilibriumSolution {
    /// Mapping from species symbols to trajectory columns; callers must not
    /// assume any column order beyond what this mapping states
    pub fn species_index(&self) -> &SpeciesIndex {
        &self.species_index
    }

    /// `num_samples x N` matrix of concentrations over time
    pub fn trajectory(&self) -> &DMatrix<f64> {
        &self.trajectory
    }

    /// The evenly spaced sample times
    pub fn times(&self) -> &DVector<f64> {
        &self.times
    }

    /// The final sampled state, used as the equilibrium estimate
    pub fn equilibrium_state(&self) -> DVector<f64> {
        self.trajectory.row(self.trajectory.nrows() - 1).transpose()
    }

    /// Equilibrium concentration of one species
    pub fn equilibrium_of(&self, symbol: &str) -> Option<f64> {
        let col = self.species_index.index_of(symbol)?;
        Some(self.trajectory[(self.trajectory.nrows() - 1, col)])
    }
}

fn linspace(t0: f64, t1: f64, num_samples: usize) -> DVector<f64> {
    let step = (t1 - t0) / (num_samples.saturating_sub(1).max(1)) as f64;
    DVector::from_iterator(num_samples, (0..num_samples).map(|i| t0 + step * i as f64))
}

fn first_non_finite_row(trajectory: &DMatrix<f64>) -> Option<usize> {
    (0..trajectory.nrows()).find(|&row| trajectory.row(row).iter().any(|v| !v.is_finite()))
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("rate-constant vector must have length {expected} (2 per reaction), got {actual}")]
    RateConstantDimension { expected: usize, actual: usize },
    #[error("rate constant at position {index} must be finite and non-negative (got {value})")]
    InvalidRateConstant { index: usize, value: f64 },
    #[error(transparent)]
    Integration(#[from] OdeError),
    #[error("integration produced a non-finite concentration at sample {sample}")]
    NumericalFailure { sample: usize },
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::reaction_network::element::ReactionElement;
    use crate::reaction_network::reaction::Reaction;

    fn el(symbol: &str, coefficient: u32) -> ReactionElement {
        ReactionElement::new(symbol, coefficient).unwrap()
    }

    /// A <-> B with equal rate constants, A starting at 1.0
    fn setup_exchange_model() -> Model {
        let reactions =
            vec![Reaction::reversible(vec![el("A", 1)], vec![el("B", 1)], 0.5, 0.5).unwrap()];
        let ic = IndexMap::from([("A".to_string(), 1.0)]);
        Model::new(reactions, Some(ic), Some(30.0)).unwrap()
    }

    fn assert_exchange_equilibrium(method: IntegrationMethod) {
        let mut solver = EquilibriumSolver::new(setup_exchange_model())
            .with_method(method)
            .with_num_samples(2_000);
        let solution = solver.equilibrium_solution(None, None).unwrap();
        assert_eq!(solver.status(), SolverStatus::Solved);

        // Equal rate constants drive the exchange to equal concentrations
        assert_relative_eq!(solution.equilibrium_of("A").unwrap(), 0.5, epsilon = 1e-3);
        assert_relative_eq!(solution.equilibrium_of("B").unwrap(), 0.5, epsilon = 1e-3);

        // Mass conservation A + B = 1 at every sample
        let a = solution.species_index().index_of("A").unwrap();
        let b = solution.species_index().index_of("B").unwrap();
        for row in 0..solution.trajectory().nrows() {
            let total = solution.trajectory()[(row, a)] + solution.trajectory()[(row, b)];
            assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn exchange_reaches_equilibrium_dormand_prince() {
        assert_exchange_equilibrium(IntegrationMethod::DormandPrince);
    }

    #[test]
    fn exchange_reaches_equilibrium_sdirk() {
        assert_exchange_equilibrium(IntegrationMethod::Sdirk);
    }

    #[test]
    fn unspecified_species_start_at_zero() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(100);
        let solution = solver.equilibrium_solution(None, None).unwrap();
        let b = solution.species_index().index_of("B").unwrap();
        assert_eq!(solution.trajectory()[(0, b)], 0.0);
    }

    #[test]
    fn repeated_solves_are_identical() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(500);
        let first = solver.equilibrium_solution(None, None).unwrap();
        let second = solver.equilibrium_solution(None, None).unwrap();
        assert_eq!(first.trajectory(), second.trajectory());
        assert_eq!(first.times(), second.times());
    }

    #[test]
    fn rejected_override_leaves_state_intact() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(500);
        let baseline = solver.equilibrium_solution(None, None).unwrap();

        let bad = IndexMap::from([("A".to_string(), -2.0)]);
        let err = solver.equilibrium_solution(Some(bad), None).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Model(ModelError::InvalidInitialCondition { .. })
        ));
        // Prior initial conditions still in effect
        assert_eq!(solver.model().initial_conditions().get("A"), Some(&1.0));
        let after = solver.equilibrium_solution(None, None).unwrap();
        assert_eq!(baseline.trajectory(), after.trajectory());
    }

    #[test]
    fn rejects_override_for_unknown_species() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(100);
        let bad = IndexMap::from([("Z".to_string(), 1.0)]);
        let err = solver.equilibrium_solution(Some(bad), None).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Model(ModelError::UnknownSpecies { .. })
        ));
    }

    #[test]
    fn accepts_initial_condition_override() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(2_000);
        let ic = IndexMap::from([("A".to_string(), 0.5), ("B".to_string(), 0.5)]);
        let solution = solver.equilibrium_solution(Some(ic), None).unwrap();
        // Already at equilibrium; the state should not move
        assert_relative_eq!(solution.equilibrium_of("A").unwrap(), 0.5, epsilon = 1e-4);
        assert_relative_eq!(solution.equilibrium_of("B").unwrap(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn rejects_wrong_rate_constant_dimension() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(100);
        let err = solver
            .equilibrium_solution(None, Some(DVector::from_vec(vec![0.5])))
            .unwrap_err();
        assert_eq!(
            err,
            SolverError::RateConstantDimension {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn rejects_negative_rate_constant_override() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(100);
        let err = solver
            .equilibrium_solution(None, Some(DVector::from_vec(vec![0.5, -0.1])))
            .unwrap_err();
        assert_eq!(
            err,
            SolverError::InvalidRateConstant {
                index: 1,
                value: -0.1
            }
        );
    }

    #[test]
    fn rate_constant_override_shifts_equilibrium() {
        let mut solver =
            EquilibriumSolver::new(setup_exchange_model()).with_num_samples(2_000);
        // Forward 0.9 / reverse 0.1 pushes the exchange toward B:
        // B/A = kf/kr = 9 at equilibrium
        let k = DVector::from_vec(vec![0.9, 0.1]);
        let solution = solver.equilibrium_solution(None, Some(k)).unwrap();
        assert_relative_eq!(solution.equilibrium_of("A").unwrap(), 0.1, epsilon = 1e-3);
        assert_relative_eq!(solution.equilibrium_of("B").unwrap(), 0.9, epsilon = 1e-3);
    }

    #[test]
    fn stiff_network_solves_with_jacobian() {
        // Widely separated rate constants make the exchange stiff
        let reactions =
            vec![Reaction::reversible(vec![el("A", 1)], vec![el("B", 1)], 1e4, 1e-2).unwrap()];
        let ic = IndexMap::from([("A".to_string(), 1.0)]);
        let model = Model::new(reactions, Some(ic), Some(10.0)).unwrap();
        let mut solver = EquilibriumSolver::new(model)
            .with_method(IntegrationMethod::Sdirk)
            .with_num_samples(1_000);
        let solution = solver.equilibrium_solution(None, None).unwrap();
        // Essentially all mass ends in B
        assert!(solution.equilibrium_of("B").unwrap() > 0.999);
    }

    #[test]
    fn runaway_network_fails_with_status() {
        // A -> 2A grows without bound; the solve must surface an error
        // instead of returning a trajectory full of non-finite values
        let reactions =
            vec![Reaction::irreversible(vec![el("A", 1)], vec![el("A", 2)], 100.0).unwrap()];
        let ic = IndexMap::from([("A".to_string(), 1.0)]);
        let model = Model::new(reactions, Some(ic), Some(30.0)).unwrap();
        let mut solver = EquilibriumSolver::new(model)
            .with_options(OdeOptions {
                max_steps: 10_000,
                ..Default::default()
            })
            .with_num_samples(100);
        assert!(solver.equilibrium_solution(None, None).is_err());
        assert_eq!(solver.status(), SolverStatus::Failed);
    }

    #[test]
    fn zero_sample_override_is_clamped() {
        let mut solver = EquilibriumSolver::new(setup_exchange_model()).with_num_samples(0);
        let solution = solver.equilibrium_solution(None, None).unwrap();
        // Clamped to a single sample, the initial state; accessors stay in
        // bounds
        assert_eq!(solution.trajectory().nrows(), 1);
        assert_eq!(solution.equilibrium_of("A"), Some(1.0));
    }

    #[test]
    fn second_order_network_equilibrium() {
        // 2A <-> B, kf = kr = 1: equilibrium satisfies [A]^2 = [B],
        // with mass conservation A + 2B = 2
        let reactions =
            vec![Reaction::reversible(vec![el("A", 2)], vec![el("B", 1)], 1.0, 1.0).unwrap()];
        let ic = IndexMap::from([("A".to_string(), 2.0)]);
        let model = Model::new(reactions, Some(ic), Some(30.0)).unwrap();
        let mut solver = EquilibriumSolver::new(model).with_num_samples(2_000);
        let solution = solver.equilibrium_solution(None, None).unwrap();
        let a = solution.equilibrium_of("A").unwrap();
        let b = solution.equilibrium_of("B").unwrap();
        assert_relative_eq!(a * a, b, epsilon = 1e-3);
        assert_relative_eq!(a + 2.0 * b, 2.0, epsilon = 1e-6);
    }
}
