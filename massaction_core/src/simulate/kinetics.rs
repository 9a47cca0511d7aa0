//! This module provides the vectorized mass-action kinetics of a reaction
//! network, including the analytic Jacobian used by the stiff integrator

use nalgebra::{DMatrix, DVector};

use crate::reaction_network::reaction::Reaction;
use crate::reaction_network::species_index::SpeciesIndex;
use crate::simulate::stoichiometry::{rate_constant_vector, row_of};

/// Coefficient matrices and rate constants of a reaction network, with
/// vectorized flux, derivative, and Jacobian evaluation
///
/// For `N` species and `J` reactions, `alpha[(i, j)]` is the reactant
/// coefficient of species `i` in reaction `j` (zero if absent) and
/// `gamma[(i, j)]` its product coefficient; `net = gamma - alpha` is the net
/// stoichiometry matrix. The rate-constant vector has length `2J`, forward
/// block first.
#[derive(Clone, Debug, PartialEq)]
pub struct MassActionKinetics {
    alpha: DMatrix<f64>,
    gamma: DMatrix<f64>,
    net: DMatrix<f64>,
    rate_constants: DVector<f64>,
}

impl MassActionKinetics {
    /// Build the coefficient matrices from the ordered reaction list
    pub fn from_reactions(index: &SpeciesIndex, reactions: &[Reaction]) -> MassActionKinetics {
        let n = index.len();
        let j_count = reactions.len();
        let mut alpha = DMatrix::zeros(n, j_count);
        let mut gamma = DMatrix::zeros(n, j_count);
        for (q, rx) in reactions.iter().enumerate() {
            for reactant in rx.reactants() {
                alpha[(row_of(index, reactant.symbol()), q)] +=
                    f64::from(reactant.coefficient());
            }
            for product in rx.products() {
                gamma[(row_of(index, product.symbol()), q)] += f64::from(product.coefficient());
            }
        }
        let net = &gamma - &alpha;
        MassActionKinetics {
            alpha,
            gamma,
            net,
            rate_constants: rate_constant_vector(reactions),
        }
    }

    pub fn num_species(&self) -> usize {
        self.alpha.nrows()
    }

    pub fn num_reactions(&self) -> usize {
        self.alpha.ncols()
    }

    /// The net stoichiometry matrix `gamma - alpha`
    pub fn net_stoichiometry(&self) -> &DMatrix<f64> {
        &self.net
    }

    pub fn rate_constants(&self) -> &DVector<f64> {
        &self.rate_constants
    }

    /// Replace the rate constants with an externally supplied length-`2J`
    /// vector, ordered per the canonical reaction-order contract
    ///
    /// # Panics
    /// Panics if `k` does not have two entries per reaction.
    pub fn with_rate_constants(&self, k: &DVector<f64>) -> MassActionKinetics {
        assert_eq!(
            k.len(),
            2 * self.num_reactions(),
            "rate-constant vector must have two entries per reaction"
        );
        MassActionKinetics {
            rate_constants: k.clone(),
            ..self.clone()
        }
    }

    /// Mass-action product of one coefficient column:
    /// `prod_i x[i]^coeffs[(i, j)]` over nonzero coefficients
    fn availability(coeffs: &DMatrix<f64>, j: usize, x: &DVector<f64>) -> f64 {
        let mut product = 1.0;
        for i in 0..coeffs.nrows() {
            let e = coeffs[(i, j)];
            if e > 0.0 {
                product *= x[i].powi(e as i32);
            }
        }
        product
    }

    /// Net flux through each reaction at the state `x`:
    /// `c[j] = k[j] * theta[j] - k[j+J] * phi[j]` where `theta`/`phi` are the
    /// reactant/product availability terms
    pub fn flux(&self, x: &DVector<f64>) -> DVector<f64> {
        let j_count = self.num_reactions();
        let mut c = DVector::zeros(j_count);
        for j in 0..j_count {
            let theta = Self::availability(&self.alpha, j, x);
            let phi = Self::availability(&self.gamma, j, x);
            c[j] = self.rate_constants[j] * theta - self.rate_constants[j + j_count] * phi;
        }
        c
    }

    /// Instantaneous rate of change `dX/dt = net * flux(x)`
    pub fn derivative(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.net * self.flux(x)
    }

    /// Analytic Jacobian `d(dX/dt)_i / dX_s`, an `N x N` matrix
    ///
    /// Differentiating the availability monomial of reaction `j` with respect
    /// to species `s` gives `a_s * x[s]^(a_s - 1) * prod_{i != s} x[i]^a_i`.
    /// Only species with a nonzero coefficient in the column contribute; the
    /// `x[s]^(a_s - 1)` factor is never formed for `a_s == 0`, so no
    /// negative-exponent term is ever evaluated.
    pub fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n = self.num_species();
        let j_count = self.num_reactions();
        // v[(j, s)] = d(flux_j)/dx_s
        let mut v = DMatrix::zeros(j_count, n);
        for j in 0..j_count {
            for s in 0..n {
                let fwd = Self::availability_derivative(&self.alpha, j, s, x);
                if fwd != 0.0 {
                    v[(j, s)] += self.rate_constants[j] * fwd;
                }
                let rev = Self::availability_derivative(&self.gamma, j, s, x);
                if rev != 0.0 {
                    v[(j, s)] -= self.rate_constants[j + j_count] * rev;
                }
            }
        }
        &self.net * v
    }

    /// Partial derivative of one availability monomial with respect to `x[s]`
    fn availability_derivative(
        coeffs: &DMatrix<f64>,
        j: usize,
        s: usize,
        x: &DVector<f64>,
    ) -> f64 {
        let a_s = coeffs[(s, j)];
        if a_s == 0.0 {
            return 0.0;
        }
        let mut d = a_s * x[s].powi(a_s as i32 - 1);
        for i in 0..coeffs.nrows() {
            if i == s {
                continue;
            }
            let e = coeffs[(i, j)];
            if e > 0.0 {
                d *= x[i].powi(e as i32);
            }
        }
        d
    }
}
