//! # Squared-Exponential Kernel and Marginal Likelihood
//!
//! The 2-D (time × wavelength) covariance model of the interpolation stage
//! and its negative log marginal likelihood with analytic gradient, in the
//! shape the quasi-Newton optimizer consumes.
//!
//! ## Model
//! -----------------
//! `k(xᵢ, xⱼ) = v · exp(-0.5·(Δt²/m_t + Δw²/m_w))` with per-point noise
//! `σᵢ²` on the diagonal. The metric entries `m_t`, `m_w` are *squared*
//! length scales; the optimized parameter vector is `[ln v, ln m_t, ln m_w]`
//! so the positivity constraints disappear.
//!
//! ## Error Handling
//! -----------------
//! A covariance matrix that fails its Cholesky factorization is fatal: the
//! cost and gradient surface the failure as an optimizer error instead of
//! substituting a fallback value, and the caller aborts the light curve.
use argmin::core::{CostFunction, Error as ArgminError, Gradient};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::bolfit_errors::BolfitError;

/// Initial squared time length scale (days²).
pub const INITIAL_TIME_METRIC: f64 = 50.0;
/// Initial squared wavelength length scale (kilo-Angstrom²).
pub const INITIAL_WAVELENGTH_METRIC: f64 = 0.5;

/// Marginal-likelihood problem for one light curve.
///
/// Holds the precomputed squared coordinate differences, the per-point noise
/// variances and the mean-subtracted observations; hyperparameters arrive
/// through the optimizer as `[ln v, ln m_t, ln m_w]`.
#[derive(Debug, Clone)]
pub struct GpProblem {
    /// Pairwise squared time differences.
    dt2: DMatrix<f64>,
    /// Pairwise squared wavelength differences.
    dw2: DMatrix<f64>,
    /// Per-point noise variances `σᵢ²`.
    noise2: DVector<f64>,
    /// Observations minus the mean function.
    residuals: DVector<f64>,
}

impl GpProblem {
    /// Assemble the problem from inputs and mean-subtracted observations.
    ///
    /// Arguments
    /// -----------------
    /// * `inputs` – One `[time, wavelength]` row per observation.
    /// * `uncertainties` – Per-point 1-sigma noise, squared onto the diagonal.
    /// * `residuals` – Observed log-flux minus the mean function.
    pub fn new(inputs: &[[f64; 2]], uncertainties: &[f64], residuals: DVector<f64>) -> Self {
        let n = inputs.len();
        let dt2 = DMatrix::from_fn(n, n, |i, j| {
            let d = inputs[i][0] - inputs[j][0];
            d * d
        });
        let dw2 = DMatrix::from_fn(n, n, |i, j| {
            let d = inputs[i][1] - inputs[j][1];
            d * d
        });
        let noise2 = DVector::from_iterator(n, uncertainties.iter().map(|s| s * s));
        Self {
            dt2,
            dw2,
            noise2,
            residuals,
        }
    }

    fn n(&self) -> usize {
        self.residuals.len()
    }

    /// Noise-free covariance `K_se` for the given hyperparameters.
    fn covariance_se(&self, theta: &[f64]) -> DMatrix<f64> {
        let (v, m_t, m_w) = (theta[0].exp(), theta[1].exp(), theta[2].exp());
        let n = self.n();
        DMatrix::from_fn(n, n, |i, j| {
            v * (-0.5 * (self.dt2[(i, j)] / m_t + self.dw2[(i, j)] / m_w)).exp()
        })
    }

    /// Full covariance with the noise diagonal, factorized.
    ///
    /// Return
    /// ----------
    /// * The Cholesky factorization, or [`BolfitError::SingularCovariance`]
    ///   when the matrix is not positive definite.
    pub fn factorized_covariance(
        &self,
        theta: &[f64],
    ) -> Result<Cholesky<f64, Dyn>, BolfitError> {
        let mut k = self.covariance_se(theta);
        for i in 0..self.n() {
            k[(i, i)] += self.noise2[i];
        }
        k.cholesky().ok_or_else(|| {
            BolfitError::SingularCovariance("gaussian process hyperparameter search".to_string())
        })
    }

    /// Negative log marginal likelihood at `theta`.
    pub fn negative_log_likelihood(&self, theta: &[f64]) -> Result<f64, BolfitError> {
        let chol = self.factorized_covariance(theta)?;
        let alpha = chol.solve(&self.residuals);

        let log_det_half: f64 = {
            let l = chol.l();
            (0..self.n()).map(|i| l[(i, i)].ln()).sum()
        };

        Ok(0.5 * self.residuals.dot(&alpha)
            + log_det_half
            + 0.5 * self.n() as f64 * (2.0 * std::f64::consts::PI).ln())
    }

    /// Analytic gradient of the negative log marginal likelihood with respect
    /// to `[ln v, ln m_t, ln m_w]`.
    ///
    /// Uses `∂NLL/∂θ = -0.5·αᵀGα + 0.5·tr(K⁻¹G)` with `α = K⁻¹y` and `G` the
    /// kernel derivative for each log-parameter.
    pub fn negative_log_likelihood_gradient(
        &self,
        theta: &[f64],
    ) -> Result<Vec<f64>, BolfitError> {
        let (m_t, m_w) = (theta[1].exp(), theta[2].exp());
        let k_se = self.covariance_se(theta);
        let chol = self.factorized_covariance(theta)?;
        let alpha = chol.solve(&self.residuals);
        let k_inv = chol.inverse();

        let n = self.n();
        let mut grad = vec![0.0; 3];
        for i in 0..n {
            for j in 0..n {
                let se = k_se[(i, j)];
                // Kernel derivatives w.r.t. each log-parameter.
                let d = [
                    se,
                    se * 0.5 * self.dt2[(i, j)] / m_t,
                    se * 0.5 * self.dw2[(i, j)] / m_w,
                ];
                let quad = alpha[i] * alpha[j];
                let trace = k_inv[(i, j)];
                for (g, dk) in grad.iter_mut().zip(d) {
                    *g += (-0.5 * quad + 0.5 * trace) * dk;
                }
            }
        }
        Ok(grad)
    }
}

impl CostFunction for GpProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.negative_log_likelihood(theta)?)
    }
}

impl Gradient for GpProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        Ok(self.negative_log_likelihood_gradient(theta)?)
    }
}

#[cfg(test)]
mod test_gp_kernel {
    use super::*;

    fn sample_problem() -> GpProblem {
        let inputs = [
            [0.0, -0.5],
            [3.0, -0.5],
            [7.0, 0.5],
            [11.0, 0.5],
            [15.0, -0.5],
        ];
        let uncertainties = [0.1, 0.12, 0.08, 0.1, 0.15];
        let residuals = DVector::from_vec(vec![1.2, 1.9, 1.4, 0.6, -0.3]);
        GpProblem::new(&inputs, &uncertainties, residuals)
    }

    #[test]
    fn test_single_point_likelihood_is_analytic() {
        // For one observation the marginal is a plain Gaussian with variance
        // v + sigma^2.
        let problem = GpProblem::new(&[[0.0, 0.0]], &[0.5], DVector::from_vec(vec![0.7]));
        let theta = [2.0_f64.ln(), INITIAL_TIME_METRIC.ln(), 0.5_f64.ln()];

        let var: f64 = 2.0 + 0.25;
        let expected = 0.5 * 0.7 * 0.7 / var
            + 0.5 * var.ln()
            + 0.5 * (2.0 * std::f64::consts::PI).ln();
        let nll = problem.negative_log_likelihood(&theta).unwrap();
        assert!((nll - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let problem = sample_problem();
        let theta = [1.5_f64.ln(), 30.0_f64.ln(), 0.8_f64.ln()];

        let grad = problem.negative_log_likelihood_gradient(&theta).unwrap();

        let h = 1e-6;
        for k in 0..3 {
            let mut up = theta;
            let mut down = theta;
            up[k] += h;
            down[k] -= h;
            let fd = (problem.negative_log_likelihood(&up).unwrap()
                - problem.negative_log_likelihood(&down).unwrap())
                / (2.0 * h);
            assert!(
                (grad[k] - fd).abs() < 1e-6 * (1.0 + fd.abs()),
                "component {k}: analytic {} vs finite difference {fd}",
                grad[k]
            );
        }
    }

    #[test]
    fn test_duplicate_noise_free_points_are_singular() {
        // Two identical inputs with zero noise give a rank-deficient matrix.
        let problem = GpProblem::new(
            &[[1.0, 0.0], [1.0, 0.0]],
            &[0.0, 0.0],
            DVector::from_vec(vec![1.0, 1.0]),
        );
        let theta = [1.0_f64.ln(), 50.0_f64.ln(), 0.5_f64.ln()];

        assert!(matches!(
            problem.negative_log_likelihood(&theta),
            Err(BolfitError::SingularCovariance(_))
        ));
    }

    #[test]
    fn test_noise_widens_the_marginal() {
        // More assumed noise lowers the data term's pull: the likelihood of
        // the same residuals under a broader marginal must change smoothly
        // and the quadratic term must shrink.
        let inputs = [[0.0, 0.0], [5.0, 0.0]];
        let residuals = DVector::from_vec(vec![2.0, -2.0]);
        let quiet = GpProblem::new(&inputs, &[0.05, 0.05], residuals.clone());
        let noisy = GpProblem::new(&inputs, &[2.0, 2.0], residuals);
        let theta = [1.0_f64.ln(), 50.0_f64.ln(), 0.5_f64.ln()];

        let nll_quiet = quiet.negative_log_likelihood(&theta).unwrap();
        let nll_noisy = noisy.negative_log_likelihood(&theta).unwrap();

        // Residuals of +-2 are implausible under tight noise, plausible
        // under broad noise.
        assert!(nll_quiet > nll_noisy);
    }
}
