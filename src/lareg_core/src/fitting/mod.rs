//! # Fitting
//! Weighted linear least squares fits of arbitrary basis functions.
//!
//! Given basis functions `f₁..f_d`, samples `xᵢ`, observations `yᵢ`, and the
//! covariance `V` of the observations, the best fit coefficients are
//!
//! ```text
//! Vₐ = (Cᵀ·V⁻¹·C)⁻¹
//! a  = Vₐ·Cᵀ·V⁻¹·y
//! ```
//!
//! where `C[i, j] = f_j(xᵢ)` is the design matrix.
//!
// BSD 3-Clause License
//
// Copyright (c) 2026, Dar Dahlen
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this
//    list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice,
//    this list of conditions and the following disclaimer in the documentation
//    and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its
//    contributors may be used to endorse or promote products derived from
//    this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

mod result;
mod solve;

pub use self::result::{FitParameters, LinearFit, WeightingKind};

use nalgebra::DMatrix;

use self::solve::{Problem, diagonal_inverse, full_inverse};
use crate::errors::{Error, LaregResult, MatrixKind};
use crate::function_array::FunctionArray;

/// Uncertainty information of the observations.
#[derive(Debug, Clone, PartialEq)]
pub enum Weighting {
    /// No uncertainties known, a common variance is estimated from the residuals.
    Estimated,

    /// Independent standard deviation of each observation.
    StdDev(Vec<f64>),

    /// Full covariance matrix of the observations.
    Covariance(DMatrix<f64>),
}

impl Weighting {
    /// Pick the weighting from optional standard deviations and covariance.
    ///
    /// The covariance matrix takes precedence, if both are provided the standard
    /// deviations are ignored.
    #[must_use]
    pub fn resolve(dy: Option<&[f64]>, cov: Option<&DMatrix<f64>>) -> Self {
        match (dy, cov) {
            (Some(_), Some(cov)) => {
                log::warn!(
                    "Both standard deviations and a covariance matrix were provided, the \
                    standard deviations are ignored."
                );
                Self::Covariance(cov.clone())
            }
            (None, Some(cov)) => Self::Covariance(cov.clone()),
            (Some(dy), None) => Self::StdDev(dy.to_vec()),
            (None, None) => Self::Estimated,
        }
    }
}

/// Fit a linear combination of basis functions to observations.
///
/// Returns the coefficients `a`, their covariance `Vₐ`, the coefficient of
/// determination, and the fitted function, all held by a [`LinearFit`].
///
/// Uncertainties of the observations are taken from `cov` if provided, otherwise
/// from the standard deviations `dy`. If neither is available the common variance
/// of the observations is estimated from the residuals of an unweighted fit and
/// used to compute `Vₐ`, the coefficients stay those of the unweighted fit. Setting
/// `fit_only` skips that estimate and returns the unweighted fit directly.
///
/// ```
///     use lareg_core::basis;
///     use lareg_core::fitting::fit;
///
///     let funcs = basis![|_| 1.0, |x| x];
///     let x = [0.0, 1.0, 2.0, 3.0];
///     let y = [1.0, 3.0, 5.0, 7.0];
///     let result = fit(&funcs, &x, &y, Some(&[1.0; 4]), None, false).unwrap();
///     assert!((result.coefficients[0] - 1.0).abs() < 1e-10);
///     assert!((result.coefficients[1] - 2.0).abs() < 1e-10);
///     assert!((result.evaluate(4.0) - 9.0).abs() < 1e-10);
/// ```
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] if `x`, `y`, `dy`, and `cov` disagree in size.
/// - [`Error::EmptyData`] if there are no samples or no basis functions.
/// - [`Error::DegreesOfFreedom`] if the variance must be estimated with no more
///   samples than basis functions.
/// - [`Error::SingularMatrix`] if `V` or `Cᵀ·V⁻¹·C` cannot be inverted.
/// - [`Error::NonFinite`] if any input or basis evaluation is NaN or inf.
pub fn fit(
    basis: &FunctionArray,
    x: &[f64],
    y: &[f64],
    dy: Option<&[f64]>,
    cov: Option<&DMatrix<f64>>,
    fit_only: bool,
) -> LaregResult<LinearFit> {
    fit_weighted(basis, x, y, Weighting::resolve(dy, cov), fit_only)
}

/// Fit a linear combination of basis functions with explicit [`Weighting`].
///
/// `fit_only` only applies to [`Weighting::Estimated`], see [`fit`].
///
/// # Errors
///
/// See [`fit`].
pub fn fit_weighted(
    basis: &FunctionArray,
    x: &[f64],
    y: &[f64],
    weighting: Weighting,
    fit_only: bool,
) -> LaregResult<LinearFit> {
    let problem = Problem::new(basis, x, y)?;
    let n_samples = problem.n_samples();

    match weighting {
        Weighting::Estimated => fit_estimated(&problem, fit_only),
        Weighting::StdDev(dy) => {
            if dy.len() != n_samples {
                return Err(Error::ShapeMismatch(format!(
                    "dy has {} values but there are {n_samples} samples",
                    dy.len()
                )));
            }
            problem.solve(&diagonal_inverse(&dy)?, WeightingKind::StdDev)
        }
        Weighting::Covariance(cov) => {
            if cov.shape() != (n_samples, n_samples) {
                return Err(Error::ShapeMismatch(format!(
                    "V is {}x{} but there are {n_samples} samples",
                    cov.nrows(),
                    cov.ncols()
                )));
            }
            problem.solve(&full_inverse(cov)?, WeightingKind::Covariance)
        }
    }
}

/// Fit without known uncertainties.
///
/// First an unweighted fit, whose residuals give the common variance
/// `σ² = RSS / (N - d)`. The coefficient covariance is then recomputed with
/// `V = σ²·I`, the coefficients are kept.
fn fit_estimated(problem: &Problem, fit_only: bool) -> LaregResult<LinearFit> {
    let n_samples = problem.n_samples();
    let n_basis = problem.n_basis();

    if !fit_only && n_samples <= n_basis {
        return Err(Error::DegreesOfFreedom {
            samples: n_samples,
            basis: n_basis,
        });
    }

    log::debug!("Fitting {n_basis} basis functions to {n_samples} unweighted samples.");
    let identity = DMatrix::identity(n_samples, n_samples);
    let mut unweighted = problem.solve(&identity, WeightingKind::Unweighted)?;
    if fit_only {
        return Ok(unweighted);
    }

    let variance = unweighted.rss() / (n_samples - n_basis) as f64;
    log::debug!("Estimated common variance of the samples: {variance:e}");
    if variance == 0.0 {
        return Err(Error::SingularMatrix(MatrixKind::Covariance));
    }

    unweighted.covariance = problem.coefficient_covariance(&(identity / variance))?;
    unweighted.weighting = WeightingKind::Estimated { variance };
    Ok(unweighted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis;

    const X: [f64; 8] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];

    /// A line with a fixed pattern of noise.
    fn noisy_line() -> Vec<f64> {
        let noise = [0.3, -0.2, 0.1, -0.4, 0.2, 0.1, -0.3, 0.2];
        X.iter().zip(noise).map(|(x, n)| 0.5 + 1.5 * x + n).collect()
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} != {b}");
    }

    #[test]
    fn test_exact_recovery() {
        let funcs = basis![|_| 1.0, |x| x];
        let result = fit(
            &funcs,
            &[0.0, 1.0, 2.0, 3.0],
            &[1.0, 3.0, 5.0, 7.0],
            Some(&[1.0; 4]),
            None,
            false,
        )
        .unwrap();

        assert_close(result.coefficients[0], 1.0, 1e-10);
        assert_close(result.coefficients[1], 2.0, 1e-10);
        assert_close(result.r_squared().unwrap(), 1.0, 1e-12);
        assert_eq!(result.weighting_kind(), WeightingKind::StdDev);
    }

    #[test]
    fn test_weight_invariance() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();

        let unit = fit(&funcs, &X, &y, Some(&[1.0; 8]), None, false).unwrap();
        let scaled = fit(&funcs, &X, &y, Some(&[3.0; 8]), None, false).unwrap();
        let unweighted = fit(&funcs, &X, &y, None, None, true).unwrap();

        for idx in 0..2 {
            assert_close(unit.coefficients[idx], scaled.coefficients[idx], 1e-10);
            assert_close(unit.coefficients[idx], unweighted.coefficients[idx], 1e-10);
        }

        // Vₐ scales with the variance
        for (a, b) in unit.covariance.iter().zip(scaled.covariance.iter()) {
            assert_close(9.0 * a, *b, 1e-10);
        }
    }

    #[test]
    fn test_covariance_validity() {
        let funcs = basis![|_| 1.0, |x| x, |x: f64| x.sin()];
        let y = noisy_line();
        let dy: Vec<f64> = X.iter().map(|x| 0.1 + 0.05 * x).collect();

        for result in [
            fit(&funcs, &X, &y, Some(dy.as_slice()), None, false).unwrap(),
            fit(&funcs, &X, &y, None, None, false).unwrap(),
        ] {
            let cov = &result.covariance;
            assert_eq!(cov, &cov.transpose());
            let eigen = cov.clone().symmetric_eigen();
            assert!(eigen.eigenvalues.iter().all(|v| *v >= -1e-12));
        }
    }

    #[test]
    fn test_full_covariance_matches_std_dev() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();
        let dy: Vec<f64> = X.iter().map(|x| 0.2 + 0.1 * x).collect();
        let cov = DMatrix::from_diagonal(&nalgebra::DVector::from_iterator(
            dy.len(),
            dy.iter().map(|v| v * v),
        ));

        let diag = fit(&funcs, &X, &y, Some(dy.as_slice()), None, false).unwrap();
        let full = fit(&funcs, &X, &y, None, Some(&cov), false).unwrap();
        assert_eq!(full.weighting_kind(), WeightingKind::Covariance);
        for (a, b) in diag.coefficients.iter().zip(full.coefficients.iter()) {
            assert_close(*a, *b, 1e-10);
        }
        for (a, b) in diag.covariance.iter().zip(full.covariance.iter()) {
            assert_close(*a, *b, 1e-10);
        }
    }

    #[test]
    fn test_covariance_takes_precedence() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();
        let cov = DMatrix::identity(8, 8) * 4.0;

        // dy is the wrong length, it is ignored entirely.
        let result = fit(&funcs, &X, &y, Some(&[1.0]), Some(&cov), false).unwrap();
        let expected = fit(&funcs, &X, &y, Some(&[2.0; 8]), None, false).unwrap();
        assert_eq!(result.weighting_kind(), WeightingKind::Covariance);
        for (a, b) in result.covariance.iter().zip(expected.covariance.iter()) {
            assert_close(*a, *b, 1e-10);
        }
    }

    #[test]
    fn test_estimated_variance() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();

        let result = fit(&funcs, &X, &y, None, None, false).unwrap();
        let WeightingKind::Estimated { variance } = result.weighting_kind() else {
            panic!("Expected an estimated variance.");
        };
        assert_close(variance, result.rss() / 6.0, 1e-12);

        // Vₐ = σ²·(CᵀC)⁻¹
        let unit = fit(&funcs, &X, &y, Some(&[1.0; 8]), None, false).unwrap();
        for (a, b) in unit.covariance.iter().zip(result.covariance.iter()) {
            assert_close(variance * a, *b, 1e-10);
        }
    }

    #[test]
    fn test_fit_only() {
        let funcs = basis![|_| 1.0, |x| x, |x| x * x];
        let y = noisy_line();

        let only = fit(&funcs, &X, &y, None, None, true).unwrap();
        let full = fit(&funcs, &X, &y, None, None, false).unwrap();
        assert_eq!(only.weighting_kind(), WeightingKind::Unweighted);
        assert_eq!(only.coefficients, full.coefficients);
        assert_eq!(only.r_squared(), full.r_squared());
        assert_ne!(only.covariance, full.covariance);
    }

    #[test]
    fn test_degrees_of_freedom() {
        let funcs = basis![|_| 1.0, |x| x];
        let err = fit(&funcs, &[0.0, 1.0], &[1.0, 2.5], None, None, false).unwrap_err();
        assert_eq!(
            err,
            Error::DegreesOfFreedom {
                samples: 2,
                basis: 2
            }
        );

        // The unweighted fit alone is still possible.
        let only = fit(&funcs, &[0.0, 1.0], &[1.0, 2.5], None, None, true).unwrap();
        assert_close(only.coefficients[1], 1.5, 1e-10);
        assert_eq!(only.degrees_of_freedom(), 0);
    }

    #[test]
    fn test_degrees_of_freedom_underdetermined() {
        let funcs = basis![|_| 1.0, |x| x, |x| x * x];
        assert!(matches!(
            fit(&funcs, &[0.0, 1.0], &[1.0, 2.5], None, None, false),
            Err(Error::DegreesOfFreedom { .. })
        ));
    }

    #[test]
    fn test_r_squared_bounds() {
        let funcs = basis![|_| 1.0];
        let y = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let result = fit(&funcs, &X, &y, None, None, false).unwrap();
        assert_close(result.coefficients[0], 0.0, 1e-12);
        assert_close(result.r_squared().unwrap(), 0.0, 1e-12);

        let line = basis![|_| 1.0, |x| x];
        let result = fit(&line, &X, &noisy_line(), None, None, false).unwrap();
        let r2 = result.r_squared().unwrap();
        assert!(r2 > 0.9 && r2 < 1.0);
    }

    #[test]
    fn test_constant_observations() {
        let funcs = basis![|_| 1.0, |x| x];
        let result = fit(&funcs, &X, &[2.0; 8], Some(&[1.0; 8]), None, false).unwrap();
        assert_close(result.coefficients[0], 2.0, 1e-10);
        assert!(result.r_squared().is_none());
        assert!(matches!(
            result.try_r_squared(),
            Err(Error::DegenerateStatistic)
        ));
    }

    #[test]
    fn test_shape_errors() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();
        assert!(matches!(
            fit(&funcs, &X, &y[..7], None, None, false),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            fit(&funcs, &X, &y, Some(&[1.0; 7]), None, false),
            Err(Error::ShapeMismatch(_))
        ));
        let cov = DMatrix::identity(7, 7);
        assert!(matches!(
            fit(&funcs, &X, &y, None, Some(&cov), false),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_asymmetric_covariance() {
        let funcs = basis![|_| 1.0, |x| x];
        let y = noisy_line();
        let mut cov = DMatrix::identity(8, 8);
        cov[(0, 3)] = 0.5;
        assert!(matches!(
            fit(&funcs, &X, &y, None, Some(&cov), false),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_constant_observations_inexact() {
        // 0.1 is not exact in binary, the mean of identical values is rounded.
        let funcs = basis![|_| 1.0, |x| x];
        let result = fit(&funcs, &[0.0, 1.0, 2.0], &[0.1; 3], Some(&[1.0; 3]), None, false)
            .unwrap();
        assert_eq!(result.tss(), 0.0);
        assert!(matches!(
            result.try_r_squared(),
            Err(Error::DegenerateStatistic)
        ));
    }

    #[test]
    fn test_singular_normal_matrix() {
        // Two identical basis functions.
        let funcs = basis![|x| x, |x| x];
        let y = noisy_line();
        assert!(matches!(
            fit(&funcs, &X, &y, Some(&[1.0; 8]), None, false),
            Err(Error::SingularMatrix(MatrixKind::Normal))
        ));
    }

    #[test]
    fn test_shaped_basis() {
        // The storage order of a reshaped array defines the coefficient order.
        let funcs = basis![|_| 1.0, |x| x, |x| x * x, |x| x * x * x]
            .reshape(&[2, 2])
            .unwrap();
        let x = [-1.0, -0.6, -0.2, 0.2, 0.6, 1.0, 1.4, 1.8];
        let y: Vec<f64> = x.iter().map(|x| 1.0 - x + 0.5 * x * x * x).collect();
        let result = fit(&funcs, &x, &y, Some(&[1.0; 8]), None, false).unwrap();
        for (coef, expected) in result.coefficients.iter().zip([1.0, -1.0, 0.0, 0.5]) {
            assert_close(*coef, expected, 1e-8);
        }
    }

    #[test]
    fn test_uncertainty_of_mean() {
        let funcs = basis![|_| 1.0];
        let y = noisy_line();
        let result = fit(&funcs, &X, &y, Some(&[2.0; 8]), None, false).unwrap();
        // σ / sqrt(N)
        assert_close(result.evaluate_uncertainty(10.0), 2.0 / 8.0_f64.sqrt(), 1e-12);
        assert_close(result.std_errors()[0], 2.0 / 8.0_f64.sqrt(), 1e-12);
    }
}
