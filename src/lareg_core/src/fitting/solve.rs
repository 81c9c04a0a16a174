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

use nalgebra::{DMatrix, DVector};

use crate::errors::{Error, LaregResult, MatrixKind};
use crate::fitting::{LinearFit, WeightingKind};
use crate::function_array::FunctionArray;

/// A validated fit problem, the design matrix and the observations.
#[derive(Debug)]
pub(crate) struct Problem {
    basis: FunctionArray,

    /// Design matrix `C`, `C[i, j] = f_j(x_i)`.
    design: DMatrix<f64>,

    y: DVector<f64>,
}

impl Problem {
    /// Validate inputs and build the design matrix.
    pub(crate) fn new(basis: &FunctionArray, x: &[f64], y: &[f64]) -> LaregResult<Self> {
        if basis.is_empty() {
            return Err(Error::EmptyData("without basis functions"));
        }
        if x.is_empty() {
            return Err(Error::EmptyData("without samples"));
        }
        if x.len() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "x has {} values but y has {}",
                x.len(),
                y.len()
            )));
        }
        if let Some(idx) = x.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFinite(format!("x[{idx}] = {}", x[idx])));
        }
        if let Some(idx) = y.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFinite(format!("y[{idx}] = {}", y[idx])));
        }

        let design = basis.call_many(x);
        let non_finite = design.row_iter().enumerate().find_map(|(row, vals)| {
            vals.iter()
                .position(|v| !v.is_finite())
                .map(|col| (row, col))
        });
        if let Some((row, col)) = non_finite {
            return Err(Error::NonFinite(format!(
                "basis function {col} evaluated at x = {} returned {}",
                x[row],
                design[(row, col)]
            )));
        }

        Ok(Self {
            basis: basis.clone(),
            design,
            y: DVector::from_column_slice(y),
        })
    }

    /// Number of samples `N`.
    pub(crate) fn n_samples(&self) -> usize {
        self.design.nrows()
    }

    /// Number of basis functions `d`.
    pub(crate) fn n_basis(&self) -> usize {
        self.design.ncols()
    }

    /// Coefficient covariance `Vₐ = (Cᵀ·V⁻¹·C)⁻¹`.
    pub(crate) fn coefficient_covariance(
        &self,
        v_inv: &DMatrix<f64>,
    ) -> LaregResult<DMatrix<f64>> {
        let normal = self.design.transpose() * v_inv * &self.design;
        let v_a = normal
            .try_inverse()
            .ok_or(Error::SingularMatrix(MatrixKind::Normal))?;
        if v_a.iter().any(|v| !v.is_finite()) {
            return Err(Error::SingularMatrix(MatrixKind::Normal));
        }

        // Inversion leaves round-off asymmetry behind.
        Ok((&v_a + v_a.transpose()) * 0.5)
    }

    /// Solve the weighted normal equations given the inverse covariance `V⁻¹`.
    pub(crate) fn solve(
        &self,
        v_inv: &DMatrix<f64>,
        weighting: WeightingKind,
    ) -> LaregResult<LinearFit> {
        let covariance = self.coefficient_covariance(v_inv)?;

        // M = Vₐ·Cᵀ·V⁻¹, a = M·y
        let projection = &covariance * self.design.transpose() * v_inv;
        let coefficients = projection * &self.y;

        let residuals = &self.design * &coefficients - &self.y;
        let rss = residuals.norm_squared();
        // The rounded mean of identical values leaves a tiny nonzero TSS behind.
        let tss = if self.y.iter().all(|v| *v == self.y[0]) {
            log::warn!("All observed values are identical, R² is undefined for this fit.");
            0.0
        } else {
            let mean = self.y.mean();
            self.y.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        };

        Ok(LinearFit {
            basis: self.basis.clone(),
            coefficients,
            covariance,
            rss,
            tss,
            n_samples: self.n_samples(),
            weighting,
        })
    }
}

/// Inverse of a diagonal covariance matrix built from standard deviations.
pub(crate) fn diagonal_inverse(dy: &[f64]) -> LaregResult<DMatrix<f64>> {
    if let Some(idx) = dy.iter().position(|v| !v.is_finite()) {
        return Err(Error::NonFinite(format!("dy[{idx}] = {}", dy[idx])));
    }
    if dy.iter().any(|v| *v == 0.0) {
        return Err(Error::SingularMatrix(MatrixKind::Covariance));
    }
    let weights = DVector::from_iterator(dy.len(), dy.iter().map(|v| v.powi(-2)));
    Ok(DMatrix::from_diagonal(&weights))
}

/// Relative tolerance on the asymmetry of a covariance matrix.
const SYMMETRY_TOL: f64 = 1e-10;

/// Inverse of a full covariance matrix.
///
/// The matrix must be symmetric.
pub(crate) fn full_inverse(cov: DMatrix<f64>) -> LaregResult<DMatrix<f64>> {
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite("covariance matrix V".into()));
    }
    let asymmetry = (&cov - cov.transpose()).amax();
    if asymmetry > SYMMETRY_TOL * cov.amax() {
        return Err(Error::ShapeMismatch(format!(
            "covariance matrix V is not symmetric, entries differ by up to {asymmetry:e}"
        )));
    }
    let inv = cov
        .try_inverse()
        .ok_or(Error::SingularMatrix(MatrixKind::Covariance))?;
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(Error::SingularMatrix(MatrixKind::Covariance));
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis;

    #[test]
    fn test_problem_validation() {
        let funcs = basis![|_| 1.0, |x| x];
        assert!(matches!(
            Problem::new(&funcs, &[0.0, 1.0], &[1.0]),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(matches!(
            Problem::new(&funcs, &[], &[]),
            Err(Error::EmptyData(_))
        ));
        assert!(matches!(
            Problem::new(&FunctionArray::new(vec![]), &[1.0], &[1.0]),
            Err(Error::EmptyData(_))
        ));
        assert!(matches!(
            Problem::new(&funcs, &[0.0, f64::NAN], &[1.0, 2.0]),
            Err(Error::NonFinite(_))
        ));
    }

    #[test]
    fn test_problem_non_finite_basis() {
        let funcs = basis![|_| 1.0, |x: f64| x.ln()];
        let err = Problem::new(&funcs, &[1.0, 0.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::NonFinite(_)));
        assert!(err.to_string().contains("basis function 1"));
    }

    #[test]
    fn test_design_matrix() {
        let funcs = basis![|_| 1.0, |x| x, |x| x * x];
        let problem = Problem::new(&funcs, &[0.0, 1.0, 2.0, 3.0], &[0.0; 4]).unwrap();
        assert_eq!(problem.n_samples(), 4);
        assert_eq!(problem.n_basis(), 3);
        assert_eq!(problem.design[(3, 2)], 9.0);
        assert_eq!(problem.design[(2, 1)], 2.0);
    }

    #[test]
    fn test_diagonal_inverse() {
        let inv = diagonal_inverse(&[1.0, 2.0, 0.5]).unwrap();
        assert_eq!(inv[(0, 0)], 1.0);
        assert_eq!(inv[(1, 1)], 0.25);
        assert_eq!(inv[(2, 2)], 4.0);
        assert_eq!(inv[(0, 1)], 0.0);

        assert!(matches!(
            diagonal_inverse(&[1.0, 0.0]),
            Err(Error::SingularMatrix(MatrixKind::Covariance))
        ));
    }

    #[test]
    fn test_full_inverse_singular() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            full_inverse(cov),
            Err(Error::SingularMatrix(MatrixKind::Covariance))
        ));
    }

    #[test]
    fn test_full_inverse_asymmetric() {
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.1, 1.0]);
        assert!(matches!(full_inverse(cov), Err(Error::ShapeMismatch(_))));

        // round-off level asymmetry is accepted
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5 + 1e-15, 1.0]);
        assert!(full_inverse(cov).is_ok());
    }

    #[test]
    fn test_solve_exact() {
        let funcs = basis![|_| 1.0, |x| x];
        let problem = Problem::new(&funcs, &[0.0, 1.0, 2.0], &[2.0, 5.0, 8.0]).unwrap();
        let fit = problem
            .solve(&DMatrix::identity(3, 3), WeightingKind::Unweighted)
            .unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-10);
        assert!((fit.coefficients[1] - 3.0).abs() < 1e-10);
        assert!(fit.rss() < 1e-20);
    }

    #[test]
    fn test_solve_constant_inexact() {
        let funcs = basis![|_| 1.0, |x| x];
        for value in [0.1, 0.3, 1.1, 7.7] {
            let problem = Problem::new(&funcs, &[0.0, 1.0, 2.0], &[value; 3]).unwrap();
            let fit = problem
                .solve(&DMatrix::identity(3, 3), WeightingKind::Unweighted)
                .unwrap();
            assert_eq!(fit.tss(), 0.0);
            assert!(fit.r_squared().is_none());
        }
    }
}
