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
use serde::{Deserialize, Serialize};

use crate::errors::{Error, LaregResult};
use crate::function_array::FunctionArray;

/// Source of the observation covariance used to produce a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightingKind {
    /// Identity covariance, ordinary least squares without refinement.
    Unweighted,

    /// Diagonal covariance from per sample standard deviations.
    StdDev,

    /// Full covariance matrix supplied by the caller.
    Covariance,

    /// Common variance estimated from the residuals of an unweighted fit.
    Estimated {
        /// Estimated variance `σ² = RSS / (N - d)`.
        variance: f64,
    },
}

/// Result of a linear least squares fit.
///
/// Holds the best fit coefficients, their covariance, and the basis functions so
/// that the fitted function may be evaluated afterward.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub(crate) basis: FunctionArray,

    /// Best fit coefficients, one per basis function in storage order.
    pub coefficients: DVector<f64>,

    /// Covariance matrix of the coefficients.
    pub covariance: DMatrix<f64>,

    pub(crate) rss: f64,
    pub(crate) tss: f64,
    pub(crate) n_samples: usize,
    pub(crate) weighting: WeightingKind,
}

/// Serializable summary of a [`LinearFit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    /// Best fit coefficients.
    pub coefficients: Vec<f64>,

    /// Covariance matrix of the coefficients, one vector per row.
    pub covariance: Vec<Vec<f64>>,

    /// Coefficient of determination, if defined.
    pub r_squared: Option<f64>,

    /// How the observations were weighted.
    pub weighting: WeightingKind,
}

impl LinearFit {
    /// Basis functions of the fit.
    #[must_use]
    pub fn basis(&self) -> &FunctionArray {
        &self.basis
    }

    /// How the observations were weighted.
    #[must_use]
    pub fn weighting_kind(&self) -> WeightingKind {
        self.weighting
    }

    /// Residual sum of squares, `Σ(φ(xᵢ) - yᵢ)²`.
    #[must_use]
    pub fn rss(&self) -> f64 {
        self.rss
    }

    /// Total sum of squares, `Σ(yᵢ - ȳ)²`.
    #[must_use]
    pub fn tss(&self) -> f64 {
        self.tss
    }

    /// Number of samples which were fit.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Residual degrees of freedom `N - d`, zero if there are no more samples than
    /// basis functions.
    #[must_use]
    pub fn degrees_of_freedom(&self) -> usize {
        self.n_samples.saturating_sub(self.basis.len())
    }

    /// Coefficient of determination, `R² = 1 - RSS / TSS`.
    ///
    /// This is `None` when all observed values are identical.
    #[must_use]
    pub fn r_squared(&self) -> Option<f64> {
        (self.tss > 0.0).then(|| 1.0 - self.rss / self.tss)
    }

    /// Coefficient of determination, `R² = 1 - RSS / TSS`.
    ///
    /// # Errors
    ///
    /// [`Error::DegenerateStatistic`] when all observed values are identical.
    pub fn try_r_squared(&self) -> LaregResult<f64> {
        self.r_squared().ok_or(Error::DegenerateStatistic)
    }

    /// One sigma uncertainty of each coefficient.
    #[must_use]
    pub fn std_errors(&self) -> DVector<f64> {
        self.covariance.diagonal().map(f64::sqrt)
    }

    /// Evaluate the fitted function `φ(x) = Σⱼ fⱼ(x)·aⱼ`.
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        linear_combination(&self.basis, &self.coefficients, x)
    }

    /// Evaluate the fitted function at every value of `xs`.
    #[must_use]
    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        (self.basis.call_many(xs) * &self.coefficients)
            .iter()
            .copied()
            .collect()
    }

    /// One sigma uncertainty of the fitted function at `x`.
    ///
    /// Propagated from the coefficient covariance, `sqrt(f(x)ᵀ·Vₐ·f(x))`.
    #[must_use]
    pub fn evaluate_uncertainty(&self, x: f64) -> f64 {
        self.uncertainty_from_basis(&self.basis.call(x))
    }

    /// Fitted value from basis functions which were already evaluated.
    ///
    /// `values` holds every basis function at a single point, in storage order.
    #[must_use]
    pub fn value_from_basis(&self, values: &[f64]) -> f64 {
        values
            .iter()
            .zip(self.coefficients.iter())
            .map(|(value, coef)| value * coef)
            .sum()
    }

    /// Propagated one sigma uncertainty from basis functions which were already
    /// evaluated, `sqrt(fᵀ·Vₐ·f)`.
    #[must_use]
    pub fn uncertainty_from_basis(&self, values: &[f64]) -> f64 {
        let funcs = DVector::from_column_slice(values);
        funcs.dot(&(&self.covariance * &funcs)).max(0.0).sqrt()
    }

    /// Owned closure evaluating the fitted function.
    ///
    /// The closure only holds the basis functions and the coefficients.
    #[must_use]
    pub fn fitted_function(&self) -> impl Fn(f64) -> f64 + Send + Sync + 'static + use<> {
        let basis = self.basis.clone();
        let coefficients = self.coefficients.clone();
        move |x| linear_combination(&basis, &coefficients, x)
    }

    /// Serializable summary of the fit.
    #[must_use]
    pub fn parameters(&self) -> FitParameters {
        FitParameters {
            coefficients: self.coefficients.iter().copied().collect(),
            covariance: self
                .covariance
                .row_iter()
                .map(|row| row.iter().copied().collect())
                .collect(),
            r_squared: self.r_squared(),
            weighting: self.weighting,
        }
    }

    /// Split the fit into `(a, Vₐ, R², φ)`.
    #[must_use]
    pub fn into_tuple(
        self,
    ) -> (
        DVector<f64>,
        DMatrix<f64>,
        Option<f64>,
        impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) {
        let fitted = self.fitted_function();
        let r_squared = self.r_squared();
        (self.coefficients, self.covariance, r_squared, fitted)
    }
}

fn linear_combination(basis: &FunctionArray, coefficients: &DVector<f64>, x: f64) -> f64 {
    basis
        .iter()
        .zip(coefficients.iter())
        .map(|(func, coef)| func(x) * coef)
        .sum()
}
