//! # Errors
//!
//! Error types shared by every part of lareg.
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

/// Which matrix failed to invert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    /// The observation covariance matrix `V`.
    Covariance,

    /// The normal matrix `Cᵀ·V⁻¹·C`.
    Normal,
}

impl std::fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Covariance => write!(f, "covariance matrix V"),
            Self::Normal => write!(f, "normal matrix Cᵀ·V⁻¹·C"),
        }
    }
}

/// Possible errors raised while building or fitting basis functions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Inputs with disagreeing lengths or dimensions.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// No samples or no basis functions were provided.
    #[error("Cannot fit {0}: input is empty.")]
    EmptyData(&'static str),

    /// Variance estimation needs more samples than basis functions.
    #[error(
        "No residual degrees of freedom: {samples} samples cannot estimate the variance of a \
        fit with {basis} basis functions."
    )]
    DegreesOfFreedom {
        /// Number of samples.
        samples: usize,

        /// Number of basis functions.
        basis: usize,
    },

    /// A matrix which must be inverted is singular.
    #[error("Singular matrix: the {0} is not invertible.")]
    SingularMatrix(MatrixKind),

    /// A reshape which cannot be satisfied.
    #[error("Invalid reshape: {0}")]
    InvalidReshape(String),

    /// All observed values are identical, so R² is 0/0.
    #[error("R² is undefined: all observed values are identical (total sum of squares is 0).")]
    DegenerateStatistic,

    /// NaN or inf found in the inputs or basis function evaluations.
    #[error("Non-finite value encountered: {0}")]
    NonFinite(String),
}

/// Result type used throughout lareg.
pub type LaregResult<T> = Result<T, Error>;

#[cfg(feature = "pyo3")]
use pyo3::{PyErr, exceptions};

#[cfg(feature = "pyo3")]
impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        // numpy raises LinAlgError, a subclass of ValueError, for singular matrices.
        Self::new::<exceptions::PyValueError, _>(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::DegreesOfFreedom {
            samples: 2,
            basis: 3,
        };
        assert!(err.to_string().contains("2 samples"));
        assert!(err.to_string().contains("3 basis functions"));

        let err = Error::SingularMatrix(MatrixKind::Normal);
        assert!(err.to_string().contains("Cᵀ·V⁻¹·C"));
    }
}
