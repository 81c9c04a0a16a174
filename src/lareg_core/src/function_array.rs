//! # Function Arrays
//!
//! Shaped collections of scalar functions which are evaluated as a unit.
//!
//! A [`FunctionArray`] behaves like a row-major array whose elements are functions,
//! calling it with a value returns the value of every function at that point. This
//! is the building block of the design matrix of a linear fit.
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
use std::sync::Arc;

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::errors::{Error, LaregResult};
use crate::shape::Shape;

/// A single scalar function `f(x) -> y`.
///
/// These are reference counted, copies of a [`FunctionArray`] share the same
/// underlying functions.
pub type BasisFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Wrap a closure or function into a [`BasisFn`].
pub fn basis_fn<F>(func: F) -> BasisFn
where
    F: Fn(f64) -> f64 + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Construct a one dimensional [`FunctionArray`] from a list of closures.
///
/// ```
///     use lareg_core::basis;
///     let funcs = basis![|_| 1.0, |x| x, |x: f64| x.powi(2)];
///     assert_eq!(funcs.call(2.0), vec![1.0, 2.0, 4.0]);
/// ```
#[macro_export]
macro_rules! basis {
    ($($func:expr),* $(,)?) => {
        $crate::function_array::FunctionArray::new(
            vec![$($crate::function_array::basis_fn($func)),*]
        )
    };
}

/// Evaluate every function at `x`, in order.
pub fn apply_elementwise(functions: &[BasisFn], x: f64) -> Vec<f64> {
    functions.iter().map(|func| func(x)).collect()
}

/// Shaped array of scalar functions.
///
/// Values are never mutated in place, [`FunctionArray::reshape`] and
/// [`FunctionArray::transpose`] return new arrays.
#[derive(Clone)]
pub struct FunctionArray {
    functions: Box<[BasisFn]>,
    shape: Shape,
}

impl std::fmt::Debug for FunctionArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionArray")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl FunctionArray {
    /// Construct a one dimensional array of functions.
    #[must_use]
    pub fn new(functions: Vec<BasisFn>) -> Self {
        let shape = Shape::flat(functions.len());
        Self {
            functions: functions.into_boxed_slice(),
            shape,
        }
    }

    /// Construct a one dimensional array from closures sharing a single type.
    ///
    /// ```
    ///     use lareg_core::function_array::FunctionArray;
    ///     let powers = FunctionArray::from_fns((0..4).map(|p| move |x: f64| x.powi(p)));
    ///     assert_eq!(powers.call(2.0), vec![1.0, 2.0, 4.0, 8.0]);
    /// ```
    #[must_use]
    pub fn from_fns<F>(functions: impl IntoIterator<Item = F>) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        functions.into_iter().map(basis_fn).collect()
    }

    /// Construct a two dimensional array, one row per inner vector.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the rows are not all the same length.
    pub fn from_nested(rows: Vec<Vec<BasisFn>>) -> LaregResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != n_cols) {
            return Err(Error::ShapeMismatch(format!(
                "row {bad} has {} functions, expected {n_cols}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            functions: rows.into_iter().flatten().collect(),
            shape: Shape::new([n_rows, n_cols]),
        })
    }

    /// Construct an array with an explicit row-major shape.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the shape does not hold exactly the number of
    /// provided functions.
    pub fn with_shape(functions: Vec<BasisFn>, shape: Shape) -> LaregResult<Self> {
        if shape.len() != functions.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} functions do not fit into shape {shape}",
                functions.len()
            )));
        }
        Ok(Self {
            functions: functions.into_boxed_slice(),
            shape,
        })
    }

    /// Shape of the array.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Total number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if there are no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Functions in storage order.
    #[must_use]
    pub fn as_slice(&self) -> &[BasisFn] {
        &self.functions
    }

    /// Function at the provided storage index.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&BasisFn> {
        self.functions.get(idx)
    }

    /// Iterate over the functions in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, BasisFn> {
        self.functions.iter()
    }

    /// Evaluate every function at `x`.
    ///
    /// The result is in storage order and has the shape of the array.
    #[must_use]
    pub fn call(&self, x: f64) -> Vec<f64> {
        apply_elementwise(&self.functions, x)
    }

    /// Evaluate every function at every value of `xs`.
    ///
    /// Row `i` of the result contains all functions evaluated at `xs[i]`, in storage
    /// order. Rows are evaluated in parallel.
    #[must_use]
    pub fn call_many(&self, xs: &[f64]) -> DMatrix<f64> {
        let values: Vec<f64> = xs
            .par_iter()
            .with_min_len(100)
            .flat_map_iter(|&x| self.functions.iter().map(move |func| func(x)))
            .collect();
        DMatrix::from_row_slice(xs.len(), self.len(), &values)
    }

    /// Same functions arranged into a different shape.
    ///
    /// A single negative dimension is inferred from the number of functions.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReshape`] if more than one dimension is negative, or the shape
    /// cannot hold exactly the current number of functions.
    pub fn reshape(&self, dims: &[isize]) -> LaregResult<Self> {
        Ok(Self {
            functions: self.functions.clone(),
            shape: self.shape.reshape(dims)?,
        })
    }

    /// Array with the order of its dimensions reversed.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let functions = self
            .shape
            .transpose_order()
            .into_iter()
            .map(|idx| Arc::clone(&self.functions[idx]))
            .collect();
        Self {
            functions,
            shape: self.shape.transposed(),
        }
    }
}

impl FromIterator<BasisFn> for FunctionArray {
    fn from_iter<T: IntoIterator<Item = BasisFn>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Vec<BasisFn>> for FunctionArray {
    fn from(value: Vec<BasisFn>) -> Self {
        Self::new(value)
    }
}

impl<'a> IntoIterator for &'a FunctionArray {
    type Item = &'a BasisFn;
    type IntoIter = std::slice::Iter<'a, BasisFn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
