//! # Shape
//!
//! Row-major shape bookkeeping for arrays of basis functions.
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
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, LaregResult};

/// Dimensions of a row-major array.
///
/// The number of elements is the product of all dimensions, a shape without any
/// dimensions describes a single element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape(Box<[usize]>);

impl Shape {
    /// Construct a new shape from its dimensions.
    #[must_use]
    pub fn new(dims: impl Into<Box<[usize]>>) -> Self {
        Self(dims.into())
    }

    /// One dimensional shape containing `len` elements.
    #[must_use]
    pub fn flat(len: usize) -> Self {
        Self(Box::new([len]))
    }

    /// Dimensions of the shape.
    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements.
    ///
    /// Saturates at `usize::MAX` for dimensions whose product overflows.
    #[must_use]
    pub fn len(&self) -> usize {
        checked_product(&self.0).unwrap_or(usize::MAX)
    }

    /// True if the shape holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a requested reshape against this shape.
    ///
    /// Any negative dimension is inferred from the total number of elements, at
    /// most one dimension may be inferred.
    ///
    /// ```
    ///     use lareg_core::shape::Shape;
    ///     let shape = Shape::flat(6);
    ///     assert_eq!(shape.reshape(&[2, -1]).unwrap().dims(), &[2, 3]);
    ///     assert!(shape.reshape(&[4, -1]).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReshape`] if more than one dimension is inferred, or the
    /// requested dimensions cannot hold exactly the current number of elements.
    pub fn reshape(&self, requested: &[isize]) -> LaregResult<Self> {
        let n_inferred = requested.iter().filter(|dim| **dim < 0).count();
        if n_inferred > 1 {
            return Err(Error::InvalidReshape(
                "can only specify one unknown dimension".into(),
            ));
        }

        let total = self.len();
        let known = requested
            .iter()
            .filter(|dim| **dim >= 0)
            .try_fold(1_usize, |acc, dim| acc.checked_mul(dim.unsigned_abs()));
        let incompatible = || {
            Error::InvalidReshape(format!(
                "cannot reshape array of size {total} into shape ({})",
                requested.iter().join(", ")
            ))
        };

        let known = known.ok_or_else(|| incompatible())?;
        let inferred = if n_inferred == 0 {
            if known != total {
                return Err(incompatible());
            }
            0
        } else {
            if known == 0 || total % known != 0 {
                return Err(incompatible());
            }
            total / known
        };

        Ok(Self(
            requested
                .iter()
                .map(|&dim| if dim < 0 { inferred } else { dim.unsigned_abs() })
                .collect(),
        ))
    }

    /// Shape with the order of the dimensions reversed.
    #[must_use]
    pub fn transposed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Storage permutation of a transpose.
    ///
    /// Entry `i` is the position in this shape's storage of the element which lands
    /// at position `i` of the transposed storage.
    #[must_use]
    pub fn transpose_order(&self) -> Vec<usize> {
        let dims = self.dims();
        let ndim = dims.len();

        let mut strides = vec![1; ndim];
        for axis in (0..ndim.saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }

        // axis `m` of the transposed shape is axis `ndim - 1 - m` of this one.
        (0..self.len())
            .map(|mut flat| {
                let mut source = 0;
                for (axis, stride) in strides.iter().enumerate() {
                    let size = dims[axis];
                    source += (flat % size) * stride;
                    flat /= size;
                }
                source
            })
            .collect()
    }
}

/// Product of dimensions, `None` on overflow.
fn checked_product(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() == 1 {
            write!(f, "({},)", self.0[0])
        } else {
            write!(f, "({})", self.0.iter().join(", "))
        }
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value.into_boxed_slice())
    }
}
