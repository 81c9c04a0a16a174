//! # lareg Core
//! Linear least squares fits of arbitrary basis functions, with propagated
//! uncertainties.
//!
//! This crate is left as a stand alone Rust crate, completely independent of the
//! Python wrappers, so that the fitting code is usable directly from Rust.
//!
//! ```
//!     use lareg_core::prelude::*;
//!
//!     let funcs = basis![|_| 1.0, |x| x];
//!     let x = [0.0, 1.0, 2.0, 3.0, 4.0];
//!     let y = [0.9, 3.1, 5.0, 6.9, 9.1];
//!     let result = fit(&funcs, &x, &y, None, None, false).unwrap();
//!     assert!((result.coefficients[1] - 2.0).abs() < 0.1);
//!     assert!(result.r_squared().unwrap() > 0.99);
//! ```
//!

pub mod errors;
pub mod fitting;
pub mod function_array;
pub mod shape;

/// Common useful imports
pub mod prelude {
    pub use crate::basis;
    pub use crate::errors::{Error, LaregResult};
    pub use crate::fitting::{FitParameters, LinearFit, Weighting, WeightingKind, fit, fit_weighted};
    pub use crate::function_array::{BasisFn, FunctionArray, basis_fn};
    pub use crate::shape::Shape;
}
