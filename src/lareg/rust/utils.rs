//! General purpose utility functions.

use pyo3::prelude::*;

/// Polymorphic support for a single value or a vector of values.
#[derive(Debug, FromPyObject, IntoPyObject)]
pub enum MaybeVec<T> {
    /// A single value of type T.
    Single(T),

    /// A vector of values of type T.
    Multiple(Vec<T>),
}

impl<T> MaybeVec<T> {
    /// Values as a slice, a single value is a slice of length one.
    pub fn as_slice(&self) -> &[T] {
        match self {
            MaybeVec::Single(value) => std::slice::from_ref(value),
            MaybeVec::Multiple(vec) => vec,
        }
    }

    /// Replace the values while keeping single values single.
    ///
    /// `values` must have the same length as [`MaybeVec::as_slice`].
    pub fn with_values<U>(&self, values: Vec<U>) -> MaybeVec<U> {
        match self {
            MaybeVec::Single(_) => match values.into_iter().next() {
                Some(value) => MaybeVec::Single(value),
                None => MaybeVec::Multiple(Vec::new()),
            },
            MaybeVec::Multiple(_) => MaybeVec::Multiple(values),
        }
    }
}

impl<T> From<MaybeVec<T>> for Vec<T> {
    fn from(maybe_vec: MaybeVec<T>) -> Self {
        match maybe_vec {
            MaybeVec::Single(value) => vec![value],
            MaybeVec::Multiple(vec) => vec,
        }
    }
}
