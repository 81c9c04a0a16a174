//! Python bindings for lareg.
//!
//! Thin wrappers around `lareg_core`, all fitting logic lives there.

pub mod fitting;
pub mod function_array;
pub mod utils;

use pyo3::prelude::*;

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<function_array::PyFunctionArray>()?;
    m.add_class::<fitting::PyFittedFunction>()?;

    m.add_function(wrap_pyfunction!(fitting::lareg_py, m)?)?;

    Ok(())
}
