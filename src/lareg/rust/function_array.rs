//! Python support for arrays of functions.
use std::sync::{Arc, Mutex};

use itertools::Itertools;
use lareg_core::errors::Error;
use lareg_core::function_array::{BasisFn, FunctionArray, basis_fn};
use lareg_core::shape::Shape;
use pyo3::prelude::*;
use pyo3::types::{PyFloat, PyIterator, PyList, PyString, PyTuple};

use crate::utils::MaybeVec;

/// Array of callables, evaluated as a unit.
///
/// Calling with a single value returns the value of every function, nested in the
/// same shape as the array. Calling with a list of values returns one such result
/// for each value.
///
/// Reshaping and transposing behave as they do for numpy arrays.
///
/// Parameters
/// ----------
/// functions :
///     Callables accepting a single float, optionally in nested lists. Nested lists
///     must all have the same length.
#[pyclass(frozen, module = "lareg", name = "FunctionArray", sequence)]
#[derive(Debug)]
pub struct PyFunctionArray {
    /// Callables in row-major storage order.
    functions: Box<[Py<PyAny>]>,

    /// Shape of the array.
    shape: Shape,
}

/// First exception raised by a Python callable while the GIL was released.
#[derive(Debug, Clone, Default)]
pub struct CallbackErrors(Arc<Mutex<Option<PyErr>>>);

impl CallbackErrors {
    /// Keep `err` unless an earlier exception was already recorded.
    fn record(&self, err: PyErr) {
        if let Ok(mut first) = self.0.lock() {
            if first.is_none() {
                *first = Some(err);
            }
        }
    }

    /// Take the recorded exception, if any.
    pub fn take(&self) -> Option<PyErr> {
        self.0.lock().ok().and_then(|mut first| first.take())
    }
}

/// Record the nested dimensions by descending into the first element.
fn nested_dims(obj: &Bound<'_, PyAny>) -> PyResult<Vec<usize>> {
    let mut dims = Vec::new();
    let mut current = obj.clone();
    while !current.is_callable() {
        if current.is_instance_of::<PyString>() {
            Err(Error::ShapeMismatch(
                "strings are not callable and cannot be nested".into(),
            ))?;
        }
        let items: Vec<Bound<'_, PyAny>> = current.try_iter()?.collect::<PyResult<_>>()?;
        dims.push(items.len());
        match items.into_iter().next() {
            Some(first) => current = first,
            None => break,
        }
    }
    Ok(dims)
}

/// Flatten nested callables, checking every level against `dims`.
fn flatten_nested(
    obj: &Bound<'_, PyAny>,
    dims: &[usize],
    functions: &mut Vec<Py<PyAny>>,
) -> PyResult<()> {
    let Some((&expected, rest)) = dims.split_first() else {
        if !obj.is_callable() {
            Err(Error::ShapeMismatch(format!(
                "expected a callable, found '{}'",
                obj.get_type().name()?
            )))?;
        }
        functions.push(obj.clone().unbind());
        return Ok(());
    };

    if obj.is_callable() || obj.is_instance_of::<PyString>() {
        Err(Error::ShapeMismatch(
            "inhomogeneous nesting of functions".into(),
        ))?;
    }
    let items: Vec<Bound<'_, PyAny>> = obj.try_iter()?.collect::<PyResult<_>>()?;
    if items.len() != expected {
        Err(Error::ShapeMismatch(format!(
            "inhomogeneous nesting, expected {expected} entries but found {}",
            items.len()
        )))?;
    }
    for item in &items {
        flatten_nested(item, rest, functions)?;
    }
    Ok(())
}

/// Nest flat values into lists following `dims`.
fn nest_values<'py>(
    py: Python<'py>,
    values: &[f64],
    dims: &[usize],
) -> PyResult<Bound<'py, PyAny>> {
    let Some((&len, rest)) = dims.split_first() else {
        return Ok(PyFloat::new(py, values[0]).into_any());
    };
    let chunk = rest.iter().product::<usize>();
    let items = if chunk == 0 {
        (0..len)
            .map(|_| nest_values(py, &[], rest))
            .collect::<PyResult<Vec<_>>>()?
    } else {
        values
            .chunks(chunk)
            .map(|chunk| nest_values(py, chunk, rest))
            .collect::<PyResult<Vec<_>>>()?
    };
    Ok(PyList::new(py, items)?.into_any())
}

impl PyFunctionArray {
    /// Build from any nested Python structure of callables.
    pub fn from_object(obj: &Bound<'_, PyAny>) -> PyResult<Self> {
        if let Ok(array) = obj.downcast::<Self>() {
            return Ok(array.get().clone_ref(obj.py()));
        }
        let dims = nested_dims(obj)?;
        let mut functions = Vec::new();
        flatten_nested(obj, &dims, &mut functions)?;
        Ok(Self {
            functions: functions.into_boxed_slice(),
            shape: Shape::new(dims),
        })
    }

    /// Copy with new references to the same callables.
    pub(crate) fn clone_ref(&self, py: Python<'_>) -> Self {
        Self {
            functions: self.functions.iter().map(|f| f.clone_ref(py)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Convert into a [`FunctionArray`] usable by the fitting code.
    ///
    /// Python exceptions raised by a callable, or values which are not floats, are
    /// evaluated as NaN and the first such exception is kept in `errors`, so it may be
    /// raised once the GIL is held again.
    pub fn to_function_array(
        &self,
        py: Python<'_>,
        errors: &CallbackErrors,
    ) -> PyResult<FunctionArray> {
        let functions: Vec<BasisFn> = self
            .functions
            .iter()
            .map(|func| {
                let func = func.clone_ref(py);
                let errors = errors.clone();
                basis_fn(move |x| {
                    Python::with_gil(|py| {
                        func.call1(py, (x,))
                            .and_then(|value| value.extract::<f64>(py))
                            .unwrap_or_else(|err| {
                                errors.record(err);
                                f64::NAN
                            })
                    })
                })
            })
            .collect();
        Ok(FunctionArray::with_shape(functions, self.shape.clone())?)
    }

    /// Evaluate all callables at `x` in storage order.
    pub(crate) fn evaluate(&self, py: Python<'_>, x: f64) -> PyResult<Vec<f64>> {
        self.functions
            .iter()
            .map(|func| func.call1(py, (x,))?.extract::<f64>(py))
            .collect()
    }
}

#[pymethods]
impl PyFunctionArray {
    /// Construct a new FunctionArray
    #[new]
    pub fn py_new(functions: &Bound<'_, PyAny>) -> PyResult<Self> {
        Self::from_object(functions)
    }

    /// Evaluate every function.
    ///
    /// Parameters
    /// ----------
    /// x :
    ///     A single value or a list of values.
    pub fn __call__<'py>(
        &self,
        py: Python<'py>,
        x: MaybeVec<f64>,
    ) -> PyResult<Bound<'py, PyAny>> {
        match x {
            MaybeVec::Single(x) => nest_values(py, &self.evaluate(py, x)?, self.shape.dims()),
            MaybeVec::Multiple(xs) => {
                let items = xs
                    .into_iter()
                    .map(|x| nest_values(py, &self.evaluate(py, x)?, self.shape.dims()))
                    .collect::<PyResult<Vec<_>>>()?;
                Ok(PyList::new(py, items)?.into_any())
            }
        }
    }

    /// The same functions in a new shape.
    ///
    /// A single dimension may be -1, in which case it is inferred.
    #[pyo3(signature = (*dims))]
    pub fn reshape(&self, py: Python<'_>, dims: Vec<isize>) -> PyResult<Self> {
        let shape = self.shape.reshape(&dims)?;
        Ok(Self {
            shape,
            ..self.clone_ref(py)
        })
    }

    /// The array with its dimensions reversed.
    pub fn transpose(&self, py: Python<'_>) -> Self {
        let functions = self
            .shape
            .transpose_order()
            .into_iter()
            .map(|idx| self.functions[idx].clone_ref(py))
            .collect();
        Self {
            functions,
            shape: self.shape.transposed(),
        }
    }

    /// The array with its dimensions reversed.
    #[getter]
    #[allow(non_snake_case, reason = "Matches the numpy attribute.")]
    pub fn T(&self, py: Python<'_>) -> Self {
        self.transpose(py)
    }

    /// Shape of the array.
    #[getter]
    pub fn shape<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyTuple>> {
        PyTuple::new(py, self.shape.dims())
    }

    /// Total number of functions.
    pub fn __len__(&self) -> usize {
        self.functions.len()
    }

    /// Iterate over the functions in storage order.
    pub fn __iter__<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyIterator>> {
        let functions = self.functions.iter().map(|f| f.clone_ref(py)).collect_vec();
        PyList::new(py, functions)?.try_iter()
    }

    fn __repr__(&self) -> String {
        format!("FunctionArray(shape={})", self.shape)
    }
}
