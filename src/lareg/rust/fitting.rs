//! Linear least squares fitting
use lareg_core::errors::Error;
use lareg_core::fitting::{LinearFit, fit};
use nalgebra::{DMatrix, DVector};
use pyo3::prelude::*;

use crate::function_array::{CallbackErrors, PyFunctionArray};
use crate::utils::MaybeVec;

/// Fitted function of a linear least squares fit.
///
/// Calling this evaluates the linear combination of the basis functions with the
/// best fit coefficients. Exceptions raised by the basis functions propagate.
#[pyclass(frozen, module = "lareg", name = "FittedFunction")]
#[derive(Debug)]
pub struct PyFittedFunction {
    /// The fit result.
    pub fit: LinearFit,

    /// The Python basis functions of the fit.
    pub basis: PyFunctionArray,
}

fn matrix_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

fn vector_values(vector: &DVector<f64>) -> Vec<f64> {
    vector.iter().copied().collect()
}

/// Build a matrix from a list of rows.
fn rows_matrix(rows: Vec<Vec<f64>>) -> PyResult<DMatrix<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_cols) {
        Err(Error::ShapeMismatch(
            "rows of V have different lengths".into(),
        ))?;
    }
    Ok(DMatrix::from_row_iterator(
        n_rows,
        n_cols,
        rows.into_iter().flatten(),
    ))
}

#[pymethods]
impl PyFittedFunction {
    /// Evaluate the fitted function.
    ///
    /// Parameters
    /// ----------
    /// x :
    ///     A single value or a list of values.
    pub fn __call__(&self, py: Python<'_>, x: MaybeVec<f64>) -> PyResult<MaybeVec<f64>> {
        let values = x
            .as_slice()
            .iter()
            .map(|x| Ok(self.fit.value_from_basis(&self.basis.evaluate(py, *x)?)))
            .collect::<PyResult<Vec<f64>>>()?;
        Ok(x.with_values(values))
    }

    /// Propagated one sigma uncertainty of the fitted function.
    ///
    /// Parameters
    /// ----------
    /// x :
    ///     A single value or a list of values.
    pub fn uncertainty(&self, py: Python<'_>, x: MaybeVec<f64>) -> PyResult<MaybeVec<f64>> {
        let values = x
            .as_slice()
            .iter()
            .map(|x| {
                Ok(self
                    .fit
                    .uncertainty_from_basis(&self.basis.evaluate(py, *x)?))
            })
            .collect::<PyResult<Vec<f64>>>()?;
        Ok(x.with_values(values))
    }

    /// Best fit coefficients.
    #[getter]
    pub fn coefficients(&self) -> Vec<f64> {
        vector_values(&self.fit.coefficients)
    }

    /// Covariance matrix of the coefficients.
    #[getter]
    pub fn covariance(&self) -> Vec<Vec<f64>> {
        matrix_rows(&self.fit.covariance)
    }

    /// One sigma uncertainties of the coefficients.
    #[getter]
    pub fn std_errors(&self) -> Vec<f64> {
        vector_values(&self.fit.std_errors())
    }

    /// Coefficient of determination, None if all observed values are identical.
    #[getter]
    pub fn r_squared(&self) -> Option<f64> {
        self.fit.r_squared()
    }

    /// Residual sum of squares.
    #[getter]
    pub fn rss(&self) -> f64 {
        self.fit.rss()
    }

    /// Residual degrees of freedom.
    #[getter]
    pub fn degrees_of_freedom(&self) -> usize {
        self.fit.degrees_of_freedom()
    }

    fn __repr__(&self) -> String {
        format!(
            "FittedFunction(coefficients={:?}, r_squared={:?})",
            self.coefficients(),
            self.fit.r_squared()
        )
    }
}

/// Linear fit for a list of functions.
///
/// Parameters
/// ----------
/// flist :
///     List of functions, or a :py:class:`FunctionArray`.
/// x :
///     x-values for the fit.
/// y :
///     Function values for the corresponding x.
/// dy :
///     Uncorrelated errors of the y-values.
/// V :
///     Covariance matrix for the y-values, this takes precedence over dy.
/// justfit :
///     If neither dy nor V is given, return the unweighted fit without estimating
///     the covariance of the coefficients from the residuals.
///
/// Returns
/// -------
/// tuple
///     ``(a, V_a, R^2, regfunc)``, the best fit coefficients, their covariance
///     matrix, the coefficient of determination (None if all y are identical), and
///     the fitted function.
#[pyfunction]
#[pyo3(name = "lareg", signature = (flist, x, y, dy=None, V=None, justfit=false))]
#[allow(non_snake_case, reason = "Matches the Python keyword argument.")]
pub fn lareg_py(
    py: Python<'_>,
    flist: &Bound<'_, PyAny>,
    x: MaybeVec<f64>,
    y: MaybeVec<f64>,
    dy: Option<MaybeVec<f64>>,
    V: Option<Vec<Vec<f64>>>,
    justfit: bool,
) -> PyResult<(Vec<f64>, Vec<Vec<f64>>, Option<f64>, PyFittedFunction)> {
    let basis_py = PyFunctionArray::from_object(flist)?;
    let errors = CallbackErrors::default();
    let basis = basis_py.to_function_array(py, &errors)?;
    let x: Vec<f64> = x.into();
    let y: Vec<f64> = y.into();
    let dy: Option<Vec<f64>> = dy.map(Into::into);
    let cov = V.map(rows_matrix).transpose()?;

    let result =
        py.allow_threads(|| fit(&basis, &x, &y, dy.as_deref(), cov.as_ref(), justfit));

    // An exception from a basis function explains a non-finite failure better.
    if let Some(err) = errors.take() {
        return Err(err);
    }
    let result = result?;

    Ok((
        vector_values(&result.coefficients),
        matrix_rows(&result.covariance),
        result.r_squared(),
        PyFittedFunction {
            fit: result,
            basis: basis_py,
        },
    ))
}
