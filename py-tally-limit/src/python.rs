use std::num::NonZeroUsize;
use std::time::Duration;

use pyo3::prelude::*;

use tally_limit::KeyedStrategy;
use tally_limit::WindowLog;

/// A dummy function to verify the Python bindings.
#[pyfunction]
fn hello() -> PyResult<String> {
    Ok("Hello from tally-limit!".to_string())
}

#[pyclass(name = "WindowLog")]
struct PyWindowLog(WindowLog);

#[pymethods]
impl PyWindowLog {
    #[new]
    fn new(capacity: usize, window_secs: u64) -> PyResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>("capacity must be non-zero")
        })?;
        let window = Duration::from_secs(window_secs);
        Ok(PyWindowLog(WindowLog::new(capacity, window)))
    }

    /// Returns True when the request attributed to `key` is admitted.
    fn check(&self, key: &str) -> bool {
        self.0.process(key).is_continue()
    }

    fn sweep(&self) {
        self.0.sweep()
    }

    fn tracked_clients(&self) -> usize {
        self.0.tracked_clients()
    }
}

pub fn init_python_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(hello, m)?)?;
    m.add_class::<PyWindowLog>()?;
    Ok(())
}
