//! # py-tally-limit
//!
//! `py-tally-limit` a Python wrapper for `tally-limit`.


mod python;

#[pyo3::prelude::pymodule]
fn py_tally_limit(
    m: pyo3::prelude::Bound<'_, pyo3::prelude::PyModule>,
) -> pyo3::prelude::PyResult<()> {
    python::init_python_module(&m)?;
    Ok(())
}
