#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CpkError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Input table has no rows")]
    EmptyInput,

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
impl From<CpkError> for PyErr {
    fn from(err: CpkError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for CpkError {
    fn from(err: PyErr) -> Self {
        CpkError::General(err.to_string())
    }
}
