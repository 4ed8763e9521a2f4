use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClimaError>;

#[derive(Debug, Error)]
pub enum ClimaError {
    /// Geocoding returned nothing, or a remove/lookup target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    #[error("registry already holds the maximum of {max} cities, remove one first")]
    CapacityExceeded { max: usize },

    #[error("city '{0}' is already tracked")]
    DuplicateCity(String),

    /// Network or HTTP failure talking to the weather provider
    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("persistence error at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },
}

impl ClimaError {
    pub fn persistence(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClimaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedPayload(err.to_string())
        } else {
            Self::Provider(err.to_string())
        }
    }
}
