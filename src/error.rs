use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonascaError {
    #[error("Transport error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Column '{column}' not found in element {element}")]
    ColumnNotFound { column: String, element: String },

    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Query error: {message}")]
    Query { message: String },
}

impl From<reqwest::Error> for MonascaError {
    fn from(err: reqwest::Error) -> Self {
        MonascaError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type MonascaResult<T> = Result<T, MonascaError>;
