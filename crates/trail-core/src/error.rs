use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrailError {
    #[error(
        "Invalid time format: '{0}'. Use 'now', '<number> <unit> ago' \
         (second, minute, hour, day, week, month), or an absolute date/time \
         such as '2024-01-15T10:30:00Z' or '2024-01-15'"
    )]
    InvalidTimeFormat(String),

    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Query submission failed: {0}")]
    Submission(String),

    #[error("CloudTrail request failed: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TrailError {
    fn from(e: serde_json::Error) -> Self {
        TrailError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for TrailError {
    fn from(e: std::io::Error) -> Self {
        TrailError::Collaborator(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrailError>;
