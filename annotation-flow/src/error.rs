use thiserror::Error;

/// Errors raised while navigating, binding or persisting annotations
#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Disease not found: {0}")]
    DiseaseNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Drug '{drug}' not found for disease '{disease}'")]
    DrugNotFound { disease: String, drug: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} has already annotated every drug")]
    SessionComplete(String),

    #[error("Cannot {action} while session is {phase}")]
    InvalidTransition { phase: String, action: String },

    #[error("Invalid answer for {field}: {value}")]
    InvalidAnswer { field: String, value: String },

    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AnnotationError {
    fn from(err: sqlx::Error) -> Self {
        AnnotationError::StorageError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
