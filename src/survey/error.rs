use std::time::Duration;
use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Input that is malformed or semantically invalid. Never worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid form: {0}")]
    InvalidForm(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("invalid extension: {0}")]
    InvalidExtension(String),

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}

impl ValidationError {
    /// Prefix the message with the position of the offending question
    pub fn at_question(self, position: usize) -> Self {
        let tag = |msg: String| format!("question #{}: {}", position, msg);
        match self {
            ValidationError::InvalidForm(m) => ValidationError::InvalidForm(tag(m)),
            ValidationError::InvalidQuestion(m) => ValidationError::InvalidQuestion(tag(m)),
            ValidationError::InvalidExtension(m) => ValidationError::InvalidExtension(tag(m)),
            ValidationError::InvalidAnswer(m) => ValidationError::InvalidAnswer(tag(m)),
        }
    }
}

/// Errors surfaced by the survey services
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Persistence error: {0}")]
    Persistence(#[source] DatabaseError),
}

impl SurveyError {
    pub fn not_found(what: impl Into<String>) -> Self {
        SurveyError::NotFound(what.into())
    }

    pub fn forbidden(what: impl Into<String>) -> Self {
        SurveyError::Forbidden(what.into())
    }
}

impl From<DatabaseError> for SurveyError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => SurveyError::NotFound(msg),
            DatabaseError::Timeout(limit) => SurveyError::Timeout(limit),
            other => SurveyError::Persistence(other),
        }
    }
}
