//! Error types for the chat engine.

use labkeeper_core::error::LabError;

/// Caller-supplied input failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    /// A lookup could not be completed, as opposed to finding nothing.
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LabError> for ChatError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::Validation { field, message } => {
                ChatError::Validation(ValidationError { field, message })
            }
            LabError::Storage(_) | LabError::Io(_) => ChatError::Database(err.to_string()),
            other => ChatError::Internal(other.to_string()),
        }
    }
}

impl ChatError {
    /// Short tag stored in the audit log for failed messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation_error",
            ChatError::Database(_) => "database_error",
            ChatError::Internal(_) => "error",
        }
    }
}

/// Render any chat failure as a reply the user can act on.
///
/// Validation failures name the offending field, database failures ask the
/// user to retry, and everything else gets a generic apology. Internal
/// details never reach the reply.
pub fn format_error(err: &ChatError) -> String {
    match err {
        ChatError::Validation(v) => format!(
            "I couldn't process that request. Invalid {}: {}. Please check your input and try again.",
            v.field, v.message
        ),
        ChatError::Database(_) => "I'm having trouble reaching the lab database right now. \
             Please try again in a moment."
            .to_string(),
        ChatError::Internal(_) => "Sorry, something went wrong while handling your message. \
             Please try again, or contact a lab technician if the problem persists."
            .to_string(),
    }
}
