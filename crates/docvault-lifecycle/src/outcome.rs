//! Tri-form command results
//!
//! Every controller mutation returns a `CommandOutcome`: a success flag, a message the
//! presentation layer can show as-is, and the affected record when there is one. Errors
//! are folded into the same shape, so nothing escapes to the caller as a fault.

use docvault_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
}

impl<T> CommandOutcome<T> {
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload: Some(payload),
            error_code: None,
            error_type: None,
            recoverable: false,
            suggested_action: None,
        }
    }

    /// Failure outcome built from an error's presentation metadata. Logs the error at
    /// its configured level.
    pub fn failure(error: &AppError) -> Self {
        log_error(error);
        Self {
            success: false,
            message: error.client_message(),
            payload: None,
            error_code: Some(error.error_code()),
            error_type: Some(error.error_type().to_string()),
            recoverable: error.is_recoverable(),
            suggested_action: error.suggested_action(),
        }
    }

    /// Fold a result into an outcome, building the success message from the payload.
    pub fn from_result<F>(result: Result<T, AppError>, message: F) -> Self
    where
        F: FnOnce(&T) -> String,
    {
        match result {
            Ok(payload) => {
                let message = message(&payload);
                Self::ok(message, payload)
            }
            Err(e) => Self::failure(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CommandOutcome<U> {
        CommandOutcome {
            success: self.success,
            message: self.message,
            payload: self.payload.map(f),
            error_code: self.error_code,
            error_type: self.error_type,
            recoverable: self.recoverable,
            suggested_action: self.suggested_action,
        }
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Command failed");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error.detailed_message(),
                error_type = error_type,
                "Command failed"
            );
        }
    }
}
