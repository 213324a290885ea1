//! Crate-level error taxonomy.
//!
//! Every failure the client can surface maps onto one [`EnrichError`]
//! variant. None of them is fatal to the client: the controller resets its
//! view after each one so a fresh upload/submit cycle can start.

use std::time::Duration;

use thiserror::Error;

use crate::validate::FieldError;

/// Failure of the `/upload` request or of the client-side pre-upload check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// No file was given, or the path does not exist.
    #[error("please select a file to upload ({0})")]
    MissingFile(String),
    /// Extension check rejected the file before any request was sent.
    #[error("please upload a CSV file (got {0})")]
    NotCsv(String),
    /// The server redirected to the login flow: the session has expired.
    #[error("session expired, log in again at {location}")]
    SessionExpired { location: String },
    /// Non-success status or an `{error}` body.
    #[error("server rejected upload (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// Success status but the body lacked a required field.
    #[error("malformed upload response: {0}")]
    Malformed(String),
    /// TCP/TLS level failure.
    #[error("upload request failed: {0}")]
    Transport(String),
}

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Local form validation failed; nothing was submitted.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Channel could not be (re)established, or was lost mid-session.
    #[error("connection error: {0}")]
    Connection(String),

    /// No channel, no acknowledgment, or the server rejected the submission.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Server-reported failure during processing.
    #[error("processing failed: {0}")]
    Processing(String),

    /// No progress push arrived within the stall window.
    #[error(
        "no progress updates received for {}s; the process might be stuck",
        .window.as_secs()
    )]
    Stall { window: Duration },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Field;

    #[test]
    fn test_validation_display_lists_every_field() {
        let err = EnrichError::Validation(vec![
            FieldError::new(Field::ApiKey, "API key is required"),
            FieldError::new(Field::RowLimit, "Please enter a valid number of rows"),
        ]);
        let text = err.to_string();
        assert!(text.contains("api_key: API key is required"));
        assert!(text.contains("row_limit: Please enter a valid number of rows"));
    }

    #[test]
    fn test_upload_error_is_transparent() {
        let err: EnrichError = UploadError::NotCsv("data.txt".into()).into();
        assert_eq!(err.to_string(), "please upload a CSV file (got data.txt)");
    }

    #[test]
    fn test_stall_display_uses_whole_seconds() {
        let err = EnrichError::Stall { window: Duration::from_secs(10) };
        assert!(err.to_string().contains("10s"));
    }
}
