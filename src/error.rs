//! Error types for the onboarding engine.
//!
//! Only the I/O-performing layers (verification, OTP, submission) produce
//! these. The registry, evaluator and guard return plain booleans/lists.

use std::time::Duration;

use crate::onboarding::validation::FieldError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("This onboarding is open read-only")]
    ReadOnly,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Transport-level failures talking to the back-office API or a registry.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One-time-password round trip errors.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("No {channel} on file to send a code to")]
    MissingTarget { channel: String },

    #[error("The code entered for {channel} is incorrect")]
    Rejected { channel: String },

    #[error("{channel} changed while the code was being verified")]
    TargetChanged { channel: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Submission failures. `Display` is the user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The server rejected the payload; its message is surfaced verbatim.
    #[error("{message}")]
    Rejected { message: String },

    #[error("{0}")]
    Incomplete(String),

    /// Fields on some step fail validation.
    #[error("Please correct the highlighted fields before submitting")]
    Invalid { errors: Vec<FieldError> },

    #[error("Continue to {step} to submit")]
    StepNotReached { step: String },

    #[error("This onboarding is open read-only and cannot be submitted")]
    ReadOnly,

    #[error("A submission is already in progress")]
    InProgress,

    #[error("Something went wrong while submitting. Please try again.")]
    Transport(#[source] ApiError),
}

impl SubmissionError {
    /// Shown when the server gives no message of its own.
    pub const GENERIC_MESSAGE: &'static str =
        "Something went wrong while submitting. Please try again.";
}
