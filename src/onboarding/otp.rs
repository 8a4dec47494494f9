//! One-time-password verification of the owner's phone and email.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::FormSnapshot;
use crate::error::ApiError;

/// Which contact an OTP is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpChannel {
    Phone,
    Email,
}

impl OtpChannel {
    /// Request body key the OTP service expects for this channel.
    pub fn target_key(&self) -> &'static str {
        match self {
            Self::Phone => "phoneNumber",
            Self::Email => "email",
        }
    }

    /// The owner's current contact value for this channel.
    pub fn target<'a>(&self, snapshot: &'a FormSnapshot) -> &'a str {
        match self {
            Self::Phone => snapshot.personal.phone.trim(),
            Self::Email => snapshot.personal.email.trim(),
        }
    }

    pub fn is_verified(&self, snapshot: &FormSnapshot) -> bool {
        match self {
            Self::Phone => snapshot.personal.phone_verified,
            Self::Email => snapshot.personal.email_verified,
        }
    }

    pub fn mark_verified(&self, snapshot: &mut FormSnapshot) {
        match self {
            Self::Phone => snapshot.personal.phone_verified = true,
            Self::Email => snapshot.personal.email_verified = true,
        }
    }
}

impl std::fmt::Display for OtpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phone => write!(f, "phone"),
            Self::Email => write!(f, "email"),
        }
    }
}

impl std::str::FromStr for OtpChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown OTP channel: {other}")),
        }
    }
}

/// External OTP service.
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Send a code to `target`.
    async fn send(&self, channel: OtpChannel, target: &str) -> Result<(), ApiError>;

    /// Check a code. `Ok(false)` means the service answered and said no.
    async fn verify(&self, channel: OtpChannel, target: &str, otp: &str)
    -> Result<bool, ApiError>;
}
