//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::onboarding::model::{DocumentKind, VerificationPolicy};

/// Service configuration.
#[derive(Debug)]
pub struct OnboardingConfig {
    /// Base URL of the back-office API (OTP, registries, onboarding records).
    pub api_base_url: String,
    /// Bearer token sent to the back-office API, if it wants one.
    pub api_token: Option<SecretString>,
    /// Per-request timeout for outbound calls.
    pub http_timeout: Duration,
    /// Port the JSON surface listens on.
    pub port: u16,
    /// Which document kinds need a registry check.
    pub verification: VerificationPolicy,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            api_token: None,
            http_timeout: Duration::from_secs(30),
            port: 8080,
            verification: VerificationPolicy::default(),
        }
    }
}

impl OnboardingConfig {
    /// Read overrides from `ONBOARDING_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("ONBOARDING_API_BASE_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(invalid("ONBOARDING_API_BASE_URL", "must be an http(s) URL"));
            }
            config.api_base_url = url;
        }

        config.api_token = lookup("ONBOARDING_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        if let Some(raw) = lookup("ONBOARDING_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("ONBOARDING_HTTP_TIMEOUT_SECS", "expected whole seconds"))?;
            if secs == 0 {
                return Err(invalid("ONBOARDING_HTTP_TIMEOUT_SECS", "must be at least 1"));
            }
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("ONBOARDING_PORT") {
            config.port = raw
                .trim()
                .parse()
                .map_err(|_| invalid("ONBOARDING_PORT", "expected a port number"))?;
        }

        let mut kinds: Vec<DocumentKind> = config.verification.kinds().collect();
        if let Some(raw) = lookup("ONBOARDING_VERIFIED_KINDS") {
            kinds = parse_kinds("ONBOARDING_VERIFIED_KINDS", &raw)?;
        }
        if let Some(raw) = lookup("ONBOARDING_UNVERIFIED_KINDS") {
            let skip = parse_kinds("ONBOARDING_UNVERIFIED_KINDS", &raw)?;
            kinds.retain(|k| !skip.contains(k));
        }
        config.verification = VerificationPolicy::new(kinds);

        Ok(config)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_kinds(key: &str, raw: &str) -> Result<Vec<DocumentKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<DocumentKind>().map_err(|e| invalid(key, e)))
        .collect()
}
