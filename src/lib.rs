//! Marketplace onboarding — multi-step seller onboarding engine.

pub mod client;
pub mod config;
pub mod error;
pub mod onboarding;
