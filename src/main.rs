use std::sync::Arc;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use marketplace_onboarding::client::HttpOnboardingApi;
use marketplace_onboarding::config::OnboardingConfig;
use marketplace_onboarding::onboarding::{
    SubmissionCoordinator, VerificationOrchestrator, WizardSession, onboarding_routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = OnboardingConfig::from_env().context("Invalid onboarding configuration")?;

    let verified_kinds: Vec<String> = config
        .verification
        .kinds()
        .map(|k| k.to_string())
        .collect();
    eprintln!("Marketplace onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Back office: {}", config.api_base_url);
    eprintln!("   Registry checks: {}", verified_kinds.join(", "));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.port);
    eprintln!("   Events: ws://0.0.0.0:{}/ws\n", config.port);

    // ── Collaborators ───────────────────────────────────────────────────
    let api = Arc::new(
        HttpOnboardingApi::new(
            config.api_base_url.clone(),
            config.api_token,
            config.http_timeout,
        )
        .context("Failed to build back-office client")?,
    );

    let session = WizardSession::new(
        VerificationOrchestrator::new(api.clone(), config.verification),
        SubmissionCoordinator::new(api.clone()),
        api,
    );
    tracing::info!(session_id = %session.id(), "Onboarding session created");

    // ── Server ──────────────────────────────────────────────────────────
    let app = onboarding_routes(session).layer(
        ServiceBuilder::new().layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
