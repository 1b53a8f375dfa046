//! Service entry point: configuration, provider selection, router, serve.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use banso_chat::adapters::ai::{MockCompletionClient, OpenAiClient, OpenAiConfig};
use banso_chat::adapters::http::{app_router, AppState};
use banso_chat::adapters::store::InMemorySessionStore;
use banso_chat::application::{ChatService, ResponseMode};
use banso_chat::config::{AiConfig, AppConfig};
use banso_chat::ports::CompletionClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let (mode, client) = select_completion_client(&config.ai).await;

    let store = Arc::new(InMemorySessionStore::with_timeout(
        config.server.session_timeout(),
    ));
    let service = ChatService::new(store.clone(), client, mode);
    let app = app_router(AppState {
        service: Arc::new(service),
        store,
    });

    let addr = config.server.socket_addr();
    tracing::info!(%addr, ?mode, "chat backend listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Decides live vs mock operation once at startup.
///
/// Mock mode is entered when forced by configuration, when no usable key is
/// present, or when the startup credential probe fails.
async fn select_completion_client(config: &AiConfig) -> (ResponseMode, Arc<dyn CompletionClient>) {
    if config.mock_mode {
        tracing::info!("mock mode forced by configuration");
        return (ResponseMode::Mock, Arc::new(MockCompletionClient::new()));
    }

    if !config.has_api_key() {
        tracing::warn!("no usable API key configured, running in mock mode");
        return (ResponseMode::Mock, Arc::new(MockCompletionClient::new()));
    }

    let client = OpenAiClient::new(OpenAiConfig::from_app_config(config));
    match client.verify_credentials().await {
        Ok(model_count) => {
            tracing::info!(models = model_count, "provider credential verified");
            (ResponseMode::Live, Arc::new(client))
        }
        Err(err) => {
            if err.is_quota_exceeded() {
                tracing::warn!("provider quota exhausted, check the billing dashboard");
            }
            tracing::warn!(error = %err, "credential probe failed, running in mock mode");
            (ResponseMode::Mock, Arc::new(MockCompletionClient::new()))
        }
    }
}
