use tracing_subscriber::EnvFilter;

use grid_rag::api;
use grid_rag::config::Config;
use grid_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Dataset source: {}", config.dataset.source.kind());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.chat_model);
    tracing::info!(
        "Embedding provider: {} ({})",
        config.embedding.provider,
        config.embedding.model
    );
    if config.llm.api_key.is_none() && config.llm.provider != "ollama" {
        tracing::warn!("No LLM API key configured; answers will report an error");
    }

    let state = AppState::new(config.clone())?;

    if config.dataset.eager_load {
        // A failure is remembered and reported by /health; the server still starts
        if let Err(e) = state.rag.ensure_loaded(false).await {
            tracing::warn!("Running without RAG: {e:#}");
        }
    } else {
        tracing::info!("Dataset will be loaded on first use");
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
