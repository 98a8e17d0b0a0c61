use axum::extract::State;
use axum::Json;

use crate::models::{DatasetInfo, HealthResponse, InfoResponse, LoadState, WarmupResponse};
use crate::state::AppState;

/// GET /health: liveness plus load status. Never triggers a load.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.rag.status();
    Json(HealthResponse {
        status: "healthy",
        rag_available: status.state == LoadState::Ready,
        load_state: status.state,
        documents_indexed: status.documents,
        transmission_lines: status.documents,
        dataset_type: state.config.dataset.label.clone(),
    })
}

/// GET /info: dataset description once loaded. Never triggers a load.
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let index = match state.rag.index() {
        Some(index) => index,
        None => {
            return Json(InfoResponse::Unavailable {
                status: "error",
                message: "RAG system not available - please check dataset files".to_string(),
            })
        }
    };

    let config = &state.config;
    Json(InfoResponse::Available(DatasetInfo {
        title: config.site.title.clone(),
        description: format!(
            "AI-powered chatbot for questions about {}",
            config.site.topic
        ),
        dataset_size: index.document_count(),
        dataset_type: config.dataset.label.clone(),
        vector_dimension: index.dimension(),
        index_metric: index.metric().name().to_string(),
        source: config.dataset.source.kind().to_string(),
        embedding_model: config.embedding.model.clone(),
        ai_model: config.llm.chat_model.clone(),
        features: vec![
            "Vector similarity search".to_string(),
            "Retrieval-augmented answers".to_string(),
            format!("Top {} context documents per query", config.top_k),
        ],
    }))
}

/// GET /warmup: load the dataset now, retrying an earlier failure.
pub async fn warmup(State(state): State<AppState>) -> Json<WarmupResponse> {
    match state.rag.ensure_loaded(true).await {
        Ok(index) => Json(WarmupResponse::WarmedUp {
            status: "warmed_up",
            rag_available: true,
            documents_indexed: index.document_count(),
            message: "RAG system loaded and ready".to_string(),
        }),
        Err(e) => Json(WarmupResponse::Failed {
            status: "warmup_failed",
            error: format!("{e:#}"),
            message: "Failed to load RAG system".to_string(),
        }),
    }
}
