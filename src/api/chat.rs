use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::Form;

use crate::api::page::{render_index, PageView};
use crate::llm::prompt::truncate_to_char_boundary;
use crate::models::ChatForm;
use crate::state::AppState;

const MAX_QUERY_LEN: usize = 2000;

/// GET /: empty chat page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.config.site, &PageView::default()).into_string())
}

/// POST /: answer the submitted question and render it below the form.
pub async fn ask(
    State(state): State<AppState>,
    Form(form): Form<ChatForm>,
) -> Result<(StatusCode, Html<String>), (StatusCode, String)> {
    let site = &state.config.site;
    let query = truncate_to_char_boundary(form.query.trim(), MAX_QUERY_LEN);

    if query.is_empty() {
        let view = PageView {
            notice: Some("Please enter a question."),
            ..PageView::default()
        };
        return Ok((
            StatusCode::BAD_REQUEST,
            Html(render_index(site, &view).into_string()),
        ));
    }

    let _permit = state
        .request_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    tracing::info!("Processing query: {query}");
    let answer = state.rag.answer(query).await;
    tracing::info!(
        "Answered with {} chars (context documents: {})",
        answer.text.len(),
        answer.sources.len()
    );

    let view = PageView {
        query,
        answer: Some(&answer.text),
        notice: None,
        sources: &answer.sources,
    };
    Ok((StatusCode::OK, Html(render_index(site, &view).into_string())))
}
