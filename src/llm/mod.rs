pub mod embeddings;
pub mod generate;
pub mod prompt;

/// Gemini addresses models as `models/<name>`; accept either spelling.
pub(crate) fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
