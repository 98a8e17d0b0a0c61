use serde::{Deserialize, Deserializer, Serialize};

/// A record of the metadata array. Its position matches the vector at the
/// same position in the index file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub content: String,
}

/// A document returned by nearest-neighbour search
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub position: usize,
    pub id: String,
    pub content: String,
    pub distance: f32,
}

/// The outcome of answering one query
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Whether retrieved documents were included in the prompt
    pub used_context: bool,
    /// Ids of the documents used as context
    pub sources: Vec<String>,
}

/// Form body of `POST /`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatForm {
    pub query: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rag_available: bool,
    pub load_state: LoadState,
    pub documents_indexed: usize,
    /// `documents_indexed` under its historical name
    pub transmission_lines: usize,
    pub dataset_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InfoResponse {
    Available(DatasetInfo),
    Unavailable { status: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub title: String,
    pub description: String,
    pub dataset_size: usize,
    pub dataset_type: String,
    pub vector_dimension: usize,
    pub index_metric: String,
    pub source: String,
    pub embedding_model: String,
    pub ai_model: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WarmupResponse {
    WarmedUp {
        status: &'static str,
        rag_available: bool,
        documents_indexed: usize,
        message: String,
    },
    Failed {
        status: &'static str,
        error: String,
        message: String,
    },
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
