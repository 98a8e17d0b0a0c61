use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::llm::prompt::truncate_to_char_boundary;

/// Queries longer than this are cut before embedding. Sentence-embedding
/// models such as all-MiniLM-L6-v2 only see the first 256 word pieces, so
/// anything beyond a few thousand characters is ignored by the model anyway.
const MAX_EMBED_CHARS: usize = 4_000;

/// Embed a batch of texts with the configured provider. The output is
/// parallel with `texts`.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let truncated: Vec<String> = texts
        .iter()
        .map(|t| truncate_to_char_boundary(t, MAX_EMBED_CHARS).to_string())
        .collect();

    let embeddings = match config.provider.as_str() {
        "ollama" => embed_ollama(client, config, &truncated).await?,
        "openai" => embed_openai(client, config, &truncated).await?,
        "gemini" => embed_gemini(client, config, &truncated).await?,
        other => anyhow::bail!("Unknown embedding provider: {other}"),
    };

    if embeddings.len() != texts.len() {
        anyhow::bail!(
            "Embedding API returned {} vectors for {} inputs",
            embeddings.len(),
            texts.len()
        );
    }
    Ok(embeddings)
}

/// Embed a single query.
pub async fn embed_single(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    text: &str,
) -> Result<Vec<f32>> {
    let results = embed_batch(client, config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .context("No embedding returned")
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);
    let req = OllamaEmbedRequest {
        model: config.model.clone(),
        input: texts.to_vec(),
        truncate: true,
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama embed API returned {status}: {body}");
    }

    let body: OllamaEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama embed response")?;
    Ok(body.embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();
    let req = OpenAiEmbedRequest {
        model: config.model.clone(),
        input: texts.to_vec(),
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI embed API returned {status}: {body}");
    }

    let body: OpenAiEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI embed response")?;
    Ok(body.data.into_iter().map(|d| d.embedding).collect())
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiBatchEmbedRequest<'a> {
    requests: Vec<GeminiEmbedRequest<'a>>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiBatchEmbedResponse {
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

async fn embed_gemini(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let api_key = config
        .api_key
        .as_deref()
        .context("Gemini embeddings need an API key (EMBEDDING_API_KEY or LLM_API_KEY)")?;
    let model = super::gemini_model_path(&config.model);
    let url = format!("{}/v1beta/{model}:batchEmbedContents", config.base_url);

    let req = GeminiBatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| GeminiEmbedRequest {
                model: model.clone(),
                content: GeminiContent {
                    parts: vec![GeminiPart { text }],
                },
            })
            .collect(),
    };

    let resp = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(&req)
        .send()
        .await
        .context("Failed to call Gemini embed API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Gemini embed API returned {status}: {body}");
    }

    let body: GeminiBatchEmbedResponse = resp
        .json()
        .await
        .context("Failed to parse Gemini embed response")?;
    Ok(body.embeddings.into_iter().map(|e| e.values).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: &str, base_url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: provider.to_string(),
            base_url: base_url.to_string(),
            model: "all-minilm".to_string(),
            api_key: Some("test-key".to_string()),
        }
    }

    #[tokio::test]
    async fn test_ollama_single() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "all-minilm"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [[0.1, 0.2, 0.3]]})),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let v = embed_single(&client, &config("ollama", &server.uri()), "345kV lines")
            .await
            .unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0]}, {"embedding": [0.0, 1.0]}]
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let texts = vec!["a".to_string(), "b".to_string()];
        let v = embed_batch(&client, &config("openai", &server.uri()), &texts)
            .await
            .unwrap();
        assert_eq!(v, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_gemini_batch_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [0.5, 0.5]}]
            })))
            .mount(&server)
            .await;

        let mut cfg = config("gemini", &server.uri());
        cfg.model = "text-embedding-004".to_string();
        let client = reqwest::Client::new();
        let v = embed_single(&client, &cfg, "substations").await.unwrap();
        assert_eq!(v, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embeddings": []})),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        assert!(embed_single(&client, &config("ollama", &server.uri()), "q")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = embed_single(&client, &config("ollama", &server.uri()), "q")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }
}
