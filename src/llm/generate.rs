use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

/// Generation can take a while on long contexts; retrieval and the page
/// render are cheap by comparison.
const GENERATE_TIMEOUT_SECS: u64 = 120;

/// Send a single-turn prompt to the configured provider and return the
/// generated text.
pub async fn generate(client: &reqwest::Client, config: &LlmConfig, prompt: &str) -> Result<String> {
    match config.provider.as_str() {
        "gemini" => generate_gemini(client, config, prompt).await,
        "openai" => generate_openai(client, config, prompt).await,
        "ollama" => generate_ollama(client, config, prompt).await,
        other => anyhow::bail!("Unsupported LLM provider: {other}"),
    }
}

// ─── Gemini ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

async fn generate_gemini(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String> {
    let api_key = config
        .api_key
        .as_deref()
        .context("GOOGLE_AI_API_KEY is not set")?;
    let model = super::gemini_model_path(&config.chat_model);
    let url = format!("{}/v1beta/{model}:generateContent", config.base_url);

    let req = GeminiGenerateRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: prompt }],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
        .header("x-goog-api-key", api_key)
        .json(&req)
        .send()
        .await
        .context("Failed to call Gemini generateContent API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Gemini API returned {status}: {body}");
    }

    let body: GeminiGenerateResponse = resp
        .json()
        .await
        .context("Failed to parse Gemini response")?;
    extract_gemini_text(body)
}

fn extract_gemini_text(body: GeminiGenerateResponse) -> Result<String> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        anyhow::bail!("Prompt was blocked by the model: {reason}");
    }

    let text: String = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        anyhow::bail!("No response generated");
    }
    Ok(text)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

async fn generate_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String> {
    let api_key = config
        .api_key
        .as_deref()
        .context("LLM_API_KEY is not set")?;
    let url = format!("{}/v1/chat/completions", config.base_url);

    let req = OpenAiChatRequest {
        model: &config.chat_model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: config.temperature,
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .context("Failed to parse OpenAI chat response")?;
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.is_empty())
        .context("No response generated")
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

async fn generate_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: &config.chat_model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        stream: false,
        options: OllamaOptions {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .context("Failed to parse Ollama chat response")?;
    if body.message.content.is_empty() {
        anyhow::bail!("No response generated");
    }
    Ok(body.message.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gemini_config(base_url: &str) -> LlmConfig {
        LlmConfig {
            provider: "gemini".to_string(),
            base_url: base_url.to_string(),
            chat_model: "gemini-2.5-flash-lite".to_string(),
            api_key: Some("test-key".to_string()),
            temperature: 0.2,
        }
    }

    fn parse(json: &str) -> GeminiGenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_joins_parts() {
        let body = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Three "},{"text":"lines."}]}}]}"#,
        );
        assert_eq!(extract_gemini_text(body).unwrap(), "Three lines.");
    }

    #[test]
    fn test_extract_no_candidates() {
        let err = extract_gemini_text(parse(r#"{"candidates":[]}"#)).unwrap_err();
        assert_eq!(err.to_string(), "No response generated");
    }

    #[test]
    fn test_extract_blocked_prompt() {
        let err = extract_gemini_text(parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#))
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_gemini_request_uses_camel_case() {
        let req = GeminiGenerateRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: "hi" }],
            }],
            generation_config: GeminiGenerationConfig { temperature: 0.2 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("generationConfig").is_some());
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn test_gemini_missing_key() {
        let mut config = gemini_config("http://127.0.0.1:9");
        config.api_key = None;
        let err = generate(&reqwest::Client::new(), &config, "q").await.unwrap_err();
        assert!(err.to_string().contains("GOOGLE_AI_API_KEY"));
    }

    #[tokio::test]
    async fn test_gemini_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-lite:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(
                serde_json::json!({"generationConfig": {"temperature": 0.2}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "The 765kV line runs north."}]}}]
            })))
            .mount(&server)
            .await;

        let text = generate(&reqwest::Client::new(), &gemini_config(&server.uri()), "q")
            .await
            .unwrap();
        assert_eq!(text, "The 765kV line runs north.");
    }

    #[tokio::test]
    async fn test_gemini_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let err = generate(&reqwest::Client::new(), &gemini_config(&server.uri()), "q")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[tokio::test]
    async fn test_ollama_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "local answer"}, "done": true
            })))
            .mount(&server)
            .await;

        let config = LlmConfig {
            provider: "ollama".to_string(),
            base_url: server.uri(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
            temperature: 0.2,
        };
        let text = generate(&reqwest::Client::new(), &config, "q").await.unwrap();
        assert_eq!(text, "local answer");
    }

    #[tokio::test]
    async fn test_openai_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hosted answer"}}]
            })))
            .mount(&server)
            .await;

        let config = LlmConfig {
            provider: "openai".to_string(),
            base_url: server.uri(),
            chat_model: "gpt-4o-mini".to_string(),
            api_key: Some("sk-test".to_string()),
            temperature: 0.2,
        };
        let text = generate(&reqwest::Client::new(), &config, "q").await.unwrap();
        assert_eq!(text, "hosted answer");
    }
}
