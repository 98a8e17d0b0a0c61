use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::{embeddings, generate, prompt};
use crate::models::{Answer, LoadState, RetrievedDocument};
use crate::search::vector::DocumentIndex;

enum Slot {
    NotLoaded,
    Loading,
    Ready(Arc<DocumentIndex>),
    Failed(String),
}

/// Retrieval-augmented answering over a lazily loaded document index.
pub struct RagEngine {
    config: Arc<Config>,
    http_client: reqwest::Client,
    slot: RwLock<Slot>,
    /// Serialises loaders so files are downloaded and parsed once
    load_lock: tokio::sync::Mutex<()>,
}

/// Restores the pre-load state if a load future is dropped before it
/// finishes, so the slot never reports `Loading` without a loader.
struct LoadingGuard<'a> {
    slot: &'a RwLock<Slot>,
    previous: Option<Slot>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot.write() = previous;
        }
    }
}

/// Point-in-time view of the loader.
#[derive(Debug, Clone)]
pub struct RagStatus {
    pub state: LoadState,
    pub documents: usize,
    pub error: Option<String>,
}

impl RagEngine {
    pub fn new(config: Arc<Config>, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            slot: RwLock::new(Slot::NotLoaded),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> RagStatus {
        match &*self.slot.read() {
            Slot::NotLoaded => RagStatus {
                state: LoadState::NotLoaded,
                documents: 0,
                error: None,
            },
            Slot::Loading => RagStatus {
                state: LoadState::Loading,
                documents: 0,
                error: None,
            },
            Slot::Ready(index) => RagStatus {
                state: LoadState::Ready,
                documents: index.document_count(),
                error: None,
            },
            Slot::Failed(e) => RagStatus {
                state: LoadState::Failed,
                documents: 0,
                error: Some(e.clone()),
            },
        }
    }

    /// The loaded index, if loading has already succeeded.
    pub fn index(&self) -> Option<Arc<DocumentIndex>> {
        match &*self.slot.read() {
            Slot::Ready(index) => Some(index.clone()),
            _ => None,
        }
    }

    /// Load the dataset unless it is already loaded. A previous failure is
    /// returned as-is unless `retry_failed` is set.
    pub async fn ensure_loaded(&self, retry_failed: bool) -> Result<Arc<DocumentIndex>> {
        if let Some(index) = self.check_slot(retry_failed)? {
            return Ok(index);
        }

        let _guard = self.load_lock.lock().await;
        // Another caller may have finished loading while we waited
        if let Some(index) = self.check_slot(retry_failed)? {
            return Ok(index);
        }

        let previous = std::mem::replace(&mut *self.slot.write(), Slot::Loading);
        let mut loading = LoadingGuard {
            slot: &self.slot,
            previous: Some(previous),
        };
        let result = self.load().await;
        loading.previous = None;

        match result {
            Ok(index) => {
                let index = Arc::new(index);
                tracing::info!(
                    "RAG system loaded: {} documents indexed ({} vectors, dimension {})",
                    index.document_count(),
                    index.vector_count(),
                    index.dimension()
                );
                *self.slot.write() = Slot::Ready(index.clone());
                Ok(index)
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!("RAG system not available: {message}");
                *self.slot.write() = Slot::Failed(message);
                Err(e)
            }
        }
    }

    fn check_slot(&self, retry_failed: bool) -> Result<Option<Arc<DocumentIndex>>> {
        match &*self.slot.read() {
            Slot::Ready(index) => Ok(Some(index.clone())),
            Slot::Failed(e) if !retry_failed => Err(anyhow::anyhow!("{e}")),
            _ => Ok(None),
        }
    }

    async fn load(&self) -> Result<DocumentIndex> {
        let dataset = &self.config.dataset;
        tracing::info!("Loading {} dataset...", dataset.source.kind());

        let files = dataset
            .source
            .materialize(
                &self.http_client,
                Duration::from_secs(dataset.download_timeout_secs),
            )
            .await?;

        tokio::task::spawn_blocking(move || {
            DocumentIndex::load(&files.index_path, &files.metadata_path)
        })
        .await
        .context("Index loading task panicked")?
    }

    /// Find up to `top_k` documents related to `query`. Failures are logged
    /// and yield no documents.
    pub async fn retrieve(&self, query: &str) -> Vec<RetrievedDocument> {
        let index = match self.ensure_loaded(false).await {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!("Retrieval skipped, RAG unavailable: {e:#}");
                return Vec::new();
            }
        };

        match self.search(&index, query).await {
            Ok(docs) => {
                tracing::info!("Retrieved {} relevant documents", docs.len());
                docs
            }
            Err(e) => {
                tracing::warn!("Error in document retrieval: {e:#}");
                Vec::new()
            }
        }
    }

    async fn search(&self, index: &DocumentIndex, query: &str) -> Result<Vec<RetrievedDocument>> {
        tracing::info!("Searching for: {query}");
        let embedding =
            embeddings::embed_single(&self.http_client, &self.config.embedding, query).await?;
        tracing::debug!(
            "Query vector dimension {}, index holds {} vectors",
            embedding.len(),
            index.vector_count()
        );

        let docs = index.search(&embedding, self.config.top_k)?;
        for doc in &docs {
            tracing::info!("  Found: {} (distance: {:.3})", doc.id, doc.distance);
        }
        Ok(docs)
    }

    /// Answer `query`, grounding the prompt in retrieved documents when any
    /// are available. Never fails: generation errors become the answer text.
    pub async fn answer(&self, query: &str) -> Answer {
        let docs = self.retrieve(query).await;
        let site = &self.config.site;

        let (prompt, used_context) = if docs.is_empty() {
            (prompt::build_fallback_prompt(site, query), false)
        } else {
            (prompt::build_rag_prompt(site, &docs, query), true)
        };

        let text = match generate::generate(&self.http_client, &self.config.llm, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Answer generation failed: {e:#}");
                format!("Sorry, I encountered an error: {e:#}")
            }
        };

        Answer {
            text,
            used_context,
            sources: docs.into_iter().map(|d| d.id).collect(),
        }
    }
}
