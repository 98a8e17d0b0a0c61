//! # grid-rag
//!
//! A small web chatbot that answers questions about a fixed collection of
//! records (electrical transmission lines by default) by retrieving the
//! nearest records from a precomputed vector index and handing them to a
//! hosted language model as context.
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!            │  POST / query │
//!            └──────┬───────┘
//!                   │ trim, cap, limiter permit
//!                   ▼
//!          ┌─────────────────┐      ┌────────────────────────┐
//!          │ Query Embedding │      │ Dataset (lazy, once)   │
//!          │ (Ollama/OpenAI/ │      │ local files or blob    │
//!          │  Gemini API)    │      │ download into cache    │
//!          └────────┬────────┘      └───────────┬────────────┘
//!                   │                           │
//!                   └─────────────┬─────────────┘
//!                                 ▼
//!                    ┌────────────────────────┐
//!                    │ Exact flat index search│
//!                    │ top k, ties by position│
//!                    └───────────┬────────────┘
//!                                │ records (may be empty)
//!                                ▼
//!                    ┌────────────────────────┐
//!                    │ RAG prompt or fallback │
//!                    │ prompt → LLM generate  │
//!                    └───────────┬────────────┘
//!                                ▼
//!                    ┌────────────────────────┐
//!                    │ HTML page with answer  │
//!                    └────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, dataset and model settings
//! - [`models`] - Shared data types: `Document`, `Answer`, status response bodies
//! - [`search::flat`] - Flat vector index file codec with exact inner-product / L2 search
//! - [`search::vector`] - Index plus record array, mapping search hits to documents
//! - [`dataset::source`] - Local or remote dataset files, with a download cache
//! - [`dataset::download`] - Streaming blob download with atomic rename
//! - [`dataset::reduce`] - Priority-based dataset reduction used by `reduce-dataset`
//! - [`llm::embeddings`] - Query embedding via Ollama, OpenAI-compatible or Gemini APIs
//! - [`llm::generate`] - Answer generation via Gemini, OpenAI-compatible or Ollama APIs
//! - [`llm::prompt`] - Grounded and fallback prompt construction
//! - [`rag`] - Lazy single-flight loading, retrieval and answering
//! - [`api`] - Axum handlers for the chat page and status endpoints
//! - [`state`] - Shared application state

pub mod api;
pub mod config;
pub mod dataset;
pub mod llm;
pub mod models;
pub mod rag;
pub mod search;
pub mod state;
