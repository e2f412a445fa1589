//! # nl-code-search
//!
//! A natural-language front end for code search. Questions are translated
//! into Zoekt queries, run against a Zoekt keyword index and/or a Chroma
//! vector store, and the results are fused into one ranked list. Count and
//! yes/no questions additionally get a direct answer.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────┐
//!                       │     Question      │
//!                       └────────┬─────────┘
//!                                │
//!              ┌─────────────────┼──────────────────┐
//!              ▼ direct=true     ▼ completion up     ▼ otherwise
//!       ┌─────────────┐  ┌────────────────┐  ┌────────────────┐
//!       │  Verbatim   │  │ LLM translator │─▶│    Pattern     │
//!       │   query     │  │ grounding +    │  │   translator   │
//!       └──────┬──────┘  │ repair stages  │  │  (total, 0.7)  │
//!              │         └───────┬────────┘  └───────┬────────┘
//!              │                 │ query or direct answer
//!              └─────────────────┼───────────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │  Orchestrator (mode)      │
//!                  │  keyword ║ semantic       │
//!                  │  (tokio::join!)           │
//!                  └─────────────┬─────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │  Fusion                   │
//!                  │  file also keyword hit:   │
//!                  │  score ×1.3, sim ×1.2     │
//!                  │  clamp to 1, stable sort  │
//!                  └─────────────┬─────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │  Count / yes-no answers   │
//!                  └───────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for backends, models and tuning
//! - [`backends`] - Capability traits and startup probing of the external services
//! - [`models`] - Shared types: `Intent`, keyword/semantic matches, request/response bodies
//! - [`query`] - Zoekt query grammar and the LLM-output repair stages
//! - [`translate`] - Pattern and LLM translators with single-hop fallback
//! - [`search::zoekt`] - Zoekt JSON API client
//! - [`search::vector`] - Chroma collection client
//! - [`search::orchestrator`] - Mode-driven keyword/semantic retrieval
//! - [`search::hybrid`] - Cross-backend score boosting
//! - [`search::snippets`] - Budgeted snippet extraction for prompts
//! - [`search::answers`] - Count and yes/no answers
//! - [`llm`] - Embedding and completion clients, snippet-grounded answers
//! - [`chunking`] / [`indexer`] - Building the semantic index from a directory
//! - [`api`] - Axum handlers for `/search`, `/ask`, `/index`, `/stats`
//! - [`state`] - Shared application state

pub mod api;
pub mod backends;
pub mod chunking;
pub mod config;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod query;
pub mod search;
pub mod state;
pub mod translate;
