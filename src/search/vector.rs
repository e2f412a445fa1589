//! Chroma vector store client (HTTP API v1).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::backends::VectorStore;
use crate::config::ChromaConfig;
use crate::models::{ChunkKind, IndexedChunk, SemanticMatch};

/// Chroma collection addressed by name; the id is resolved on first use.
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<ChunkMetadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ChunkMetadata {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    start_line: usize,
    #[serde(default)]
    end_line: usize,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    language: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: &'a [Vec<f32>],
    documents: Vec<&'a str>,
    metadatas: Vec<ChunkMetadata>,
}

impl ChromaStore {
    pub fn new(client: reqwest::Client, config: ChromaConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection,
            collection_id: OnceCell::new(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn collection_url(&self) -> Result<String> {
        let id = self
            .collection_id
            .get_or_try_init(|| self.get_or_create_collection())
            .await?;
        Ok(format!("{}/api/v1/collections/{id}", self.base_url))
    }

    async fn get_or_create_collection(&self) -> Result<String> {
        let url = format!("{}/api/v1/collections", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&CreateCollectionRequest {
                name: &self.collection,
                get_or_create: true,
            })
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call Chroma collections API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chroma collections API returned {status}: {body}");
        }

        let body: CollectionResponse = resp
            .json()
            .await
            .context("Failed to parse Chroma collection response")?;
        tracing::debug!("Using Chroma collection '{}' ({})", self.collection, body.id);
        Ok(body.id)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn count(&self) -> Result<usize> {
        let url = format!("{}/count", self.collection_url().await?);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call Chroma count API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chroma count API returned {status}: {body}");
        }

        resp.json().await.context("Failed to parse Chroma count response")
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SemanticMatch>> {
        let url = format!("{}/query", self.collection_url().await?);
        let req = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: top_k,
            include: ["documents", "metadatas", "distances"],
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call Chroma query API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chroma query API returned {status}: {body}");
        }

        let body: QueryResponse = resp
            .json()
            .await
            .context("Failed to parse Chroma query response")?;

        Ok(into_matches(body))
    }

    async fn add(&self, chunks: &[IndexedChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let url = format!("{}/add", self.collection_url().await?);
        let req = AddRequest {
            ids: chunks.iter().map(|c| c.id.as_str()).collect(),
            embeddings,
            documents: chunks.iter().map(|c| c.content.as_str()).collect(),
            metadatas: chunks
                .iter()
                .map(|c| ChunkMetadata {
                    file_name: c.file_name.clone(),
                    start_line: c.start_line,
                    end_line: c.end_line,
                    kind: c.kind.as_str().to_string(),
                    language: c.language.clone(),
                })
                .collect(),
        };

        let resp = self
            .client
            .post(&url)
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call Chroma add API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Chroma add API returned {status}: {body}");
        }

        Ok(())
    }
}

/// Flattens the single-query response; Chroma nests one list per query embedding.
fn into_matches(body: QueryResponse) -> Vec<SemanticMatch> {
    let ids = body.ids.into_iter().next().unwrap_or_default();
    let mut documents = body
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = body
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = body
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .map(|id| {
            let content = documents.next().flatten().unwrap_or_default();
            let meta = metadatas.next().flatten().unwrap_or_default();
            let distance = distances.next().unwrap_or(f32::INFINITY);
            SemanticMatch {
                id,
                file_name: meta.file_name,
                start_line: meta.start_line,
                end_line: meta.end_line,
                kind: ChunkKind::parse(&meta.kind),
                language: meta.language,
                similarity: distance_to_similarity(distance),
                content,
            }
        })
        .collect()
}

/// Maps a distance in [0, ∞) to a similarity in [0, 1].
pub fn distance_to_similarity(distance: f32) -> f32 {
    if distance.is_nan() || distance < 0.0 {
        return 0.0;
    }
    (1.0 / (1.0 + distance)).clamp(0.0, 1.0)
}
