//! Chroma-compatible HTTP vector store.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::instrument;

use bandgrade_core::model::TaskType;
use bandgrade_core::traits::{RubricChunk, RubricStore};

use crate::embed::Embedder;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for a Chroma-style vector store collection.
pub struct ChromaStore {
    base_url: String,
    collection: String,
    embedder: Arc<dyn Embedder>,
    client: reqwest::Client,
    /// Collection id, resolved lazily on first use.
    collection_id: OnceCell<String>,
}

/// One chunk staged for upsert, with its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub task_type: String,
    pub source_file: String,
    pub chunk_index: usize,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
}

impl ChromaStore {
    pub fn new(base_url: &str, collection: &str, embedder: Arc<dyn Embedder>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            embedder,
            client,
            collection_id: OnceCell::new(),
        }
    }

    /// Get or create the collection and return its id.
    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .post(format!("{}/api/v1/collections", self.base_url))
                    .json(&json!({
                        "name": self.collection,
                        "get_or_create": true,
                    }))
                    .send()
                    .await
                    .context("vector store unreachable")?;

                if !response.status().is_success() {
                    anyhow::bail!(
                        "vector store returned {} for collection {}",
                        response.status(),
                        self.collection
                    );
                }

                let parsed: CollectionResponse = response
                    .json()
                    .await
                    .context("failed to parse collection response")?;
                Ok::<_, anyhow::Error>(parsed.id)
            })
            .await?;
        Ok(id)
    }

    /// Upsert chunks with pre-computed embeddings.
    #[instrument(skip(self, chunks, embeddings), fields(count = chunks.len()))]
    pub async fn upsert(&self, chunks: &[StoredChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            );
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let collection_id = self.collection_id().await?;
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        let documents: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let metadatas: Vec<serde_json::Value> = chunks
            .iter()
            .map(|c| {
                json!({
                    "task_type": c.task_type,
                    "source_file": c.source_file,
                    "chunk_index": c.chunk_index,
                })
            })
            .collect();

        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/upsert",
                self.base_url, collection_id
            ))
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": documents,
                "metadatas": metadatas,
            }))
            .send()
            .await
            .context("vector store unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("upsert failed with status {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl RubricStore for ChromaStore {
    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn retrieve(&self, task_type: TaskType, k: usize) -> Result<Vec<RubricChunk>> {
        let codes: Vec<&str> = task_type
            .modality()
            .criteria()
            .iter()
            .map(|c| c.code())
            .collect();
        let query = format!(
            "IELTS {task_type} band descriptors rubric {}",
            codes.join(" ")
        );

        let embedding = self
            .embedder
            .embed(&[query])
            .await?
            .into_iter()
            .next()
            .context("embeddings API returned no vector")?;

        let collection_id = self.collection_id().await?;
        let response = self
            .client
            .post(format!(
                "{}/api/v1/collections/{}/query",
                self.base_url, collection_id
            ))
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": k,
                "where": {"task_type": task_type.to_string()},
            }))
            .send()
            .await
            .context("vector store unreachable")?;

        if !response.status().is_success() {
            anyhow::bail!("query failed with status {}", response.status());
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .context("failed to parse query response")?;

        Ok(parsed
            .documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|text| RubricChunk { text })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
        }
    }

    async fn mount_collection(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/v1/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "col-123", "name": "ielts_rubrics"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn retrieve_filters_by_task_type() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/collections/col-123/query"))
            .and(body_string_contains("\"task_type\":\"task_2\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [["Band 7: addresses all parts of the task.", "Band 6: addresses the task."]],
                "ids": [["a", "b"]]
            })))
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri(), "ielts_rubrics", Arc::new(FixedEmbedder));
        let chunks = store.retrieve(TaskType::Task2, 2).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("Band 7"));
    }

    #[tokio::test]
    async fn retrieve_empty_collection() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/collections/col-123/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [[]]
            })))
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri(), "ielts_rubrics", Arc::new(FixedEmbedder));
        let chunks = store.retrieve(TaskType::AcademicTask1, 8).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn unreachable_store_is_an_error() {
        let store = ChromaStore::new("http://127.0.0.1:1", "c", Arc::new(FixedEmbedder));
        assert!(store.retrieve(TaskType::Task2, 8).await.is_err());
    }

    #[tokio::test]
    async fn upsert_sends_all_fields() {
        let server = MockServer::start().await;
        mount_collection(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/collections/col-123/upsert"))
            .and(body_string_contains("\"rubric.md-0\""))
            .and(body_string_contains("\"task_type\":\"task_2\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = ChromaStore::new(&server.uri(), "ielts_rubrics", Arc::new(FixedEmbedder));
        let chunks = vec![StoredChunk {
            id: "rubric.md-0".into(),
            text: "Band 7: good.".into(),
            task_type: "task_2".into(),
            source_file: "rubric.md".into(),
            chunk_index: 0,
        }];
        store.upsert(&chunks, &[vec![0.1, 0.2]]).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_rejects_length_mismatch() {
        let store = ChromaStore::new("http://127.0.0.1:1", "c", Arc::new(FixedEmbedder));
        let chunks = vec![StoredChunk {
            id: "x-0".into(),
            text: "t".into(),
            task_type: "task_2".into(),
            source_file: "x".into(),
            chunk_index: 0,
        }];
        assert!(store.upsert(&chunks, &[]).await.is_err());
    }
}
