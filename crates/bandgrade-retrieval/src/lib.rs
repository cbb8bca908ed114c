//! bandgrade-retrieval — Rubric retrieval over a vector store.
//!
//! Embeds band-descriptor queries with the OpenAI embeddings API and
//! serves rubric excerpts from a Chroma-compatible HTTP store. Also
//! provides the ingestion pipeline that chunks rubric files, embeds
//! them in batches, and upserts them with task-type metadata.

pub mod embed;
pub mod ingest;
pub mod store;

pub use embed::EmbeddingClient;
pub use ingest::{chunk_text, ingest_file, IngestReport};
pub use store::ChromaStore;
