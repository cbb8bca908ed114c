//! bandgrade-providers — Hosted model clients and configuration.
//!
//! Implements the `ChatModel` and `Transcriber` traits from
//! `bandgrade-core` against an OpenAI-compatible API, plus a mock backend
//! for tests, process configuration, and image attachment handling.

pub mod config;
pub mod image;
pub mod mock;
pub mod openai;

pub use config::{load_config, load_config_from, BandgradeConfig};
pub use openai::OpenAiClient;
