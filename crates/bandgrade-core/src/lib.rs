//! bandgrade-core — Data model, scoring rules, and the grading engine.
//!
//! This crate defines the band-score data model, the deterministic scoring
//! logic (half-band rounding, length penalties, score/feedback consistency
//! adjustment), and the engine that drives one evaluation end to end.

pub mod consistency;
pub mod engine;
pub mod error;
pub mod model;
pub mod prompt;
pub mod scoring;
pub mod traits;
pub mod verdict;
