//! Evaluation services: fingerprinting, ingestion, scoring, and aggregation.

pub mod aggregator;
pub mod classifier;
pub mod dispatcher;
pub mod enrichment;
pub mod fingerprint;
pub mod ingest;
pub mod llm;
pub mod store;
pub mod transcription;
pub mod worker;
