//! Evaluation Scoring Pipeline Library
//!
//! A real-time pipeline that scores streamed records against configured
//! model ensembles and assembles schema-stable output rows.

pub mod config;
pub mod consumer;
pub mod counters;
pub mod engine;
pub mod error;
pub mod features;
pub mod models;
pub mod producer;
pub mod schema;
pub mod types;

pub use config::EvalConfig;
pub use consumer::RecordConsumer;
pub use engine::Engine;
pub use error::EngineError;
pub use features::FeatureExtractor;
pub use models::loader::SpecFileModelProvider;
pub use producer::RowProducer;
pub use types::{CaseScoreResult, Record};
