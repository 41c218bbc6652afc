//! Type definitions for the evaluation scoring pipeline

pub mod record;
pub mod score;

pub use record::{Record, RecordHeader};
pub use score::CaseScoreResult;
