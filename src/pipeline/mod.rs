//! The extraction pipeline: free-form listing text in, canonicalized
//! attributes out.
//!
//! Stage order: language detection → baseline rules ∥ market context →
//! generative extraction → reconciliation → reference matching →
//! translation + discovery for unmatched values → validation → confidence
//! fusion. Every stage past the input checks degrades instead of failing;
//! only a reference-store outage aborts a request.

pub mod baseline;
pub mod confidence;
pub mod context;
pub mod generative;
pub mod language;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod reconcile;
pub mod translate;
pub mod types;
pub mod validate;

pub use orchestrator::ExtractionPipeline;
pub use types::{
    BaselineExtraction, CandidateAttributes, Clarification, ExtractionResult, ExtractionWarning,
};

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("listing text is empty")]
    EmptyInput,

    #[error("listing text too short for extraction (< {min_chars} characters)")]
    InputTooShort { min_chars: usize },

    /// Matching cannot run without canonical reference data, so store
    /// failures abort the request instead of degrading.
    #[error("reference store unavailable: {0}")]
    ReferenceStore(#[from] DatabaseError),
}
