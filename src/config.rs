//! Pipeline tuning knobs and data-directory helpers.
//!
//! Every threshold the cascade consults lives here so hosts can override
//! parts of the config from a file or environment without recompiling;
//! `Default` carries the tuned values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::enums::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstaraConfig {
    /// Language assumed when detection finds no usable signal.
    pub fallback_language: Language,
    /// Requests shorter than this are rejected before the pipeline runs.
    pub min_input_chars: usize,
    /// Minimum similarity score for a fuzzy reference match.
    pub fuzzy_threshold: f32,
    /// Fused confidence below this produces clarification questions.
    pub clarification_threshold: f32,
    /// Relative delta between generative and baseline numerics that counts
    /// as a disagreement.
    pub numeric_tolerance: f64,
    /// Market-context range bands are widened to `[min/k, max*k]` before a
    /// value is flagged.
    pub range_slack_k: f64,
    /// Weight of field completeness in the fused confidence score.
    pub structural_weight: f32,
    /// Weight of the mean matched-attribute confidence.
    pub match_weight: f32,
    /// Bonus applied when market context was available.
    pub context_bonus: f32,
    /// Penalty per accumulated warning.
    pub warning_penalty: f32,
    /// Comparable listings requested per context retrieval.
    pub context_k: usize,
    /// Reference snapshot age before a reload, in seconds.
    pub snapshot_ttl_secs: u64,
    pub llm: LlmConfig,
    pub search: SearchConfig,
}

impl Default for EstaraConfig {
    fn default() -> Self {
        Self {
            fallback_language: Language::Vi,
            min_input_chars: 10,
            fuzzy_threshold: 0.80,
            clarification_threshold: 0.70,
            numeric_tolerance: 0.15,
            range_slack_k: 1.5,
            structural_weight: 0.5,
            match_weight: 0.5,
            context_bonus: 0.05,
            warning_penalty: 0.05,
            context_k: 5,
            snapshot_ttl_secs: 300,
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

/// Ollama connection settings shared by the generative extractor and the
/// translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Low temperature keeps extraction output close to the source text.
    pub temperature: f32,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 30,
            temperature: 0.1,
            max_retries: 2,
        }
    }
}

/// Comparable-listing search service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8108".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Application data directory, `~/Estara` on all platforms.
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Estara")
}

/// Standard database location for hosts without their own storage layout.
pub fn default_db_path() -> PathBuf {
    data_dir().join("estara.db")
}
