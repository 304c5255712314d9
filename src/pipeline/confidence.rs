//! Confidence fusion.
//!
//! Combines a structural completeness score with the mean matched-attribute
//! confidence, adds a small bonus when market context was available and
//! subtracts a penalty per warning. All weights live in `EstaraConfig`.

use crate::config::EstaraConfig;
use crate::matching::MatchedAttribute;
use crate::pipeline::context::MarketContext;
use crate::pipeline::types::CandidateAttributes;

/// Confidence bands for host-side handling of results.
pub mod thresholds {
    /// Below this: treat the extraction as a draft.
    pub const LOW: f32 = 0.40;

    /// Above this: extraction is dependable without a second look.
    pub const HIGH: f32 = 0.85;
}

/// Band label for logs and result consumers.
pub fn confidence_band(score: f32) -> &'static str {
    if score >= thresholds::HIGH {
        "high"
    } else if score >= thresholds::LOW {
        "medium"
    } else {
        "low"
    }
}

pub fn fuse_confidence(
    attributes: &CandidateAttributes,
    matched: &[MatchedAttribute],
    context: &MarketContext,
    warning_count: usize,
    config: &EstaraConfig,
) -> f32 {
    let structural = structural_score(attributes);
    let matching = match_score(matched);

    let mut fused = config.structural_weight * structural + config.match_weight * matching;
    if !context.is_empty() {
        fused += config.context_bonus;
    }
    fused -= config.warning_penalty * warning_count as f32;

    fused.clamp(0.0, 1.0)
}

/// Share of the high-value fields that are populated.
fn structural_score(attributes: &CandidateAttributes) -> f32 {
    let present = [
        attributes.price_vnd.is_some(),
        attributes.area_m2.is_some(),
        attributes.district.is_some(),
        attributes.property_type.is_some(),
        attributes.listing_kind.is_some(),
    ];
    let populated = present.iter().filter(|p| **p).count();
    populated as f32 / present.len() as f32
}

/// Mean confidence over resolved attributes, zero when nothing resolved.
fn match_score(matched: &[MatchedAttribute]) -> f32 {
    if matched.is_empty() {
        return 0.0;
    }
    matched.iter().map(|m| m.confidence).sum::<f32>() / matched.len() as f32
}
