use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AttributeCategory, Language, PendingStatus};

/// One deduplicated unmatched value awaiting admin review.
///
/// At most one `pending` row exists per `(attribute_name,
/// value_canonical_candidate)`; re-discovery bumps `frequency` instead of
/// inserting. `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingItem {
    pub id: i64,
    /// Schema field the value was extracted for (e.g. "district").
    pub attribute_name: String,
    /// Verbatim text as seen in the source listing.
    pub value_original: String,
    /// Normalized snake_case candidate code, from the translator or its
    /// deterministic fallback.
    pub value_canonical_candidate: String,
    pub suggested_category: Option<AttributeCategory>,
    pub suggested_translations: BTreeMap<Language, String>,
    /// How many times this value has been discovered; ≥ 1.
    pub frequency: i64,
    pub status: PendingStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The "new value" element of an extraction result: what the pipeline reports
/// after routing an unmatched value into the review queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredAttribute {
    pub pending_id: i64,
    pub attribute_name: String,
    pub value_original: String,
    pub canonical_candidate: String,
    /// Reference table the value would grow into if approved.
    pub suggested_table: &'static str,
    pub frequency: i64,
}
