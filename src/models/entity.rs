use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AttributeCategory, Language, NumericMetric};

/// One canonical value of the reference dataset ("Quận 7", "apartment", ...).
///
/// Entities are created at bootstrap or through pending-item approval and are
/// never deleted; retiring a value means `active = false`, which hides it from
/// the matcher while keeping historical extractions resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntity {
    pub id: i64,
    pub category: AttributeCategory,
    /// Unique within `category`; snake_case ASCII (e.g. `district_7`).
    pub canonical_code: String,
    pub canonical_name_en: String,
    /// Display strings keyed by language, materialized from the translations
    /// table on load.
    pub display_names: BTreeMap<Language, String>,
    /// Lower-cased alternate spellings, unique within `category`.
    pub aliases: Vec<String>,
    pub active: bool,
    pub numeric_ranges: Vec<NumericRange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReferenceEntity {
    /// Display string in `lang`, falling back to the English canonical name.
    pub fn display_name(&self, lang: Language) -> &str {
        self.display_names
            .get(&lang)
            .map(String::as_str)
            .unwrap_or(&self.canonical_name_en)
    }
}

/// Row model for the translations table; `(entity_id, lang_code)` unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub entity_id: i64,
    pub lang_code: Language,
    pub text: String,
}

/// Observed statistical range for a numeric metric on one entity, e.g. a
/// district's historical price-per-m². Consulted by plausibility validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub entity_id: i64,
    pub metric: NumericMetric,
    pub min_value: f64,
    pub avg_value: f64,
    pub max_value: f64,
}

// ------ Bootstrap seed shapes ------

/// Entity definition as embedded in `resources/seed/reference_seed.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntity {
    pub category: AttributeCategory,
    pub canonical_code: String,
    pub canonical_name_en: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<Language, String>,
    #[serde(default)]
    pub ranges: Vec<SeedRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRange {
    pub metric: NumericMetric,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedFile {
    pub entities: Vec<SeedEntity>,
}
