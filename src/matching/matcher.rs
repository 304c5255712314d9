//! Reference matching: exact → alias → fuzzy, in strict tier order.
//!
//! A cheaper tier always preempts a more expensive one, so a registered
//! spelling can never lose to a fuzzy guess. All lookups run against an
//! injected snapshot; this module performs no I/O.

use serde::{Deserialize, Serialize};

use crate::matching::similarity::{fold, normalize, Similarity};
use crate::matching::snapshot::ReferenceSnapshot;
use crate::models::entity::ReferenceEntity;
use crate::models::enums::{AttributeCategory, Language, MatchMethod};

/// A categorical value resolved to a canonical entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedAttribute {
    pub attribute_name: String,
    pub reference_entity_id: i64,
    /// The entity's `canonical_code` (e.g. `district_7`).
    pub canonical_value: String,
    /// Display string in the request's language, English fallback.
    pub display_value: String,
    pub confidence: f32,
    pub match_method: MatchMethod,
}

/// Outcome of matching one `(category, value, language)` triple.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(MatchedAttribute),
    /// No tier reached the bar; carries the best fuzzy score seen so the
    /// caller can log how close the value came.
    Unmatched { best_score: f32 },
}

/// Match `value` against the active entities of `category`.
///
/// Tiers:
/// 1. exact: case-insensitive equality with the canonical code, the English
///    name, or the translation in `source_language`; confidence 1.0
/// 2. alias: membership in the category's alias set; confidence 1.0 when
///    the lowercased input equals the stored alias, 0.95 when it only
///    matches after diacritic folding
/// 3. fuzzy: best similarity score over canonical and translated names;
///    accepted at or above `fuzzy_threshold`, score becomes the confidence
///
/// Equal fuzzy scores resolve to the lower entity id (snapshots order
/// entities by id, so the first maximum seen wins).
pub fn match_value(
    snapshot: &ReferenceSnapshot,
    category: AttributeCategory,
    value: &str,
    source_language: Language,
    similarity: &dyn Similarity,
    fuzzy_threshold: f32,
) -> MatchOutcome {
    let needle = normalize(value);
    if needle.is_empty() {
        return MatchOutcome::Unmatched { best_score: 0.0 };
    }
    let folded_needle = fold(value);
    let active = || snapshot.entities(category).iter().filter(|e| e.active);

    // Tier 1: exact
    for entity in active() {
        let exact = normalize(&entity.canonical_code) == needle
            || normalize(&entity.canonical_name_en) == needle
            || entity
                .display_names
                .get(&source_language)
                .is_some_and(|name| normalize(name) == needle);
        if exact {
            return MatchOutcome::Matched(matched(
                category,
                entity,
                source_language,
                1.0,
                MatchMethod::Exact,
            ));
        }
    }

    // Tier 2: alias, literal spellings first so a diacritic-folded hit on an
    // earlier entity cannot shadow a verbatim registered spelling
    for entity in active() {
        if entity.aliases.iter().any(|a| a == &needle) {
            return MatchOutcome::Matched(matched(
                category,
                entity,
                source_language,
                1.0,
                MatchMethod::Alias,
            ));
        }
    }
    for entity in active() {
        if entity.aliases.iter().any(|a| fold(a) == folded_needle) {
            return MatchOutcome::Matched(matched(
                category,
                entity,
                source_language,
                0.95,
                MatchMethod::Alias,
            ));
        }
    }

    // Tier 3: fuzzy
    let mut best: Option<(f32, &ReferenceEntity)> = None;
    for entity in active() {
        let score = candidate_names(entity)
            .map(|name| similarity.score(value, name))
            .fold(0.0f32, f32::max);
        let improves = match best {
            Some((best_score, _)) => score > best_score,
            None => score > 0.0,
        };
        if improves {
            best = Some((score, entity));
        }
    }

    match best {
        Some((score, entity)) if score >= fuzzy_threshold => MatchOutcome::Matched(matched(
            category,
            entity,
            source_language,
            score,
            MatchMethod::Fuzzy,
        )),
        Some((score, _)) => MatchOutcome::Unmatched { best_score: score },
        None => MatchOutcome::Unmatched { best_score: 0.0 },
    }
}

fn candidate_names(entity: &ReferenceEntity) -> impl Iterator<Item = &str> {
    std::iter::once(entity.canonical_code.as_str())
        .chain(std::iter::once(entity.canonical_name_en.as_str()))
        .chain(entity.display_names.values().map(String::as_str))
}

fn matched(
    category: AttributeCategory,
    entity: &ReferenceEntity,
    language: Language,
    confidence: f32,
    method: MatchMethod,
) -> MatchedAttribute {
    MatchedAttribute {
        attribute_name: category.as_str().to_string(),
        reference_entity_id: entity.id,
        canonical_value: entity.canonical_code.clone(),
        display_value: entity.display_name(language).to_string(),
        confidence,
        match_method: method,
    }
}
