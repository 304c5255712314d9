use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use super::baseline::BaselineRuleExtractor;
use super::confidence::confidence_band;
use super::context::{ContextRetriever, HttpSearchClient, MarketContext, SearchClient};
use super::generative::GenerativeExtractor;
use super::language::detect_language;
use super::llm::{LlmClient, OllamaClient};
use super::reconcile::reconcile;
use super::translate::Translator;
use super::types::{ExtractionResult, ExtractionWarning};
use super::validate::{validate, ValidationInput};
use super::ExtractError;
use crate::config::EstaraConfig;
use crate::db::repository::pending;
use crate::matching::{
    match_value, normalize, MatchOutcome, MatchedAttribute, Similarity, SnapshotStore,
    TokenSortRatio,
};
use crate::models::enums::{AttributeCategory, ListingKind, WarningKind};
use crate::models::pending::DiscoveredAttribute;

/// Runs the full extraction cascade for one listing:
/// language detection → baseline rules ∥ market context → generative
/// extraction → reconciliation → reference matching → translation +
/// discovery → validation → confidence fusion.
///
/// The pipeline holds no database connection; callers pass one per request
/// so a single instance can serve many stores. Reference data is served
/// from the shared [`SnapshotStore`] and survives collaborator outages.
pub struct ExtractionPipeline {
    llm: Box<dyn LlmClient>,
    search: Box<dyn SearchClient>,
    similarity: Box<dyn Similarity>,
    snapshots: SnapshotStore,
    config: EstaraConfig,
}

impl ExtractionPipeline {
    pub fn new(
        llm: Box<dyn LlmClient>,
        search: Box<dyn SearchClient>,
        config: EstaraConfig,
    ) -> Self {
        Self {
            llm,
            search,
            similarity: Box::new(TokenSortRatio),
            snapshots: SnapshotStore::new(Duration::from_secs(config.snapshot_ttl_secs)),
            config,
        }
    }

    /// Production wiring: Ollama for generation, the comparable-listing
    /// search service for market context.
    pub fn from_config(config: EstaraConfig) -> Self {
        let llm = Box::new(OllamaClient::new(
            &config.llm.base_url,
            &config.llm.model,
            config.llm.timeout_secs,
        ));
        let search = Box::new(HttpSearchClient::new(
            &config.search.base_url,
            config.search.timeout_secs,
        ));
        Self::new(llm, search, config)
    }

    /// The snapshot store backing this pipeline's reference lookups.
    /// Review approvals invalidate it so the next request sees the new
    /// entity.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn extract(
        &self,
        conn: &Connection,
        text: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let request_id = Uuid::new_v4();
        let _span =
            tracing::info_span!("extract_listing", request_id = %request_id).entered();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ExtractError::EmptyInput);
        }
        if trimmed.chars().count() < self.config.min_input_chars {
            return Err(ExtractError::InputTooShort {
                min_chars: self.config.min_input_chars,
            });
        }

        let mut warnings: Vec<ExtractionWarning> = Vec::new();

        // Step 1: detect the request language
        let language = detect_language(trimmed, self.config.fallback_language);

        // Step 2: baseline rules and market context in parallel. The
        // context call does network I/O; the rule pass is pure CPU.
        let retriever = ContextRetriever::new(self.search.as_ref(), self.config.context_k);
        let extractor = BaselineRuleExtractor::new();
        let (baseline, (context, context_warning)) = std::thread::scope(|scope| {
            let context_worker = scope.spawn(|| retriever.retrieve(trimmed));
            let baseline = extractor.extract(trimmed);
            let context = context_worker.join().unwrap_or_else(|_| {
                (
                    MarketContext::empty(),
                    Some(ExtractionWarning::new(
                        WarningKind::UpstreamDegraded,
                        "market context retrieval aborted",
                    )),
                )
            });
            (baseline, context)
        });
        if let Some(warning) = context_warning {
            warnings.push(warning);
        }

        // Step 3: generative extraction, grounded in the baseline hints
        // and market context. Failures fall back to the rule pass.
        let generative = GenerativeExtractor::new(
            self.llm.as_ref(),
            self.config.llm.temperature,
            self.config.llm.max_retries,
        );
        let (candidate, generative_warnings) =
            generative.extract(trimmed, language, &baseline.attributes, &context);
        let generative_ok = generative_warnings.is_empty();
        warnings.extend(generative_warnings);

        // Step 4: reconcile, generative wins per field. Gap fills are only
        // worth flagging when the model answered; in degraded mode the
        // whole candidate comes from the rules anyway.
        let reconciled = reconcile(candidate, &baseline.attributes);
        if generative_ok && !reconciled.gap_filled.is_empty() {
            warnings.push(ExtractionWarning::new(
                WarningKind::GapFilled,
                format!(
                    "rule pass supplied {}",
                    reconciled.gap_filled.join(", ")
                ),
            ));
        }
        let mut attributes = reconciled.attributes;

        if let Some(kind) = attributes
            .listing_kind
            .as_deref()
            .and_then(|k| ListingKind::from_str(k.trim().to_lowercase().as_str()).ok())
        {
            attributes.listing_kind = Some(kind.as_str().to_string());
        }

        // Step 5: resolve categorical values against the reference
        // snapshot. A store failure is the one fatal path.
        let snapshot = self.snapshots.snapshot(conn)?;
        let mut mapped: Vec<MatchedAttribute> = Vec::new();
        let mut unmatched: Vec<(AttributeCategory, String)> = Vec::new();

        for (category, value) in attributes.single_valued() {
            match match_value(
                &snapshot,
                category,
                value,
                language,
                self.similarity.as_ref(),
                self.config.fuzzy_threshold,
            ) {
                MatchOutcome::Matched(matched) => mapped.push(matched),
                MatchOutcome::Unmatched { best_score } => {
                    tracing::debug!(
                        category = category.as_str(),
                        value,
                        best_score,
                        "no reference match"
                    );
                    unmatched.push((category, value.to_string()));
                }
            }
        }

        let mut seen_amenities = HashSet::new();
        for amenity in &attributes.amenities {
            if amenity.trim().is_empty() || !seen_amenities.insert(normalize(amenity)) {
                continue;
            }
            match match_value(
                &snapshot,
                AttributeCategory::Amenity,
                amenity,
                language,
                self.similarity.as_ref(),
                self.config.fuzzy_threshold,
            ) {
                MatchOutcome::Matched(matched) => {
                    if mapped
                        .iter()
                        .any(|m| m.reference_entity_id == matched.reference_entity_id)
                    {
                        continue;
                    }
                    mapped.push(matched);
                }
                MatchOutcome::Unmatched { best_score } => {
                    tracing::debug!(value = %amenity, best_score, "no reference match");
                    unmatched.push((AttributeCategory::Amenity, amenity.clone()));
                }
            }
        }

        // Step 6: canonicalize unmatched values and queue them for
        // review. Duplicate candidates within one request count once.
        let translator = Translator::new(
            self.llm.as_ref(),
            self.config.llm.temperature,
            self.config.llm.max_retries,
        );
        let mut discovered: Vec<DiscoveredAttribute> = Vec::new();
        let mut queued: HashSet<(AttributeCategory, String)> = HashSet::new();
        for (category, value) in unmatched {
            let (suggestion, translate_warnings) =
                translator.translate(&value, category, language);
            warnings.extend(translate_warnings);
            if suggestion.canonical_candidate.is_empty() {
                tracing::debug!(value = %value, "no canonical candidate, dropping");
                continue;
            }
            if !queued.insert((category, suggestion.canonical_candidate.clone())) {
                continue;
            }
            let (pending_id, frequency) = pending::discover(
                conn,
                category.as_str(),
                &value,
                &suggestion.canonical_candidate,
                Some(suggestion.suggested_category),
                &suggestion.translations,
            )?;
            discovered.push(DiscoveredAttribute {
                pending_id,
                attribute_name: category.as_str().to_string(),
                value_original: value,
                canonical_candidate: suggestion.canonical_candidate,
                suggested_table: category.suggested_table(),
                frequency,
            });
        }

        // Step 7: validate against baseline, market bands, and stored
        // district ranges, then fuse the confidence score.
        let district_entity = mapped
            .iter()
            .find(|m| m.attribute_name == AttributeCategory::District.as_str())
            .and_then(|m| snapshot.find(AttributeCategory::District, m.reference_entity_id));
        let report = validate(
            ValidationInput {
                attributes: &attributes,
                baseline: &baseline.attributes,
                context: &context,
                district_entity,
                matched: &mapped,
                prior_warnings: warnings.len(),
            },
            &self.config,
        );
        let confidence = report.confidence;
        warnings.extend(report.warnings);

        tracing::info!(
            language = language.as_str(),
            mapped = mapped.len(),
            discovered = discovered.len(),
            warnings = warnings.len(),
            confidence,
            band = confidence_band(confidence),
            "listing extraction complete"
        );

        Ok(ExtractionResult {
            raw: attributes,
            language,
            mapped,
            new: discovered,
            confidence,
            warnings,
            clarifications: report.clarifications,
        })
    }
}
