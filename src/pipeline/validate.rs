//! Cross-checks on the reconciled extraction.
//!
//! Three independent signals: the deterministic baseline (disagreement),
//! market statistics (out-of-band values), and a static plausibility table
//! (absurd values). Findings are warnings on the result, never request
//! failures. Clarification questions are produced only when the fused
//! confidence lands below the configured threshold.

use crate::config::EstaraConfig;
use crate::matching::MatchedAttribute;
use crate::models::enums::{AttributeCategory, NumericMetric, WarningKind};
use crate::models::entity::ReferenceEntity;
use crate::pipeline::confidence::fuse_confidence;
use crate::pipeline::context::MarketContext;
use crate::pipeline::types::{CandidateAttributes, Clarification, ExtractionWarning};

/// Hard bounds on listing fields. Values outside are data errors, not
/// market outliers.
struct PlausibleRange {
    field: &'static str,
    min: f64,
    max: f64,
}

const PLAUSIBLE_RANGES: &[PlausibleRange] = &[
    PlausibleRange { field: "price_vnd", min: 1.0e6, max: 1.0e13 },
    PlausibleRange { field: "area_m2", min: 5.0, max: 100_000.0 },
    PlausibleRange { field: "bedrooms", min: 1.0, max: 30.0 },
    PlausibleRange { field: "bathrooms", min: 1.0, max: 30.0 },
    PlausibleRange { field: "floors", min: 1.0, max: 150.0 },
];

/// Bathrooms may exceed bedrooms by this much before it looks like a
/// swapped or hallucinated count.
const BATHROOM_SURPLUS_LIMIT: u32 = 2;

pub struct ValidationInput<'a> {
    pub attributes: &'a CandidateAttributes,
    pub baseline: &'a CandidateAttributes,
    pub context: &'a MarketContext,
    pub district_entity: Option<&'a ReferenceEntity>,
    pub matched: &'a [MatchedAttribute],
    /// Warnings accumulated by earlier stages, counted into the penalty.
    pub prior_warnings: usize,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub warnings: Vec<ExtractionWarning>,
    pub clarifications: Vec<Clarification>,
    pub confidence: f32,
}

pub fn validate(input: ValidationInput<'_>, config: &EstaraConfig) -> ValidationReport {
    let mut warnings = Vec::new();

    check_baseline_agreement(
        input.attributes,
        input.baseline,
        config.numeric_tolerance,
        &mut warnings,
    );
    check_market_bands(input.attributes, input.context, config.range_slack_k, &mut warnings);
    check_price_per_m2(
        input.attributes,
        input.context,
        input.district_entity,
        config.range_slack_k,
        &mut warnings,
    );
    check_plausibility(input.attributes, &mut warnings);

    let confidence = fuse_confidence(
        input.attributes,
        input.matched,
        input.context,
        input.prior_warnings + warnings.len(),
        config,
    );

    let clarifications = if confidence < config.clarification_threshold {
        clarifications_for(input.attributes, input.context)
    } else {
        vec![]
    };

    if !warnings.is_empty() {
        tracing::warn!(
            warning_count = warnings.len(),
            confidence,
            "validation findings on extraction"
        );
    }

    ValidationReport {
        warnings,
        clarifications,
        confidence,
    }
}

fn numeric_fields(attributes: &CandidateAttributes) -> [(&'static str, Option<f64>); 5] {
    [
        ("price_vnd", attributes.price_vnd),
        ("area_m2", attributes.area_m2),
        ("bedrooms", attributes.bedrooms.map(f64::from)),
        ("bathrooms", attributes.bathrooms.map(f64::from)),
        ("floors", attributes.floors.map(f64::from)),
    ]
}

/// Relative disagreement between the merged value and the independent
/// rule-based signal.
fn check_baseline_agreement(
    attributes: &CandidateAttributes,
    baseline: &CandidateAttributes,
    tolerance: f64,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let merged = numeric_fields(attributes);
    let rule = numeric_fields(baseline);

    for ((name, a), (_, b)) in merged.into_iter().zip(rule) {
        let (Some(a), Some(b)) = (a, b) else { continue };
        let scale = a.abs().max(b.abs());
        if scale > 0.0 && (a - b).abs() / scale > tolerance {
            warnings.push(ExtractionWarning::new(
                WarningKind::BaselineDisagreement,
                format!("{name} {a:.0} disagrees with rule-based extraction ({b:.0})"),
            ));
        }
    }
}

/// Values outside the slack band around the market sample.
fn check_market_bands(
    attributes: &CandidateAttributes,
    context: &MarketContext,
    slack_k: f64,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let checks = [
        ("price_vnd", NumericMetric::PriceVnd, attributes.price_vnd),
        ("area_m2", NumericMetric::AreaM2, attributes.area_m2),
        ("bedrooms", NumericMetric::Bedrooms, attributes.bedrooms.map(f64::from)),
    ];

    for (name, metric, value) in checks {
        let (Some(value), Some(stats)) = (value, context.stats_for(metric)) else {
            continue;
        };
        let lo = stats.min / slack_k;
        let hi = stats.max * slack_k;
        if value < lo || value > hi {
            warnings.push(ExtractionWarning::new(
                WarningKind::OutOfRange,
                format!("{name} {value:.0} outside market band [{lo:.0}, {hi:.0}]"),
            ));
        }
    }
}

/// Derived price-per-m² against the matched district's stored range and
/// the market sample.
fn check_price_per_m2(
    attributes: &CandidateAttributes,
    context: &MarketContext,
    district_entity: Option<&ReferenceEntity>,
    slack_k: f64,
    warnings: &mut Vec<ExtractionWarning>,
) {
    let (Some(price), Some(area)) = (attributes.price_vnd, attributes.area_m2) else {
        return;
    };
    if area <= 0.0 {
        return;
    }
    let per_m2 = price / area;

    // The stored district range is already a tolerance band, applied as-is.
    let stored = district_entity.and_then(|entity| {
        entity
            .numeric_ranges
            .iter()
            .find(|r| r.metric == NumericMetric::PricePerM2Vnd)
    });
    if let Some(range) = stored {
        if per_m2 > range.max_value {
            warnings.push(ExtractionWarning::new(
                WarningKind::OutOfRange,
                format!(
                    "unusually high price: {per_m2:.0} VND/m2 against district range [{:.0}, {:.0}]",
                    range.min_value, range.max_value
                ),
            ));
        } else if per_m2 < range.min_value {
            warnings.push(ExtractionWarning::new(
                WarningKind::OutOfRange,
                format!(
                    "unusually low price: {per_m2:.0} VND/m2 against district range [{:.0}, {:.0}]",
                    range.min_value, range.max_value
                ),
            ));
        }
    }

    if let Some(stats) = context.stats_for(NumericMetric::PricePerM2Vnd) {
        let lo = stats.min / slack_k;
        let hi = stats.max * slack_k;
        if per_m2 < lo || per_m2 > hi {
            warnings.push(ExtractionWarning::new(
                WarningKind::OutOfRange,
                format!("price per m2 {per_m2:.0} outside market band [{lo:.0}, {hi:.0}]"),
            ));
        }
    }
}

fn check_plausibility(attributes: &CandidateAttributes, warnings: &mut Vec<ExtractionWarning>) {
    let values = numeric_fields(attributes);

    for range in PLAUSIBLE_RANGES {
        let value = values
            .iter()
            .find(|(name, _)| *name == range.field)
            .and_then(|(_, v)| *v);
        if let Some(value) = value {
            if value < range.min || value > range.max {
                warnings.push(ExtractionWarning::new(
                    WarningKind::Implausible,
                    format!(
                        "{} {value} outside plausible range {}..{}",
                        range.field, range.min, range.max
                    ),
                ));
            }
        }
    }

    if let (Some(bathrooms), Some(bedrooms)) = (attributes.bathrooms, attributes.bedrooms) {
        if bathrooms > bedrooms + BATHROOM_SURPLUS_LIMIT {
            warnings.push(ExtractionWarning::new(
                WarningKind::Implausible,
                format!("bathrooms ({bathrooms}) materially exceed bedrooms ({bedrooms})"),
            ));
        }
    }
}

/// Questions for missing high-value fields. Suggestions come from the
/// market sample only; without context the question carries none.
fn clarifications_for(
    attributes: &CandidateAttributes,
    context: &MarketContext,
) -> Vec<Clarification> {
    let mut clarifications = Vec::new();

    if attributes.district.is_none() {
        clarifications.push(Clarification {
            field: "district".into(),
            question: "Which district is the property in?".into(),
            suggestions: ranked_suggestions(context, AttributeCategory::District),
        });
    }
    if attributes.property_type.is_none() {
        clarifications.push(Clarification {
            field: "property_type".into(),
            question: "What type of property is this?".into(),
            suggestions: ranked_suggestions(context, AttributeCategory::PropertyType),
        });
    }
    if attributes.price_vnd.is_none() {
        clarifications.push(Clarification {
            field: "price_vnd".into(),
            question: "What is the asking price in VND?".into(),
            suggestions: stats_suggestion(context, NumericMetric::PriceVnd, "VND"),
        });
    }
    if attributes.area_m2.is_none() {
        clarifications.push(Clarification {
            field: "area_m2".into(),
            question: "What is the floor area in m2?".into(),
            suggestions: stats_suggestion(context, NumericMetric::AreaM2, "m2"),
        });
    }
    if attributes.listing_kind.is_none() {
        clarifications.push(Clarification {
            field: "listing_kind".into(),
            question: "Is the property offered for sale or for rent?".into(),
            suggestions: vec![],
        });
    }

    clarifications
}

fn ranked_suggestions(context: &MarketContext, category: AttributeCategory) -> Vec<String> {
    context
        .suggestions_for(category)
        .into_iter()
        .take(5)
        .map(str::to_string)
        .collect()
}

fn stats_suggestion(context: &MarketContext, metric: NumericMetric, unit: &str) -> Vec<String> {
    match context.stats_for(metric) {
        Some(stats) => vec![format!(
            "similar listings range {:.0} to {:.0} {unit}",
            stats.min, stats.max
        )],
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entity::NumericRange;
    use crate::models::enums::Language;
    use crate::pipeline::context::ComparableRecord;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn config() -> EstaraConfig {
        EstaraConfig::default()
    }

    fn validate_simple(
        attributes: &CandidateAttributes,
        baseline: &CandidateAttributes,
        context: &MarketContext,
        district_entity: Option<&ReferenceEntity>,
    ) -> ValidationReport {
        validate(
            ValidationInput {
                attributes,
                baseline,
                context,
                district_entity,
                matched: &[],
                prior_warnings: 0,
            },
            &config(),
        )
    }

    fn district_7_with_range(min: f64, max: f64) -> ReferenceEntity {
        ReferenceEntity {
            id: 7,
            category: AttributeCategory::District,
            canonical_code: "district_7".into(),
            canonical_name_en: "District 7".into(),
            display_names: BTreeMap::from([(Language::Vi, "Quận 7".to_string())]),
            aliases: vec!["q7".into()],
            active: true,
            numeric_ranges: vec![NumericRange {
                entity_id: 7,
                metric: NumericMetric::PricePerM2Vnd,
                min_value: min,
                avg_value: (min + max) / 2.0,
                max_value: max,
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn warning_kinds(report: &ValidationReport) -> Vec<WarningKind> {
        report.warnings.iter().map(|w| w.kind).collect()
    }

    #[test]
    fn agreeing_signals_produce_no_warnings() {
        let attributes = CandidateAttributes {
            price_vnd: Some(5.5e9),
            area_m2: Some(80.0),
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            price_vnd: Some(5.5e9),
            area_m2: Some(80.0),
            ..Default::default()
        };
        let report = validate_simple(&attributes, &baseline, &MarketContext::empty(), None);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn disagreement_beyond_tolerance_is_flagged() {
        let attributes = CandidateAttributes {
            price_vnd: Some(7.0e9),
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            price_vnd: Some(5.0e9),
            ..Default::default()
        };
        let report = validate_simple(&attributes, &baseline, &MarketContext::empty(), None);
        assert_eq!(warning_kinds(&report), vec![WarningKind::BaselineDisagreement]);
        assert!(report.warnings[0].message.contains("price_vnd"));
    }

    #[test]
    fn small_disagreement_stays_silent() {
        let attributes = CandidateAttributes {
            price_vnd: Some(5.5e9),
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            price_vnd: Some(5.0e9),
            ..Default::default()
        };
        let report = validate_simple(&attributes, &baseline, &MarketContext::empty(), None);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn overpriced_listing_against_district_range_warns_high() {
        // 50 billion VND over 80 m2 is 625M VND/m2 against a 40M..150M range.
        let attributes = CandidateAttributes {
            price_vnd: Some(50.0e9),
            area_m2: Some(80.0),
            district: Some("Quận 7".into()),
            ..Default::default()
        };
        let district = district_7_with_range(40.0e6, 150.0e6);
        let report =
            validate_simple(&attributes, &attributes, &MarketContext::empty(), Some(&district));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::OutOfRange);
        assert!(report.warnings[0].message.contains("unusually high price"));
    }

    #[test]
    fn underpriced_listing_against_district_range_warns_low() {
        let attributes = CandidateAttributes {
            price_vnd: Some(1.0e9),
            area_m2: Some(80.0),
            ..Default::default()
        };
        let district = district_7_with_range(40.0e6, 150.0e6);
        let report =
            validate_simple(&attributes, &attributes, &MarketContext::empty(), Some(&district));
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].message.contains("unusually low price"));
    }

    #[test]
    fn market_band_check_uses_slack() {
        let records = vec![
            ComparableRecord {
                price_vnd: Some(4.0e9),
                ..Default::default()
            },
            ComparableRecord {
                price_vnd: Some(6.0e9),
                ..Default::default()
            },
        ];
        let context = MarketContext::from_records(&records);

        // Within [4e9/1.5, 6e9*1.5]: no warning.
        let inside = CandidateAttributes {
            price_vnd: Some(8.0e9),
            ..Default::default()
        };
        let report = validate_simple(&inside, &inside, &context, None);
        assert!(warning_kinds(&report).is_empty());

        let outside = CandidateAttributes {
            price_vnd: Some(50.0e9),
            ..Default::default()
        };
        let report = validate_simple(&outside, &outside, &context, None);
        assert_eq!(warning_kinds(&report), vec![WarningKind::OutOfRange]);
    }

    #[test]
    fn implausible_values_are_flagged() {
        let attributes = CandidateAttributes {
            price_vnd: Some(5.0e5),
            area_m2: Some(2.0),
            floors: Some(200),
            ..Default::default()
        };
        let report = validate_simple(&attributes, &attributes, &MarketContext::empty(), None);
        let kinds = warning_kinds(&report);
        assert_eq!(kinds.len(), 3);
        assert!(kinds.iter().all(|k| *k == WarningKind::Implausible));
    }

    #[test]
    fn bathroom_surplus_is_flagged() {
        let attributes = CandidateAttributes {
            bedrooms: Some(2),
            bathrooms: Some(8),
            ..Default::default()
        };
        let report = validate_simple(&attributes, &attributes, &MarketContext::empty(), None);
        assert_eq!(warning_kinds(&report), vec![WarningKind::Implausible]);
        assert!(report.warnings[0].message.contains("bathrooms"));
    }

    #[test]
    fn low_confidence_produces_clarifications_with_context_suggestions() {
        let records = vec![
            ComparableRecord {
                district: Some("district_7".into()),
                ..Default::default()
            },
            ComparableRecord {
                district: Some("district_7".into()),
                ..Default::default()
            },
            ComparableRecord {
                district: Some("district_2".into()),
                ..Default::default()
            },
        ];
        let context = MarketContext::from_records(&records);
        let attributes = CandidateAttributes::default();
        let report = validate_simple(&attributes, &attributes, &context, None);

        assert!(report.confidence < config().clarification_threshold);
        let district = report
            .clarifications
            .iter()
            .find(|c| c.field == "district")
            .unwrap();
        assert_eq!(district.suggestions, vec!["district_7", "district_2"]);

        let kind = report
            .clarifications
            .iter()
            .find(|c| c.field == "listing_kind")
            .unwrap();
        assert!(kind.suggestions.is_empty());
    }

    #[test]
    fn no_context_means_no_fabricated_suggestions() {
        let attributes = CandidateAttributes::default();
        let report = validate_simple(&attributes, &attributes, &MarketContext::empty(), None);
        assert!(!report.clarifications.is_empty());
        for clarification in &report.clarifications {
            if clarification.field != "listing_kind" {
                assert!(clarification.suggestions.is_empty(), "{}", clarification.field);
            }
        }
    }

    #[test]
    fn high_confidence_suppresses_clarifications() {
        let attributes = CandidateAttributes {
            listing_kind: Some("sale".into()),
            district: Some("Quận 7".into()),
            property_type: Some("căn hộ".into()),
            price_vnd: Some(5.5e9),
            area_m2: Some(80.0),
            ..Default::default()
        };
        let matched = [MatchedAttribute {
            attribute_name: "district".into(),
            reference_entity_id: 7,
            canonical_value: "district_7".into(),
            display_value: "Quận 7".into(),
            confidence: 1.0,
            match_method: crate::models::enums::MatchMethod::Exact,
        }];
        let report = validate(
            ValidationInput {
                attributes: &attributes,
                baseline: &attributes,
                context: &MarketContext::empty(),
                district_entity: None,
                matched: &matched,
                prior_warnings: 0,
            },
            &config(),
        );
        assert!(report.confidence >= config().clarification_threshold);
        assert!(report.clarifications.is_empty());
    }
}
