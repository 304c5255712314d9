//! Parsing of LLM responses into candidate attributes.
//!
//! Lenient by construction: the JSON block may arrive fenced, prose-wrapped
//! or bare, numeric fields may arrive as strings with units, and a field
//! that cannot be coerced is dropped rather than failing the response.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::pipeline::baseline::{parse_area_text, parse_count_text, parse_price_text};
use crate::pipeline::llm::LlmError;
use crate::pipeline::types::CandidateAttributes;

/// Parse the extraction response into candidate attributes.
pub fn parse_candidate_response(response: &str) -> Result<CandidateAttributes, LlmError> {
    let json_str = extract_json_block(response)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object found".into()))?;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct RawCandidate {
        listing_kind: Value,
        city: Value,
        district: Value,
        property_type: Value,
        direction: Value,
        legal_status: Value,
        furnishing: Value,
        amenities: Value,
        price_vnd: Value,
        area_m2: Value,
        bedrooms: Value,
        bathrooms: Value,
        floors: Value,
    }

    let raw: RawCandidate = serde_json::from_str(json_str)
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

    Ok(CandidateAttributes {
        listing_kind: value_str(&raw.listing_kind).map(|s| s.to_lowercase()),
        city: value_str(&raw.city),
        district: value_str(&raw.district),
        property_type: value_str(&raw.property_type),
        direction: value_str(&raw.direction),
        legal_status: value_str(&raw.legal_status),
        furnishing: value_str(&raw.furnishing),
        amenities: value_str_list(&raw.amenities),
        price_vnd: value_number(&raw.price_vnd, parse_price_text),
        area_m2: value_number(&raw.area_m2, parse_area_text),
        bedrooms: value_count(&raw.bedrooms),
        bathrooms: value_count(&raw.bathrooms),
        floors: value_count(&raw.floors),
    })
}

/// Wire shape of the translator response.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTranslation {
    pub canonical: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

/// Parse the translation response.
pub fn parse_translation_response(response: &str) -> Result<RawTranslation, LlmError> {
    let json_str = extract_json_block(response)
        .ok_or_else(|| LlmError::MalformedResponse("no JSON object found".into()))?;

    serde_json::from_str(json_str).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

/// Locate the JSON payload: a ```json fence, then any ``` fence, then the
/// outermost brace pair.
fn extract_json_block(response: &str) -> Option<&str> {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return Some(response[content_start..content_start + end].trim());
        }
    }

    if let Some(start) = response.find("```") {
        let content_start = start + 3;
        if let Some(end) = response[content_start..].find("```") {
            return Some(response[content_start..content_start + end].trim());
        }
    }

    let first = response.find('{')?;
    let last = response.rfind('}')?;
    if last > first {
        Some(response[first..=last].trim())
    } else {
        None
    }
}

/// Textual null sentinels models emit instead of JSON null.
const NULL_SENTINELS: &[&str] = &["null", "none", "n/a", "unknown", "-"];

fn value_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || NULL_SENTINELS.contains(&trimmed.to_lowercase().as_str()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_str_list(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items.iter().filter_map(value_str).collect(),
        Value::String(_) => value_str(v).into_iter().collect(),
        _ => vec![],
    }
}

fn value_number(v: &Value, from_text: fn(&str) -> Option<f64>) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite() && *f > 0.0),
        Value::String(s) => from_text(s),
        _ => None,
    }
}

fn value_count(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|c| u32::try_from(c).ok())
            .filter(|c| *c > 0),
        Value::String(s) => parse_count_text(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "listing_kind": "sale",
            "city": null,
            "district": "Quận 7",
            "property_type": "căn hộ",
            "amenities": ["hồ bơi", "thang máy"],
            "price_vnd": 5500000000,
            "area_m2": 80.0,
            "bedrooms": 2
        }"#
    }

    #[test]
    fn parses_fenced_response() {
        let response = format!("Here is the extraction:\n```json\n{}\n```\n", sample_json());
        let attrs = parse_candidate_response(&response).unwrap();
        assert_eq!(attrs.listing_kind.as_deref(), Some("sale"));
        assert_eq!(attrs.district.as_deref(), Some("Quận 7"));
        assert_eq!(attrs.city, None);
        assert_eq!(attrs.amenities, vec!["hồ bơi", "thang máy"]);
        assert_eq!(attrs.price_vnd, Some(5.5e9));
        assert_eq!(attrs.bedrooms, Some(2));
    }

    #[test]
    fn parses_bare_json_response() {
        let attrs = parse_candidate_response(sample_json()).unwrap();
        assert_eq!(attrs.district.as_deref(), Some("Quận 7"));
    }

    #[test]
    fn parses_plain_fence_without_language_tag() {
        let response = format!("```\n{}\n```", sample_json());
        let attrs = parse_candidate_response(&response).unwrap();
        assert_eq!(attrs.property_type.as_deref(), Some("căn hộ"));
    }

    #[test]
    fn unclosed_fence_falls_back_to_brace_extraction() {
        let response = format!("```json\n{}", sample_json());
        let attrs = parse_candidate_response(&response).unwrap();
        assert_eq!(attrs.district.as_deref(), Some("Quận 7"));
    }

    #[test]
    fn numeric_fields_coerce_from_strings_with_units() {
        let response = r#"{
            "district": "district 2",
            "price_vnd": "5,5 tỷ",
            "area_m2": "80m2",
            "bedrooms": "2PN",
            "floors": "three"
        }"#;
        let attrs = parse_candidate_response(response).unwrap();
        assert_eq!(attrs.price_vnd, Some(5.5e9));
        assert_eq!(attrs.area_m2, Some(80.0));
        assert_eq!(attrs.bedrooms, Some(2));
        assert_eq!(attrs.floors, None);
    }

    #[test]
    fn textual_null_sentinels_become_none() {
        let response = r#"{
            "district": "null",
            "city": "N/A",
            "direction": "  ",
            "furnishing": "unknown"
        }"#;
        let attrs = parse_candidate_response(response).unwrap();
        assert!(attrs.is_empty());
    }

    #[test]
    fn scalar_amenity_becomes_single_element_list() {
        let response = r#"{"amenities": "hồ bơi"}"#;
        let attrs = parse_candidate_response(response).unwrap();
        assert_eq!(attrs.amenities, vec!["hồ bơi"]);
    }

    #[test]
    fn negative_and_zero_numbers_are_dropped() {
        let response = r#"{"price_vnd": -5, "area_m2": 0, "bedrooms": 0}"#;
        let attrs = parse_candidate_response(response).unwrap();
        assert_eq!(attrs.price_vnd, None);
        assert_eq!(attrs.area_m2, None);
        assert_eq!(attrs.bedrooms, None);
    }

    #[test]
    fn prose_without_json_is_an_error() {
        let err = parse_candidate_response("I could not process this listing.").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse_candidate_response("{ district: Quận 7 }").unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[test]
    fn parses_translation_response() {
        let response = r#"```json
        {
            "canonical": "thao_dien",
            "category": "district",
            "translations": {"vi": "Thảo Điền", "en": "Thao Dien Ward"}
        }
        ```"#;
        let t = parse_translation_response(response).unwrap();
        assert_eq!(t.canonical.as_deref(), Some("thao_dien"));
        assert_eq!(t.category.as_deref(), Some("district"));
        assert_eq!(t.translations.get("vi").map(String::as_str), Some("Thảo Điền"));
    }

    #[test]
    fn translation_tolerates_missing_fields() {
        let t = parse_translation_response(r#"{"canonical": "thao_dien"}"#).unwrap();
        assert_eq!(t.canonical.as_deref(), Some("thao_dien"));
        assert!(t.category.is_none());
        assert!(t.translations.is_empty());
    }
}
