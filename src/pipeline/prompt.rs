//! Prompt construction for the generative extractor and the translator.

use crate::models::enums::{AttributeCategory, Language, NumericMetric};
use crate::pipeline::context::MarketContext;
use crate::pipeline::types::CandidateAttributes;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a real-estate listing extraction assistant. Your ONLY role is to read
one property listing and extract the attributes that are explicitly present
in its text.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Extract ONLY information explicitly stated in the listing.
2. NEVER guess or invent values that are not directly written.
3. If an attribute is unclear or missing, output null for that field.
4. Copy categorical values (district, property type, direction, legal status,
   furnishing, amenities) verbatim from the listing, in its original language.
   Do NOT translate them and do NOT normalize their spelling.
5. Convert prices to absolute VND (e.g. "5,5 tỷ" is 5500000000) and areas to
   square meters. Output plain numbers without separators or units.
6. Output MUST be a single valid JSON object and nothing else.
"#;

pub const TRANSLATION_SYSTEM_PROMPT: &str = r#"
You are a real-estate terminology normalizer for Vietnamese and English
listings. Given one attribute value, you produce a canonical snake_case
English identifier and display names in both languages.

RULES:
1. The canonical identifier is lowercase English with underscores, no accents.
2. Translate the MEANING of the term, not its letters.
3. If the value is not a real-estate attribute at all, still produce your
   best canonical form of it.
4. Output MUST be a single valid JSON object and nothing else.
"#;

/// Build the extraction prompt: baseline hints and market context first,
/// then the listing, then the output schema.
pub fn build_extraction_prompt(
    text: &str,
    language: Language,
    baseline: &CandidateAttributes,
    context: &MarketContext,
) -> String {
    let hints = baseline_hints(baseline);
    let market = market_section(context);

    format!(
        r#"The listing below is written in {language}.
{hints}{market}
<listing>
{text}
</listing>

Extract the attributes of the above listing into the following JSON structure.
For any attribute not present in the listing, use null.

```json
{{
  "listing_kind": "sale | rent | null",
  "city": "city name as written, or null",
  "district": "district name as written, or null",
  "property_type": "property type as written, or null",
  "direction": "facing direction as written, or null",
  "legal_status": "legal paperwork status as written, or null",
  "furnishing": "furnishing level as written, or null",
  "amenities": ["amenity as written"],
  "price_vnd": 0,
  "area_m2": 0.0,
  "bedrooms": 0,
  "bathrooms": 0,
  "floors": 0
}}
```
"#,
        language = language_name(language),
    )
}

/// Build the translation prompt for one unmatched attribute value.
pub fn build_translation_prompt(
    value: &str,
    category: AttributeCategory,
    language: Language,
) -> String {
    format!(
        r#"The value below is a {category} term from a {language} real-estate
listing. It did not match any known canonical entity.

Value: "{value}"

Produce its canonical form using the following JSON structure:

```json
{{
  "canonical": "snake_case_english_identifier",
  "category": "city | district | property_type | direction | legal_status | furnishing | amenity",
  "translations": {{
    "vi": "Vietnamese display name",
    "en": "English display name"
  }}
}}
```
"#,
        category = category.as_str(),
        language = language_name(language),
    )
}

fn language_name(language: Language) -> &'static str {
    match language {
        Language::Vi => "Vietnamese",
        Language::En => "English",
    }
}

/// Hint lines from the deterministic pre-pass, one per found field.
fn baseline_hints(attributes: &CandidateAttributes) -> String {
    if attributes.is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    for (category, value) in attributes.single_valued() {
        lines.push(format!("- {}: \"{}\"", category.as_str(), value));
    }
    if !attributes.amenities.is_empty() {
        lines.push(format!("- amenities: {}", attributes.amenities.join(", ")));
    }
    if let Some(kind) = &attributes.listing_kind {
        lines.push(format!("- listing_kind: {kind}"));
    }
    if let Some(price) = attributes.price_vnd {
        lines.push(format!("- price_vnd: {price:.0}"));
    }
    if let Some(area) = attributes.area_m2 {
        lines.push(format!("- area_m2: {area}"));
    }
    if let Some(bedrooms) = attributes.bedrooms {
        lines.push(format!("- bedrooms: {bedrooms}"));
    }

    format!(
        "\nA deterministic pre-pass found these hints. Verify each one against \
         the listing and correct it if the text says otherwise:\n{}\n",
        lines.join("\n")
    )
}

/// Summary of the similar-listing sample, omitted when the context is empty.
fn market_section(context: &MarketContext) -> String {
    if context.is_empty() {
        return String::new();
    }

    let mut lines = Vec::new();
    let districts = context.suggestions_for(AttributeCategory::District);
    if !districts.is_empty() {
        lines.push(format!(
            "- common districts: {}",
            districts.iter().take(5).copied().collect::<Vec<_>>().join(", ")
        ));
    }
    let types = context.suggestions_for(AttributeCategory::PropertyType);
    if !types.is_empty() {
        lines.push(format!(
            "- common property types: {}",
            types.iter().take(5).copied().collect::<Vec<_>>().join(", ")
        ));
    }
    if let Some(price) = context.stats_for(NumericMetric::PriceVnd) {
        lines.push(format!(
            "- price range: {:.0} to {:.0} VND (avg {:.0})",
            price.min, price.max, price.avg
        ));
    }
    if let Some(area) = context.stats_for(NumericMetric::AreaM2) {
        lines.push(format!(
            "- area range: {:.0} to {:.0} m2 (avg {:.0})",
            area.min, area.max, area.avg
        ));
    }

    if lines.is_empty() {
        return String::new();
    }

    format!(
        "\nMarket context from {} similar listings (for disambiguation only, \
         never a source of values):\n{}\n",
        context.sample_count,
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::ComparableRecord;

    #[test]
    fn prompt_contains_listing_text() {
        let prompt = build_extraction_prompt(
            "Bán căn hộ Quận 7",
            Language::Vi,
            &CandidateAttributes::default(),
            &MarketContext::empty(),
        );
        assert!(prompt.contains("<listing>"));
        assert!(prompt.contains("Bán căn hộ Quận 7"));
        assert!(prompt.contains("</listing>"));
        assert!(prompt.contains("written in Vietnamese"));
        assert!(prompt.contains("\"listing_kind\""));
    }

    #[test]
    fn baseline_hints_are_embedded() {
        let baseline = CandidateAttributes {
            district: Some("district 7".into()),
            price_vnd: Some(5.5e9),
            ..Default::default()
        };
        let prompt = build_extraction_prompt(
            "text",
            Language::Vi,
            &baseline,
            &MarketContext::empty(),
        );
        assert!(prompt.contains("deterministic pre-pass"));
        assert!(prompt.contains("- district: \"district 7\""));
        assert!(prompt.contains("- price_vnd: 5500000000"));
    }

    #[test]
    fn empty_baseline_adds_no_hint_section() {
        let prompt = build_extraction_prompt(
            "text",
            Language::En,
            &CandidateAttributes::default(),
            &MarketContext::empty(),
        );
        assert!(!prompt.contains("deterministic pre-pass"));
        assert!(!prompt.contains("Market context"));
    }

    #[test]
    fn market_context_is_summarized() {
        let records = vec![
            ComparableRecord {
                district: Some("district_7".into()),
                price_vnd: Some(4.0e9),
                area_m2: Some(80.0),
                ..Default::default()
            },
            ComparableRecord {
                district: Some("district_7".into()),
                price_vnd: Some(6.0e9),
                area_m2: Some(100.0),
                ..Default::default()
            },
        ];
        let context = MarketContext::from_records(&records);
        let prompt =
            build_extraction_prompt("text", Language::En, &CandidateAttributes::default(), &context);
        assert!(prompt.contains("Market context from 2 similar listings"));
        assert!(prompt.contains("- common districts: district_7"));
        assert!(prompt.contains("- price range: 4000000000 to 6000000000 VND (avg 5000000000)"));
    }

    #[test]
    fn system_prompt_enforces_extraction_only() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("ONLY"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("NEVER guess"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("valid JSON"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("verbatim"));
    }

    #[test]
    fn translation_prompt_names_value_and_category() {
        let prompt =
            build_translation_prompt("Thảo Điền", AttributeCategory::District, Language::Vi);
        assert!(prompt.contains("\"Thảo Điền\""));
        assert!(prompt.contains("a district term"));
        assert!(prompt.contains("\"canonical\""));
        assert!(prompt.contains("\"translations\""));
        assert!(TRANSLATION_SYSTEM_PROMPT.contains("snake_case"));
    }
}
