//! Canonicalization of unmatched attribute values.
//!
//! The translator asks the generative capability for a snake-case canonical
//! identifier plus display names, and on any failure falls back to a
//! deterministic local slug. `from_fallback` marks the low-confidence path
//! for reviewers; the pipeline itself is never blocked by an outage.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::matching::fold;
use crate::models::enums::{AttributeCategory, Language, WarningKind};
use crate::pipeline::llm::{generate_with_retry, LlmClient};
use crate::pipeline::parser::{parse_translation_response, RawTranslation};
use crate::pipeline::prompt::{build_translation_prompt, TRANSLATION_SYSTEM_PROMPT};
use crate::pipeline::types::ExtractionWarning;

/// Canonical form proposed for one unmatched value.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationSuggestion {
    pub canonical_candidate: String,
    pub suggested_category: AttributeCategory,
    pub translations: BTreeMap<Language, String>,
    /// True when the suggestion came from local normalization instead of
    /// the generative capability.
    pub from_fallback: bool,
}

/// Deterministic slug: fold diacritics and punctuation, underscores for
/// whitespace. "Thảo Điền" becomes "thao_dien".
pub fn slugify(value: &str) -> String {
    fold(value).replace(' ', "_")
}

pub struct Translator<'a> {
    llm: &'a dyn LlmClient,
    temperature: f32,
    max_retries: u32,
}

impl<'a> Translator<'a> {
    pub fn new(llm: &'a dyn LlmClient, temperature: f32, max_retries: u32) -> Self {
        Self {
            llm,
            temperature,
            max_retries,
        }
    }

    pub fn translate(
        &self,
        value: &str,
        category: AttributeCategory,
        language: Language,
    ) -> (TranslationSuggestion, Vec<ExtractionWarning>) {
        let prompt = build_translation_prompt(value, category, language);

        let raw = match generate_with_retry(
            self.llm,
            &prompt,
            TRANSLATION_SYSTEM_PROMPT,
            self.temperature,
            self.max_retries,
        ) {
            Ok(response) => match parse_translation_response(&response) {
                Ok(raw) => raw,
                Err(e) => return fallback(value, category, language, &e.to_string()),
            },
            Err(e) => return fallback(value, category, language, &e.to_string()),
        };

        match suggestion_from_raw(raw, category) {
            Some(suggestion) => (suggestion, vec![]),
            None => fallback(value, category, language, "no usable canonical in response"),
        }
    }
}

fn suggestion_from_raw(
    raw: RawTranslation,
    attempted: AttributeCategory,
) -> Option<TranslationSuggestion> {
    let canonical = raw
        .canonical
        .map(|c| slugify(&c))
        .filter(|c| !c.is_empty())?;

    let suggested_category = raw
        .category
        .and_then(|c| AttributeCategory::from_str(c.trim()).ok())
        .unwrap_or(attempted);

    let translations = raw
        .translations
        .iter()
        .filter_map(|(lang, name)| {
            let lang = Language::from_str(lang.trim()).ok()?;
            let name = name.trim();
            if name.is_empty() {
                None
            } else {
                Some((lang, name.to_string()))
            }
        })
        .collect();

    Some(TranslationSuggestion {
        canonical_candidate: canonical,
        suggested_category,
        translations,
        from_fallback: false,
    })
}

fn fallback(
    value: &str,
    category: AttributeCategory,
    language: Language,
    cause: &str,
) -> (TranslationSuggestion, Vec<ExtractionWarning>) {
    tracing::warn!(value, error = cause, "translator degraded to local normalization");

    let suggestion = TranslationSuggestion {
        canonical_candidate: slugify(value),
        suggested_category: category,
        translations: BTreeMap::from([(language, value.trim().to_string())]),
        from_fallback: true,
    };
    let warning = ExtractionWarning::new(
        WarningKind::TranslationFallback,
        format!("deterministic canonicalization for \"{value}\": {cause}"),
    );
    (suggestion, vec![warning])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{FailingLlmClient, MockLlmClient};

    #[test]
    fn slugify_folds_and_underscores() {
        assert_eq!(slugify("Thảo Điền"), "thao_dien");
        assert_eq!(slugify("hầm rượu!"), "ham_ruou");
        assert_eq!(slugify("  Đà   Nẵng  "), "da_nang");
        assert_eq!(slugify("thao_dien"), "thao_dien");
    }

    #[test]
    fn model_response_becomes_suggestion() {
        let client = MockLlmClient::new(
            r#"{"canonical": "thao_dien", "category": "district",
                "translations": {"vi": "Thảo Điền", "en": "Thao Dien Ward"}}"#,
        );
        let translator = Translator::new(&client, 0.1, 0);
        let (suggestion, warnings) =
            translator.translate("Thảo Điền", AttributeCategory::District, Language::Vi);

        assert!(warnings.is_empty());
        assert!(!suggestion.from_fallback);
        assert_eq!(suggestion.canonical_candidate, "thao_dien");
        assert_eq!(suggestion.suggested_category, AttributeCategory::District);
        assert_eq!(
            suggestion.translations.get(&Language::En).map(String::as_str),
            Some("Thao Dien Ward")
        );
    }

    #[test]
    fn messy_model_canonical_is_sanitized() {
        let client = MockLlmClient::new(r#"{"canonical": "Thao Dien Ward", "category": "ward"}"#);
        let translator = Translator::new(&client, 0.1, 0);
        let (suggestion, warnings) =
            translator.translate("Thảo Điền", AttributeCategory::District, Language::Vi);

        assert!(warnings.is_empty());
        assert_eq!(suggestion.canonical_candidate, "thao_dien_ward");
        // Unknown category string falls back to the attempted category.
        assert_eq!(suggestion.suggested_category, AttributeCategory::District);
    }

    #[test]
    fn llm_outage_uses_deterministic_fallback() {
        let translator = Translator::new(&FailingLlmClient, 0.1, 0);
        let (suggestion, warnings) =
            translator.translate("Thảo Điền", AttributeCategory::District, Language::Vi);

        assert!(suggestion.from_fallback);
        assert_eq!(suggestion.canonical_candidate, "thao_dien");
        assert_eq!(suggestion.suggested_category, AttributeCategory::District);
        assert_eq!(
            suggestion.translations.get(&Language::Vi).map(String::as_str),
            Some("Thảo Điền")
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::TranslationFallback);
    }

    #[test]
    fn unparseable_response_uses_fallback() {
        let client = MockLlmClient::new("I think this is a ward in Thủ Đức.");
        let translator = Translator::new(&client, 0.1, 0);
        let (suggestion, warnings) =
            translator.translate("hầm rượu", AttributeCategory::Amenity, Language::Vi);

        assert!(suggestion.from_fallback);
        assert_eq!(suggestion.canonical_candidate, "ham_ruou");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn empty_canonical_in_response_uses_fallback() {
        let client = MockLlmClient::new(r#"{"canonical": "???"}"#);
        let translator = Translator::new(&client, 0.1, 0);
        let (suggestion, warnings) =
            translator.translate("Thảo Điền", AttributeCategory::District, Language::Vi);

        assert!(suggestion.from_fallback);
        assert_eq!(suggestion.canonical_candidate, "thao_dien");
        assert_eq!(warnings.len(), 1);
    }
}
