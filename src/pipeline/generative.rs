//! Generative extraction stage.
//!
//! Wraps the LLM call in the shared retry policy and the lenient parser.
//! This stage never fails the request: retry exhaustion or an unusable
//! response degrades to empty candidates plus a warning, and the
//! deterministic baseline carries the extraction from there.

use crate::models::enums::{Language, WarningKind};
use crate::pipeline::context::MarketContext;
use crate::pipeline::llm::{generate_with_retry, LlmClient};
use crate::pipeline::parser::parse_candidate_response;
use crate::pipeline::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::pipeline::types::{CandidateAttributes, ExtractionWarning};

pub struct GenerativeExtractor<'a> {
    llm: &'a dyn LlmClient,
    temperature: f32,
    max_retries: u32,
}

impl<'a> GenerativeExtractor<'a> {
    pub fn new(llm: &'a dyn LlmClient, temperature: f32, max_retries: u32) -> Self {
        Self {
            llm,
            temperature,
            max_retries,
        }
    }

    pub fn extract(
        &self,
        text: &str,
        language: Language,
        baseline: &CandidateAttributes,
        context: &MarketContext,
    ) -> (CandidateAttributes, Vec<ExtractionWarning>) {
        let prompt = build_extraction_prompt(text, language, baseline, context);

        let response = match generate_with_retry(
            self.llm,
            &prompt,
            EXTRACTION_SYSTEM_PROMPT,
            self.temperature,
            self.max_retries,
        ) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "generative extraction unavailable, falling back to baseline");
                let warning = ExtractionWarning::new(
                    WarningKind::UpstreamDegraded,
                    format!("generative extraction unavailable: {e}"),
                );
                return (CandidateAttributes::default(), vec![warning]);
            }
        };

        match parse_candidate_response(&response) {
            Ok(attributes) => {
                tracing::debug!("generative extraction parsed");
                (attributes, vec![])
            }
            Err(e) => {
                tracing::warn!(error = %e, "generative response unusable, falling back to baseline");
                let warning = ExtractionWarning::new(
                    WarningKind::ParseFailure,
                    format!("generative response unusable: {e}"),
                );
                (CandidateAttributes::default(), vec![warning])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{FailingLlmClient, MockLlmClient};

    fn extract_with(client: &dyn LlmClient) -> (CandidateAttributes, Vec<ExtractionWarning>) {
        let extractor = GenerativeExtractor::new(client, 0.1, 0);
        extractor.extract(
            "Bán căn hộ Quận 7",
            Language::Vi,
            &CandidateAttributes::default(),
            &MarketContext::empty(),
        )
    }

    #[test]
    fn well_formed_response_yields_attributes() {
        let client = MockLlmClient::new(
            r#"{"district": "Quận 7", "property_type": "căn hộ", "price_vnd": 5500000000}"#,
        );
        let (attrs, warnings) = extract_with(&client);
        assert_eq!(attrs.district.as_deref(), Some("Quận 7"));
        assert_eq!(attrs.price_vnd, Some(5.5e9));
        assert!(warnings.is_empty());
    }

    #[test]
    fn llm_failure_degrades_to_empty_with_warning() {
        let (attrs, warnings) = extract_with(&FailingLlmClient);
        assert!(attrs.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UpstreamDegraded);
    }

    #[test]
    fn unparseable_response_degrades_with_parse_warning() {
        let client = MockLlmClient::new("Sorry, I cannot help with that.");
        let (attrs, warnings) = extract_with(&client);
        assert!(attrs.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::ParseFailure);
    }
}
