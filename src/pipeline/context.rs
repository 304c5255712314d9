//! Market context from the external similarity index.
//!
//! The retriever asks the search collaborator for the K most similar
//! already-canonicalized records and condenses them into frequency-ranked
//! categorical distributions and min/avg/max numeric statistics. The
//! collaborator is best-effort: any failure degrades to an explicit empty
//! context and the request proceeds without it.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{AttributeCategory, NumericMetric, WarningKind};
use crate::pipeline::baseline::BaselineRuleExtractor;
use crate::pipeline::types::ExtractionWarning;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search service unreachable at {0}")]
    Connection(String),

    #[error("search request timed out: {0}")]
    Timeout(String),

    #[error("search service returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed search response: {0}")]
    MalformedResponse(String),
}

/// One canonicalized record from the similarity index. Lenient shape: the
/// index may omit any field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparableRecord {
    pub city: Option<String>,
    pub district: Option<String>,
    pub property_type: Option<String>,
    pub direction: Option<String>,
    pub legal_status: Option<String>,
    pub furnishing: Option<String>,
    pub amenities: Vec<String>,
    pub price_vnd: Option<f64>,
    pub area_m2: Option<f64>,
    pub bedrooms: Option<u32>,
}

/// Categorical filters narrowing the similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
}

pub trait SearchClient: Send + Sync {
    fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<ComparableRecord>, SearchError>;
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════════════════

/// HTTP client for the similarity-search service.
pub struct HttpSearchClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpSearchClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    filters: &'a SearchFilters,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    records: Vec<ComparableRecord>,
}

impl SearchClient for HttpSearchClient {
    fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<ComparableRecord>, SearchError> {
        let url = format!("{}/search", self.base_url);
        let body = SearchRequest { query, filters, k };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                SearchError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                SearchError::Timeout(format!("after {}s", self.timeout_secs))
            } else {
                SearchError::MalformedResponse(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .map_err(|e| SearchError::MalformedResponse(e.to_string()))?;

        Ok(parsed.records)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Market context
// ═══════════════════════════════════════════════════════════════════════

/// Min/avg/max over the sampled records for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub count: usize,
}

/// Condensed view of the similar records. `empty()` is the degraded-mode
/// sentinel: no suggestions, no stats, `is_empty()` true.
#[derive(Debug, Clone, Default)]
pub struct MarketContext {
    pub sample_count: usize,
    categorical: HashMap<AttributeCategory, Vec<(String, usize)>>,
    numeric: HashMap<NumericMetric, NumericStats>,
}

impl MarketContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn from_records(records: &[ComparableRecord]) -> Self {
        if records.is_empty() {
            return Self::empty();
        }

        let mut counts: HashMap<AttributeCategory, HashMap<String, usize>> = HashMap::new();
        let mut count = |category: AttributeCategory, value: Option<&str>| {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                *counts
                    .entry(category)
                    .or_default()
                    .entry(v.to_string())
                    .or_insert(0) += 1;
            }
        };
        for r in records {
            count(AttributeCategory::City, r.city.as_deref());
            count(AttributeCategory::District, r.district.as_deref());
            count(AttributeCategory::PropertyType, r.property_type.as_deref());
            count(AttributeCategory::Direction, r.direction.as_deref());
            count(AttributeCategory::LegalStatus, r.legal_status.as_deref());
            count(AttributeCategory::Furnishing, r.furnishing.as_deref());
            for amenity in &r.amenities {
                count(AttributeCategory::Amenity, Some(amenity.as_str()));
            }
        }

        let categorical = counts
            .into_iter()
            .map(|(category, by_value)| {
                let mut ranked: Vec<(String, usize)> = by_value.into_iter().collect();
                // Highest frequency first, name as the deterministic tiebreak.
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                (category, ranked)
            })
            .collect();

        let mut numeric = HashMap::new();
        let mut stats = |metric: NumericMetric, values: Vec<f64>| {
            if let Some(s) = NumericStats::over(&values) {
                numeric.insert(metric, s);
            }
        };
        stats(
            NumericMetric::PriceVnd,
            records.iter().filter_map(|r| r.price_vnd).collect(),
        );
        stats(
            NumericMetric::AreaM2,
            records.iter().filter_map(|r| r.area_m2).collect(),
        );
        stats(
            NumericMetric::Bedrooms,
            records.iter().filter_map(|r| r.bedrooms.map(f64::from)).collect(),
        );
        stats(
            NumericMetric::PricePerM2Vnd,
            records
                .iter()
                .filter_map(|r| match (r.price_vnd, r.area_m2) {
                    (Some(p), Some(a)) if a > 0.0 => Some(p / a),
                    _ => None,
                })
                .collect(),
        );

        Self {
            sample_count: records.len(),
            categorical,
            numeric,
        }
    }

    /// Observed values for a category, highest frequency first.
    pub fn suggestions_for(&self, category: AttributeCategory) -> Vec<&str> {
        self.categorical
            .get(&category)
            .map(|ranked| ranked.iter().map(|(v, _)| v.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn stats_for(&self, metric: NumericMetric) -> Option<NumericStats> {
        self.numeric.get(&metric).copied()
    }
}

impl NumericStats {
    fn over(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        Some(Self {
            min,
            avg: sum / values.len() as f64,
            max,
            count: values.len(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Retriever
// ═══════════════════════════════════════════════════════════════════════

/// Fetches similar records and condenses them. The rule pass is pure and
/// cheap, so the retriever re-runs it internally for filters instead of
/// waiting on the parallel baseline stage.
pub struct ContextRetriever<'a> {
    search: &'a dyn SearchClient,
    k: usize,
}

impl<'a> ContextRetriever<'a> {
    pub fn new(search: &'a dyn SearchClient, k: usize) -> Self {
        Self { search, k }
    }

    pub fn retrieve(&self, text: &str) -> (MarketContext, Option<ExtractionWarning>) {
        let hints = BaselineRuleExtractor::new().extract(text).attributes;
        let filters = SearchFilters {
            district: hints.district,
            property_type: hints.property_type,
        };

        match self.search.search(text, &filters, self.k) {
            Ok(records) => {
                tracing::debug!(records = records.len(), "market context retrieved");
                (MarketContext::from_records(&records), None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "similarity search failed, continuing without market context");
                let warning = ExtractionWarning::new(
                    WarningKind::UpstreamDegraded,
                    format!("market context unavailable: {e}"),
                );
                (MarketContext::empty(), Some(warning))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Test client
// ═══════════════════════════════════════════════════════════════════════

/// Mock search client for tests: fixed records or a fixed failure, and it
/// remembers the last filters it was called with.
pub struct MockSearchClient {
    records: Vec<ComparableRecord>,
    fail: bool,
    last_filters: Mutex<Option<SearchFilters>>,
}

impl MockSearchClient {
    pub fn new(records: Vec<ComparableRecord>) -> Self {
        Self {
            records,
            fail: false,
            last_filters: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            records: vec![],
            fail: true,
            last_filters: Mutex::new(None),
        }
    }

    pub fn last_filters(&self) -> Option<SearchFilters> {
        self.last_filters.lock().ok().and_then(|g| g.clone())
    }
}

impl SearchClient for MockSearchClient {
    fn search(
        &self,
        _query: &str,
        filters: &SearchFilters,
        _k: usize,
    ) -> Result<Vec<ComparableRecord>, SearchError> {
        if let Ok(mut guard) = self.last_filters.lock() {
            *guard = Some(filters.clone());
        }
        if self.fail {
            return Err(SearchError::Connection("http://mock".into()));
        }
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(district: &str, price: f64, area: f64) -> ComparableRecord {
        ComparableRecord {
            district: Some(district.into()),
            property_type: Some("apartment".into()),
            price_vnd: Some(price),
            area_m2: Some(area),
            bedrooms: Some(2),
            ..Default::default()
        }
    }

    fn sample_records() -> Vec<ComparableRecord> {
        vec![
            record("district_7", 5.0e9, 80.0),
            record("district_7", 6.0e9, 100.0),
            record("district_2", 4.0e9, 80.0),
        ]
    }

    #[test]
    fn suggestions_ranked_by_frequency() {
        let ctx = MarketContext::from_records(&sample_records());
        assert_eq!(ctx.sample_count, 3);
        assert_eq!(
            ctx.suggestions_for(AttributeCategory::District),
            vec!["district_7", "district_2"]
        );
        assert_eq!(
            ctx.suggestions_for(AttributeCategory::PropertyType),
            vec!["apartment"]
        );
        assert!(ctx.suggestions_for(AttributeCategory::Amenity).is_empty());
    }

    #[test]
    fn numeric_stats_include_derived_price_per_m2() {
        let ctx = MarketContext::from_records(&sample_records());
        let price = ctx.stats_for(NumericMetric::PriceVnd).unwrap();
        assert_eq!(price.min, 4.0e9);
        assert_eq!(price.max, 6.0e9);
        assert_eq!(price.avg, 5.0e9);

        let per_m2 = ctx.stats_for(NumericMetric::PricePerM2Vnd).unwrap();
        assert_eq!(per_m2.count, 3);
        assert_eq!(per_m2.min, 50.0e6);
        assert_eq!(per_m2.max, 62.5e6);
    }

    #[test]
    fn records_without_values_are_skipped_in_stats() {
        let records = vec![
            record("district_7", 5.0e9, 80.0),
            ComparableRecord::default(),
        ];
        let ctx = MarketContext::from_records(&records);
        assert_eq!(ctx.sample_count, 2);
        assert_eq!(ctx.stats_for(NumericMetric::PriceVnd).unwrap().count, 1);
        assert!(ctx.stats_for(NumericMetric::Bedrooms).is_some());
    }

    #[test]
    fn empty_context_sentinel() {
        let ctx = MarketContext::empty();
        assert!(ctx.is_empty());
        assert!(ctx.suggestions_for(AttributeCategory::District).is_empty());
        assert!(ctx.stats_for(NumericMetric::PriceVnd).is_none());
        assert!(MarketContext::from_records(&[]).is_empty());
    }

    #[test]
    fn retriever_passes_baseline_filters() {
        let client = MockSearchClient::new(sample_records());
        let retriever = ContextRetriever::new(&client, 5);
        let (ctx, warning) = retriever.retrieve("bán căn hộ quận 7 giá 5 tỷ");
        assert!(!ctx.is_empty());
        assert!(warning.is_none());

        let filters = client.last_filters().unwrap();
        assert_eq!(filters.district.as_deref(), Some("district 7"));
        assert_eq!(filters.property_type.as_deref(), Some("apartment"));
    }

    #[test]
    fn search_failure_degrades_to_empty_with_warning() {
        let client = MockSearchClient::failing();
        let retriever = ContextRetriever::new(&client, 5);
        let (ctx, warning) = retriever.retrieve("bán căn hộ quận 7");
        assert!(ctx.is_empty());
        let warning = warning.unwrap();
        assert_eq!(warning.kind, WarningKind::UpstreamDegraded);
        assert!(warning.message.contains("market context unavailable"));
    }

    #[test]
    fn filters_serialize_without_absent_fields() {
        let json = serde_json::to_string(&SearchFilters::default()).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&SearchFilters {
            district: Some("district_7".into()),
            property_type: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"district":"district_7"}"#);
    }
}
