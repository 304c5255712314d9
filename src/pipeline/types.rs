use serde::{Deserialize, Serialize};

use crate::matching::MatchedAttribute;
use crate::models::enums::{AttributeCategory, Language, WarningKind};
use crate::models::pending::DiscoveredAttribute;

/// Candidate attribute map produced by the extraction stages, before any
/// reference matching. Every field is optional; absence means the stage
/// found nothing, not that the listing lacks the attribute.
///
/// `#[serde(default)]` keeps parsing lenient: generative output that omits
/// fields (or adds unknown ones) still deserializes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateAttributes {
    pub listing_kind: Option<String>,
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
    pub bathrooms: Option<u32>,
    pub floors: Option<u32>,
}

impl CandidateAttributes {
    pub fn is_empty(&self) -> bool {
        self.listing_kind.is_none()
            && self.city.is_none()
            && self.district.is_none()
            && self.property_type.is_none()
            && self.direction.is_none()
            && self.legal_status.is_none()
            && self.furnishing.is_none()
            && self.amenities.is_empty()
            && self.price_vnd.is_none()
            && self.area_m2.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.floors.is_none()
    }

    /// The single-valued categorical fields that go through reference
    /// matching, as `(category, value)` pairs. Amenities are multi-valued
    /// and handled separately.
    pub fn single_valued(&self) -> Vec<(AttributeCategory, &str)> {
        fn field(cat: AttributeCategory, v: &Option<String>) -> Option<(AttributeCategory, &str)> {
            v.as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|s| (cat, s))
        }
        [
            field(AttributeCategory::City, &self.city),
            field(AttributeCategory::District, &self.district),
            field(AttributeCategory::PropertyType, &self.property_type),
            field(AttributeCategory::Direction, &self.direction),
            field(AttributeCategory::LegalStatus, &self.legal_status),
            field(AttributeCategory::Furnishing, &self.furnishing),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Output of the deterministic rule pass: the floor the request falls back
/// to when every network stage fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineExtraction {
    pub attributes: CandidateAttributes,
    pub confidence: f32,
}

/// A non-fatal finding attached to the result. The kind lets hosts alert
/// on collaborator outages without parsing messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A follow-up question for the requester, produced when fused confidence
/// falls below the clarification threshold. Suggestions are ranked and come
/// only from observed market context, never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    pub field: String,
    pub question: String,
    pub suggestions: Vec<String>,
}

/// Final output of one extraction request.
///
/// `mapped` holds values resolved against the reference dataset, `new` holds
/// values routed to the pending-review queue. A value appears in exactly one
/// of the two; `raw` preserves the reconciled pre-matching view.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub raw: CandidateAttributes,
    pub language: Language,
    pub mapped: Vec<MatchedAttribute>,
    pub new: Vec<DiscoveredAttribute>,
    pub confidence: f32,
    pub warnings: Vec<ExtractionWarning>,
    pub clarifications: Vec<Clarification>,
}
