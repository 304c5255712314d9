//! Merge of generative and baseline candidates.
//!
//! The generative map wins on every populated field; the baseline fills
//! whatever it left empty. Deterministic and total, no I/O.

use crate::pipeline::types::CandidateAttributes;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledAttributes {
    pub attributes: CandidateAttributes,
    /// Field names the baseline supplied because the generative map left
    /// them empty.
    pub gap_filled: Vec<&'static str>,
}

pub fn reconcile(
    generative: CandidateAttributes,
    baseline: &CandidateAttributes,
) -> ReconciledAttributes {
    let mut attributes = generative;
    let mut gap_filled = Vec::new();

    fn fill<T: Clone>(
        slot: &mut Option<T>,
        fallback: &Option<T>,
        name: &'static str,
        gap_filled: &mut Vec<&'static str>,
    ) {
        if slot.is_none() {
            if let Some(value) = fallback {
                *slot = Some(value.clone());
                gap_filled.push(name);
            }
        }
    }

    fill(
        &mut attributes.listing_kind,
        &baseline.listing_kind,
        "listing_kind",
        &mut gap_filled,
    );
    fill(&mut attributes.city, &baseline.city, "city", &mut gap_filled);
    fill(
        &mut attributes.district,
        &baseline.district,
        "district",
        &mut gap_filled,
    );
    fill(
        &mut attributes.property_type,
        &baseline.property_type,
        "property_type",
        &mut gap_filled,
    );
    fill(
        &mut attributes.direction,
        &baseline.direction,
        "direction",
        &mut gap_filled,
    );
    fill(
        &mut attributes.legal_status,
        &baseline.legal_status,
        "legal_status",
        &mut gap_filled,
    );
    fill(
        &mut attributes.furnishing,
        &baseline.furnishing,
        "furnishing",
        &mut gap_filled,
    );
    fill(
        &mut attributes.price_vnd,
        &baseline.price_vnd,
        "price_vnd",
        &mut gap_filled,
    );
    fill(
        &mut attributes.area_m2,
        &baseline.area_m2,
        "area_m2",
        &mut gap_filled,
    );
    fill(
        &mut attributes.bedrooms,
        &baseline.bedrooms,
        "bedrooms",
        &mut gap_filled,
    );
    fill(
        &mut attributes.bathrooms,
        &baseline.bathrooms,
        "bathrooms",
        &mut gap_filled,
    );
    fill(
        &mut attributes.floors,
        &baseline.floors,
        "floors",
        &mut gap_filled,
    );

    if attributes.amenities.is_empty() && !baseline.amenities.is_empty() {
        attributes.amenities = baseline.amenities.clone();
        gap_filled.push("amenities");
    }

    ReconciledAttributes {
        attributes,
        gap_filled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generative_wins_on_populated_fields() {
        let generative = CandidateAttributes {
            district: Some("Quận 7".into()),
            price_vnd: Some(5.5e9),
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            district: Some("district 7".into()),
            price_vnd: Some(5.0e9),
            ..Default::default()
        };
        let merged = reconcile(generative, &baseline);
        assert_eq!(merged.attributes.district.as_deref(), Some("Quận 7"));
        assert_eq!(merged.attributes.price_vnd, Some(5.5e9));
        assert!(merged.gap_filled.is_empty());
    }

    #[test]
    fn baseline_fills_missing_fields_and_records_notes() {
        let generative = CandidateAttributes {
            district: Some("Quận 7".into()),
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            district: Some("district 7".into()),
            price_vnd: Some(5.0e9),
            area_m2: Some(80.0),
            amenities: vec!["pool".into()],
            ..Default::default()
        };
        let merged = reconcile(generative, &baseline);
        assert_eq!(merged.attributes.district.as_deref(), Some("Quận 7"));
        assert_eq!(merged.attributes.price_vnd, Some(5.0e9));
        assert_eq!(merged.attributes.area_m2, Some(80.0));
        assert_eq!(merged.attributes.amenities, vec!["pool"]);
        assert_eq!(merged.gap_filled, vec!["price_vnd", "area_m2", "amenities"]);
    }

    #[test]
    fn empty_generative_takes_baseline_wholesale() {
        let baseline = CandidateAttributes {
            listing_kind: Some("sale".into()),
            district: Some("district 7".into()),
            bedrooms: Some(2),
            ..Default::default()
        };
        let merged = reconcile(CandidateAttributes::default(), &baseline);
        assert_eq!(merged.attributes, baseline);
        assert_eq!(
            merged.gap_filled,
            vec!["listing_kind", "district", "bedrooms"]
        );
    }

    #[test]
    fn generative_amenities_are_not_unioned_with_baseline() {
        let generative = CandidateAttributes {
            amenities: vec!["hồ bơi".into()],
            ..Default::default()
        };
        let baseline = CandidateAttributes {
            amenities: vec!["pool".into(), "gym".into()],
            ..Default::default()
        };
        let merged = reconcile(generative, &baseline);
        assert_eq!(merged.attributes.amenities, vec!["hồ bơi"]);
        assert!(merged.gap_filled.is_empty());
    }
}
