use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AttributeCategory {
    City => "city",
    District => "district",
    PropertyType => "property_type",
    Direction => "direction",
    LegalStatus => "legal_status",
    Furnishing => "furnishing",
    Amenity => "amenity",
});

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 7] = [
        AttributeCategory::City,
        AttributeCategory::District,
        AttributeCategory::PropertyType,
        AttributeCategory::Direction,
        AttributeCategory::LegalStatus,
        AttributeCategory::Furnishing,
        AttributeCategory::Amenity,
    ];

    /// Reference table an approved value of this category grows into.
    /// Surfaced to reviewers so a queued "Thảo Điền" reads as a district
    /// candidate, not an opaque string.
    pub fn suggested_table(&self) -> &'static str {
        match self {
            Self::City => "cities",
            Self::District => "districts",
            Self::PropertyType => "property_types",
            Self::Direction => "directions",
            Self::LegalStatus => "legal_statuses",
            Self::Furnishing => "furnishing_levels",
            Self::Amenity => "amenities",
        }
    }

    pub fn label_en(&self) -> &'static str {
        match self {
            Self::City => "City",
            Self::District => "District",
            Self::PropertyType => "Property type",
            Self::Direction => "Direction",
            Self::LegalStatus => "Legal status",
            Self::Furnishing => "Furnishing",
            Self::Amenity => "Amenity",
        }
    }
}

str_enum!(Language {
    Vi => "vi",
    En => "en",
});

impl Language {
    pub const ALL: [Language; 2] = [Language::Vi, Language::En];
}

str_enum!(MatchMethod {
    Exact => "exact",
    Alias => "alias",
    Fuzzy => "fuzzy",
});

str_enum!(PendingStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(ListingKind {
    Sale => "sale",
    Rent => "rent",
});

str_enum!(WarningKind {
    UpstreamDegraded => "upstream_degraded",
    ParseFailure => "parse_failure",
    BaselineDisagreement => "baseline_disagreement",
    OutOfRange => "out_of_range",
    Implausible => "implausible",
    TranslationFallback => "translation_fallback",
    GapFilled => "gap_filled",
});

str_enum!(NumericMetric {
    PriceVnd => "price_vnd",
    AreaM2 => "area_m2",
    PricePerM2Vnd => "price_per_m2_vnd",
    Bedrooms => "bedrooms",
});
