//! Domain model: closed enums, reference entities, pending review items.

pub mod enums;
pub mod entity;
pub mod pending;

pub use enums::{
    AttributeCategory, Language, ListingKind, MatchMethod, NumericMetric, PendingStatus,
    WarningKind,
};
pub use entity::{NumericRange, ReferenceEntity, SeedEntity, SeedFile, SeedRange, Translation};
pub use pending::{DiscoveredAttribute, PendingItem};
