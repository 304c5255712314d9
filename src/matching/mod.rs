//! Reference entity resolution.
//!
//! `snapshot` loads the reference tables into an immutable in-memory view,
//! `similarity` provides diacritic folding and string scoring, and `matcher`
//! runs the tiered exact → alias → fuzzy resolution against a snapshot.

pub mod matcher;
pub mod similarity;
pub mod snapshot;

pub use matcher::{match_value, MatchOutcome, MatchedAttribute};
pub use similarity::{fold, normalize, Similarity, TokenSortRatio};
pub use snapshot::{ReferenceSnapshot, SnapshotStatus, SnapshotStore};
