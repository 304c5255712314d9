//! Repository layer: entity-scoped database operations.
//!
//! Plain functions over `&rusqlite::Connection`; callers own connections and
//! transaction boundaries (the review service composes multi-step approvals).

pub mod pending;
pub mod reference;
