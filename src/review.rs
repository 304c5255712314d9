//! Admin surface for the pending-value review queue.
//!
//! Approval is the only write path into the reference dataset. One
//! transaction re-checks the pending row, inserts the entity with its alias
//! and translations, and settles the item; the reference snapshot is
//! invalidated after commit so the next extraction request resolves the
//! value instead of re-queueing it.

use std::collections::BTreeMap;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;

use crate::db::repository::{pending, reference};
use crate::db::DatabaseError;
use crate::matching::SnapshotStore;
use crate::models::enums::{AttributeCategory, Language, PendingStatus};
use crate::models::pending::PendingItem;

pub use crate::db::repository::pending::{list_pending, pending_counts};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("review failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("pending item {pending_id} not found")]
    NotFound { pending_id: i64 },

    #[error("invalid review request: {0}")]
    InvalidRequest(String),
}

/// What a settle call did. `AlreadyProcessed` is a normal outcome, not an
/// error: the second reviewer of a row learns where it went.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved { entity_id: i64 },
    Rejected,
    AlreadyProcessed { status: PendingStatus },
}

/// Promote a pending value into the reference dataset.
///
/// `translations` are the reviewer's display strings; the item's suggested
/// translations fill any language the reviewer left out. `canonical_name_en`
/// comes from the English translation, or is derived from the candidate code
/// when no English text exists. `category_override` lets the reviewer correct
/// a wrong or missing suggestion.
pub fn approve_pending(
    conn: &Connection,
    snapshots: &SnapshotStore,
    pending_id: i64,
    translations: &BTreeMap<Language, String>,
    admin_id: &str,
    category_override: Option<AttributeCategory>,
) -> Result<ReviewOutcome, ReviewError> {
    // BEGIN IMMEDIATE: take the write lock before reading the status, so a
    // concurrent approval of the same row blocks here (busy_timeout covers
    // the wait) and then observes the settled status instead of failing on
    // its first write.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| ReviewError::Database(DatabaseError::Sqlite(e)))?;

    let item = fetch_item(&tx, pending_id)?;
    if item.status != PendingStatus::Pending {
        return Ok(ReviewOutcome::AlreadyProcessed {
            status: item.status,
        });
    }

    let category = category_override.or(item.suggested_category).ok_or_else(|| {
        ReviewError::InvalidRequest(format!(
            "pending item {pending_id} has no suggested category; pass an override"
        ))
    })?;

    let mut merged = item.suggested_translations.clone();
    for (lang, text) in translations {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            merged.insert(*lang, trimmed.to_string());
        }
    }

    let canonical_name_en = merged
        .get(&Language::En)
        .cloned()
        .unwrap_or_else(|| name_from_candidate(&item.value_canonical_candidate));

    let entity_id = reference::insert_reference_entity(
        &tx,
        category,
        &item.value_canonical_candidate,
        &canonical_name_en,
    )?;
    reference::add_alias(&tx, entity_id, category, &item.value_original)?;
    for (lang, text) in &merged {
        reference::upsert_translation(&tx, entity_id, *lang, text)?;
    }

    // The immediate transaction has held the write lock since before the
    // status check, so the row is still pending here. A false update count
    // would mean that assumption broke; drop the transaction (rolling back
    // the entity insert) and report where the row went.
    if !pending::mark_reviewed(&tx, pending_id, PendingStatus::Approved, admin_id)? {
        let item = fetch_item(&tx, pending_id)?;
        return Ok(ReviewOutcome::AlreadyProcessed {
            status: item.status,
        });
    }
    tx.commit().map_err(DatabaseError::Sqlite)?;

    snapshots.invalidate();
    tracing::info!(
        pending_id,
        entity_id,
        category = category.as_str(),
        admin = admin_id,
        "pending value approved"
    );
    Ok(ReviewOutcome::Approved { entity_id })
}

/// Settle a pending value as rejected. Never touches the reference store, so
/// no snapshot invalidation is needed.
pub fn reject_pending(
    conn: &Connection,
    pending_id: i64,
    admin_id: &str,
) -> Result<ReviewOutcome, ReviewError> {
    if pending::mark_reviewed(conn, pending_id, PendingStatus::Rejected, admin_id)? {
        tracing::info!(pending_id, admin = admin_id, "pending value rejected");
        return Ok(ReviewOutcome::Rejected);
    }
    let item = fetch_item(conn, pending_id)?;
    Ok(ReviewOutcome::AlreadyProcessed {
        status: item.status,
    })
}

fn fetch_item(conn: &Connection, pending_id: i64) -> Result<PendingItem, ReviewError> {
    pending::get_pending_item(conn, pending_id).map_err(|e| match e {
        DatabaseError::NotFound { .. } => ReviewError::NotFound { pending_id },
        other => ReviewError::Database(other),
    })
}

/// `thao_dien` → `Thao Dien`.
fn name_from_candidate(candidate: &str) -> String {
    candidate
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
