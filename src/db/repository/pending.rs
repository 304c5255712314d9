use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing;

use crate::db::DatabaseError;
use crate::models::enums::{AttributeCategory, Language, PendingStatus};
use crate::models::pending::PendingItem;

/// Record a discovery of an unmatched value.
///
/// Single upsert statement: either inserts a fresh `pending` row with
/// `frequency = 1` or bumps the frequency of the existing open row for the
/// same `(attribute_name, value_canonical_candidate)`. The partial unique
/// index makes this race-free under concurrent extraction workers: two
/// simultaneous discoveries of the same value produce one row with
/// `frequency = 2`, never two rows. Returns `(pending_id, frequency)`.
///
/// The first-seen `value_original`, suggestions, and translations are kept
/// on conflict; later sightings only count.
pub fn discover(
    conn: &Connection,
    attribute_name: &str,
    value_original: &str,
    canonical_candidate: &str,
    suggested_category: Option<AttributeCategory>,
    suggested_translations: &BTreeMap<Language, String>,
) -> Result<(i64, i64), DatabaseError> {
    let translations_json = serde_json::to_string(suggested_translations)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("translations not serializable: {e}")))?;
    let now = Utc::now();

    let (id, frequency) = conn.query_row(
        "INSERT INTO pending_items
             (attribute_name, value_original, value_canonical_candidate, suggested_category,
              suggested_translations, frequency, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, 'pending', ?6, ?6)
         ON CONFLICT(attribute_name, value_canonical_candidate) WHERE status = 'pending'
         DO UPDATE SET
             frequency = pending_items.frequency + 1,
             updated_at = excluded.updated_at
         RETURNING id, frequency",
        params![
            attribute_name,
            value_original,
            canonical_candidate,
            suggested_category.map(|c| c.as_str()),
            translations_json,
            now,
        ],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
    )?;

    tracing::debug!(attribute = attribute_name, candidate = canonical_candidate, frequency, "Discovery recorded");
    Ok((id, frequency))
}

/// Fetch one pending item by id, any status.
pub fn get_pending_item(conn: &Connection, pending_id: i64) -> Result<PendingItem, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, attribute_name, value_original, value_canonical_candidate,
                    suggested_category, suggested_translations, frequency, status,
                    reviewed_by, reviewed_at, created_at, updated_at
             FROM pending_items WHERE id = ?1",
            params![pending_id],
            map_pending_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "pending_item".into(),
                id: pending_id.to_string(),
            },
            other => DatabaseError::Sqlite(other),
        })?;
    pending_from_row(row)
}

/// Review-queue projection: high-impact items first.
pub fn list_pending(
    conn: &Connection,
    status: PendingStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<PendingItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, attribute_name, value_original, value_canonical_candidate,
                suggested_category, suggested_translations, frequency, status,
                reviewed_by, reviewed_at, created_at, updated_at
         FROM pending_items
         WHERE status = ?1
         ORDER BY frequency DESC, created_at DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt.query_map(params![status.as_str(), limit, offset], map_pending_row)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(pending_from_row(row?)?);
    }
    Ok(items)
}

/// Item counts per status.
pub fn pending_counts(conn: &Connection) -> Result<BTreeMap<PendingStatus, i64>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM pending_items GROUP BY status")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut counts = BTreeMap::new();
    for row in rows {
        let (status, count) = row?;
        counts.insert(PendingStatus::from_str(&status)?, count);
    }
    Ok(counts)
}

/// Conditionally settle a pending row. Returns `true` if this call performed
/// the transition, `false` if the row was no longer `pending` (lost a race or
/// was already reviewed). Terminal states never revert.
pub fn mark_reviewed(
    conn: &Connection,
    pending_id: i64,
    new_status: PendingStatus,
    admin_id: &str,
) -> Result<bool, DatabaseError> {
    if new_status == PendingStatus::Pending {
        return Err(DatabaseError::ConstraintViolation(
            "cannot transition back to pending".into(),
        ));
    }
    let now = Utc::now();
    let updated = conn.execute(
        "UPDATE pending_items
         SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![new_status.as_str(), admin_id, now, pending_id],
    )?;
    Ok(updated == 1)
}

type PendingRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    i64,
    String,
    Option<String>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn map_pending_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn pending_from_row(row: PendingRow) -> Result<PendingItem, DatabaseError> {
    let (
        id,
        attribute_name,
        value_original,
        value_canonical_candidate,
        suggested_category,
        suggested_translations,
        frequency,
        status,
        reviewed_by,
        reviewed_at,
        created_at,
        updated_at,
    ) = row;

    let suggested_translations: BTreeMap<Language, String> =
        serde_json::from_str(&suggested_translations).map_err(|e| {
            DatabaseError::ConstraintViolation(format!("bad suggested_translations JSON: {e}"))
        })?;

    Ok(PendingItem {
        id,
        attribute_name,
        value_original,
        value_canonical_candidate,
        suggested_category: suggested_category
            .map(|s| AttributeCategory::from_str(&s))
            .transpose()?,
        suggested_translations,
        frequency,
        status: PendingStatus::from_str(&status)?,
        reviewed_by,
        reviewed_at,
        created_at,
        updated_at,
    })
}
