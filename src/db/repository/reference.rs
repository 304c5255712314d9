use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing;

use crate::db::DatabaseError;
use crate::models::entity::{NumericRange, ReferenceEntity, SeedFile};
use crate::models::enums::{AttributeCategory, Language, NumericMetric};

/// Insert a canonical entity; returns the new entity id.
pub fn insert_reference_entity(
    conn: &Connection,
    category: AttributeCategory,
    canonical_code: &str,
    canonical_name_en: &str,
) -> Result<i64, DatabaseError> {
    if canonical_code.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "canonical_code must be non-empty".into(),
        ));
    }
    if canonical_name_en.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "canonical_name_en must be non-empty".into(),
        ));
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO reference_entities (category, canonical_code, canonical_name_en, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5)",
        params![category.as_str(), canonical_code, canonical_name_en, now, now],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "canonical_code '{canonical_code}' already exists in category '{}'",
                category.as_str()
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;

    Ok(conn.last_insert_rowid())
}

/// Register an alias for an entity. Aliases are stored lower-cased and are
/// unique per category; re-adding an existing spelling is a no-op so seeding
/// and re-approval stay idempotent.
pub fn add_alias(
    conn: &Connection,
    entity_id: i64,
    category: AttributeCategory,
    alias: &str,
) -> Result<(), DatabaseError> {
    let normalized = alias.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO entity_aliases (entity_id, category, alias)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(category, alias) DO NOTHING",
        params![entity_id, category.as_str(), normalized],
    )?;
    Ok(())
}

/// Upsert a display translation; re-approval overwrites the previous text.
pub fn upsert_translation(
    conn: &Connection,
    entity_id: i64,
    lang: Language,
    text: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO entity_translations (entity_id, lang_code, text)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(entity_id, lang_code) DO UPDATE SET text = excluded.text",
        params![entity_id, lang.as_str(), text],
    )?;
    Ok(())
}

pub fn upsert_numeric_range(
    conn: &Connection,
    entity_id: i64,
    metric: NumericMetric,
    min_value: f64,
    avg_value: f64,
    max_value: f64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO entity_numeric_ranges (entity_id, metric, min_value, avg_value, max_value)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(entity_id, metric) DO UPDATE SET
             min_value = excluded.min_value,
             avg_value = excluded.avg_value,
             max_value = excluded.max_value",
        params![entity_id, metric.as_str(), min_value, avg_value, max_value],
    )?;
    Ok(())
}

/// Retire an entity from matching without deleting it.
pub fn deactivate_entity(conn: &Connection, entity_id: i64) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE reference_entities SET active = 0, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), entity_id],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "reference_entity".into(),
            id: entity_id.to_string(),
        });
    }
    Ok(())
}

/// Fetch one entity (any status) with aliases, translations, and ranges.
pub fn get_entity(conn: &Connection, entity_id: i64) -> Result<ReferenceEntity, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, category, canonical_code, canonical_name_en, active, created_at, updated_at
             FROM reference_entities WHERE id = ?1",
            params![entity_id],
            map_entity_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "reference_entity".into(),
                id: entity_id.to_string(),
            },
            other => DatabaseError::Sqlite(other),
        })?;

    let mut entity = entity_from_row(row)?;

    let mut stmt = conn.prepare("SELECT alias FROM entity_aliases WHERE entity_id = ?1")?;
    let aliases = stmt.query_map(params![entity_id], |r| r.get::<_, String>(0))?;
    for alias in aliases {
        entity.aliases.push(alias?);
    }

    let mut stmt =
        conn.prepare("SELECT lang_code, text FROM entity_translations WHERE entity_id = ?1")?;
    let translations = stmt.query_map(params![entity_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    for t in translations {
        let (lang, text) = t?;
        entity.display_names.insert(Language::from_str(&lang)?, text);
    }

    let mut stmt = conn.prepare(
        "SELECT metric, min_value, avg_value, max_value FROM entity_numeric_ranges WHERE entity_id = ?1",
    )?;
    let ranges = stmt.query_map(params![entity_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, f64>(1)?,
            r.get::<_, f64>(2)?,
            r.get::<_, f64>(3)?,
        ))
    })?;
    for r in ranges {
        let (metric, min_value, avg_value, max_value) = r?;
        entity.numeric_ranges.push(NumericRange {
            entity_id,
            metric: NumericMetric::from_str(&metric)?,
            min_value,
            avg_value,
            max_value,
        });
    }

    Ok(entity)
}

/// All active entities in one category, children attached.
pub fn get_entities(
    conn: &Connection,
    category: AttributeCategory,
) -> Result<Vec<ReferenceEntity>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, category, canonical_code, canonical_name_en, active, created_at, updated_at
         FROM reference_entities WHERE category = ?1 AND active = 1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![category.as_str()], map_entity_row)?;
    let mut entities = Vec::new();
    for row in rows {
        entities.push(entity_from_row(row?)?);
    }
    drop(stmt);

    let mut alias_stmt = conn.prepare(
        "SELECT entity_id, alias FROM entity_aliases WHERE category = ?1 ORDER BY entity_id",
    )?;
    let alias_rows = alias_stmt.query_map(params![category.as_str()], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
    })?;
    let mut aliases: HashMap<i64, Vec<String>> = HashMap::new();
    for row in alias_rows {
        let (entity_id, alias) = row?;
        aliases.entry(entity_id).or_default().push(alias);
    }

    let mut tr_stmt = conn.prepare(
        "SELECT t.entity_id, t.lang_code, t.text
         FROM entity_translations t
         JOIN reference_entities e ON e.id = t.entity_id
         WHERE e.category = ?1",
    )?;
    let tr_rows = tr_stmt.query_map(params![category.as_str()], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
    })?;
    let mut translations: HashMap<i64, BTreeMap<Language, String>> = HashMap::new();
    for row in tr_rows {
        let (entity_id, lang, text) = row?;
        translations
            .entry(entity_id)
            .or_default()
            .insert(Language::from_str(&lang)?, text);
    }

    let mut range_stmt = conn.prepare(
        "SELECT r.entity_id, r.metric, r.min_value, r.avg_value, r.max_value
         FROM entity_numeric_ranges r
         JOIN reference_entities e ON e.id = r.entity_id
         WHERE e.category = ?1",
    )?;
    let range_rows = range_stmt.query_map(params![category.as_str()], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, f64>(2)?,
            r.get::<_, f64>(3)?,
            r.get::<_, f64>(4)?,
        ))
    })?;
    let mut ranges: HashMap<i64, Vec<NumericRange>> = HashMap::new();
    for row in range_rows {
        let (entity_id, metric, min_value, avg_value, max_value) = row?;
        ranges.entry(entity_id).or_default().push(NumericRange {
            entity_id,
            metric: NumericMetric::from_str(&metric)?,
            min_value,
            avg_value,
            max_value,
        });
    }

    for entity in &mut entities {
        if let Some(a) = aliases.remove(&entity.id) {
            entity.aliases = a;
        }
        if let Some(t) = translations.remove(&entity.id) {
            entity.display_names = t;
        }
        if let Some(r) = ranges.remove(&entity.id) {
            entity.numeric_ranges = r;
        }
    }

    Ok(entities)
}

/// All active entities across every category. Used by the snapshot loader.
pub fn get_all_entities(
    conn: &Connection,
) -> Result<HashMap<AttributeCategory, Vec<ReferenceEntity>>, DatabaseError> {
    let mut by_category = HashMap::new();
    for category in AttributeCategory::ALL {
        by_category.insert(category, get_entities(conn, category)?);
    }
    Ok(by_category)
}

/// Active entity count per category.
pub fn category_counts(
    conn: &Connection,
) -> Result<BTreeMap<AttributeCategory, i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM reference_entities WHERE active = 1 GROUP BY category",
    )?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut counts = BTreeMap::new();
    for row in rows {
        let (category, count) = row?;
        counts.insert(AttributeCategory::from_str(&category)?, count);
    }
    Ok(counts)
}

/// Load the embedded bootstrap dataset. Entities whose `(category,
/// canonical_code)` already exist are skipped, so calling this on every
/// startup is safe. Returns the number of entities inserted.
pub fn seed_reference_data(conn: &Connection) -> Result<u32, DatabaseError> {
    let seed: SeedFile =
        serde_json::from_str(include_str!("../../../resources/seed/reference_seed.json"))
            .map_err(|e| DatabaseError::SeedInvalid(e.to_string()))?;

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0u32;

    for entry in &seed.entities {
        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM reference_entities WHERE category = ?1 AND canonical_code = ?2)",
            params![entry.category.as_str(), entry.canonical_code],
            |r| r.get(0),
        )?;
        if exists {
            continue;
        }

        let entity_id = insert_reference_entity(
            &tx,
            entry.category,
            &entry.canonical_code,
            &entry.canonical_name_en,
        )?;
        for alias in &entry.aliases {
            add_alias(&tx, entity_id, entry.category, alias)?;
        }
        for (lang, text) in &entry.translations {
            upsert_translation(&tx, entity_id, *lang, text)?;
        }
        for range in &entry.ranges {
            upsert_numeric_range(&tx, entity_id, range.metric, range.min, range.avg, range.max)?;
        }
        inserted += 1;
    }

    tx.commit()?;
    if inserted > 0 {
        tracing::info!(entities = inserted, "Seeded reference dataset");
    }
    Ok(inserted)
}

type EntityRow = (i64, String, String, String, bool, DateTime<Utc>, DateTime<Utc>);

fn map_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn entity_from_row(row: EntityRow) -> Result<ReferenceEntity, DatabaseError> {
    let (id, category, canonical_code, canonical_name_en, active, created_at, updated_at) = row;
    Ok(ReferenceEntity {
        id,
        category: AttributeCategory::from_str(&category)?,
        canonical_code,
        canonical_name_en,
        display_names: BTreeMap::new(),
        aliases: Vec::new(),
        active,
        numeric_ranges: Vec::new(),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_get_entity_round_trip() {
        let conn = open_memory_database().unwrap();
        let id = insert_reference_entity(
            &conn,
            AttributeCategory::District,
            "district_7",
            "District 7",
        )
        .unwrap();
        add_alias(&conn, id, AttributeCategory::District, "Q7").unwrap();
        upsert_translation(&conn, id, Language::Vi, "Quận 7").unwrap();
        upsert_numeric_range(&conn, id, NumericMetric::PricePerM2Vnd, 40e6, 80e6, 150e6).unwrap();

        let entity = get_entity(&conn, id).unwrap();
        assert_eq!(entity.canonical_code, "district_7");
        assert_eq!(entity.aliases, vec!["q7"]); // stored lower-cased
        assert_eq!(entity.display_names[&Language::Vi], "Quận 7");
        assert_eq!(entity.numeric_ranges.len(), 1);
        assert!(entity.active);
    }

    #[test]
    fn duplicate_code_in_category_is_rejected() {
        let conn = open_memory_database().unwrap();
        insert_reference_entity(&conn, AttributeCategory::District, "district_7", "District 7")
            .unwrap();
        let err = insert_reference_entity(
            &conn,
            AttributeCategory::District,
            "district_7",
            "District Seven",
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        // Same code in another category is fine.
        insert_reference_entity(&conn, AttributeCategory::Amenity, "district_7", "Oddball")
            .unwrap();
    }

    #[test]
    fn alias_is_unique_per_category_not_per_entity() {
        let conn = open_memory_database().unwrap();
        let a = insert_reference_entity(&conn, AttributeCategory::District, "district_1", "District 1")
            .unwrap();
        let b = insert_reference_entity(&conn, AttributeCategory::District, "district_2", "District 2")
            .unwrap();
        add_alias(&conn, a, AttributeCategory::District, "q1").unwrap();
        // Second claim on the same spelling is ignored; first owner keeps it.
        add_alias(&conn, b, AttributeCategory::District, "Q1").unwrap();

        let owner: i64 = conn
            .query_row(
                "SELECT entity_id FROM entity_aliases WHERE category = 'district' AND alias = 'q1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(owner, a);
    }

    #[test]
    fn translation_upsert_overwrites() {
        let conn = open_memory_database().unwrap();
        let id = insert_reference_entity(&conn, AttributeCategory::Amenity, "pool", "Pool").unwrap();
        upsert_translation(&conn, id, Language::Vi, "Bể bơi").unwrap();
        upsert_translation(&conn, id, Language::Vi, "Hồ bơi").unwrap();
        let entity = get_entity(&conn, id).unwrap();
        assert_eq!(entity.display_names[&Language::Vi], "Hồ bơi");
    }

    #[test]
    fn deactivated_entity_leaves_active_listing() {
        let conn = open_memory_database().unwrap();
        let id = insert_reference_entity(&conn, AttributeCategory::District, "district_9", "District 9")
            .unwrap();
        assert_eq!(get_entities(&conn, AttributeCategory::District).unwrap().len(), 1);

        deactivate_entity(&conn, id).unwrap();
        assert!(get_entities(&conn, AttributeCategory::District).unwrap().is_empty());
        // Still readable directly; history is preserved.
        let entity = get_entity(&conn, id).unwrap();
        assert!(!entity.active);
    }

    #[test]
    fn deactivate_unknown_entity_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = deactivate_entity(&conn, 999).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn seeding_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let first = seed_reference_data(&conn).unwrap();
        assert!(first > 40, "seed should insert the full dataset, got {first}");
        let second = seed_reference_data(&conn).unwrap();
        assert_eq!(second, 0);

        let districts = get_entities(&conn, AttributeCategory::District).unwrap();
        assert!(districts.iter().any(|e| e.canonical_code == "district_7"));
        let d7 = districts.iter().find(|e| e.canonical_code == "district_7").unwrap();
        assert_eq!(d7.display_names[&Language::Vi], "Quận 7");
        assert!(d7
            .numeric_ranges
            .iter()
            .any(|r| r.metric == NumericMetric::PricePerM2Vnd));
    }

    #[test]
    fn category_counts_reflect_active_rows() {
        let conn = open_memory_database().unwrap();
        seed_reference_data(&conn).unwrap();
        let counts = category_counts(&conn).unwrap();
        assert_eq!(counts[&AttributeCategory::Direction], 8);
        assert!(counts[&AttributeCategory::District] >= 10);
    }
}
