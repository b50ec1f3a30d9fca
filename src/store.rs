//! Store interfaces consumed by the resolver, plus their sqlite-backed
//! implementations.
//!
//! Two tables mirror the two dedup tiers: `competitions` holds records the
//! owner explicitly saved; `scraped_competitions` caches live-scrape results
//! (snake_case columns, remapped on the way out) so repeat searches skip the
//! browser entirely.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{generate_id, CompetitionRecord, ScrapedCompetitionRow};
use crate::utils::error::{AppError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitionStore: Send + Sync {
    async fn find_by_reference(&self, reference: &str, owner: &str) -> Result<Option<CompetitionRecord>>;
    async fn list(&self, owner: &str) -> Result<Vec<CompetitionRecord>>;
    /// Insert, or update when the record carries an id. Returns the stored row.
    async fn save(&self, record: CompetitionRecord, owner: &str) -> Result<CompetitionRecord>;
    /// Returns whether a row was actually removed.
    async fn delete(&self, id: &str, owner: &str) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreviewStore: Send + Sync {
    async fn find_by_reference(&self, reference: &str, owner: &str) -> Result<Option<ScrapedCompetitionRow>>;
    async fn list(&self, owner: &str) -> Result<Vec<ScrapedCompetitionRow>>;
    /// Cache a freshly scraped record for the owner, replacing any previous
    /// preview of the same reference.
    async fn store_preview(&self, record: &CompetitionRecord, owner: &str) -> Result<()>;
}

const RECORD_COLUMNS: &str = "id, name, reference_number, brochure_cost, competition_type, \
     contract_duration, government_entity, etimad_status, submission_method, \
     competition_purpose, guarantee_required, deadline, competition_url, \
     awarded_supplier, award_amount, date_added";

const PREVIEW_COLUMNS: &str = "id, name, reference_number, brochure_cost, competition_type, \
     contract_duration, government_entity, etimad_status, submission_method, \
     competition_purpose, guarantee_required, deadline, competition_url, \
     awarded_supplier, award_amount, scraped_at";

/// Create the schema on startup; idempotent.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS competitions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT,
            reference_number TEXT NOT NULL,
            brochure_cost REAL NOT NULL DEFAULT 0,
            competition_type TEXT,
            contract_duration TEXT,
            government_entity TEXT,
            etimad_status TEXT,
            submission_method TEXT,
            competition_purpose TEXT,
            guarantee_required TEXT,
            deadline TEXT,
            competition_url TEXT,
            awarded_supplier TEXT,
            award_amount REAL,
            date_added TEXT NOT NULL,
            UNIQUE (reference_number, owner_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scraped_competitions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT,
            reference_number TEXT NOT NULL,
            brochure_cost REAL NOT NULL DEFAULT 0,
            competition_type TEXT,
            contract_duration TEXT,
            government_entity TEXT,
            etimad_status TEXT,
            submission_method TEXT,
            competition_purpose TEXT,
            guarantee_required TEXT,
            deadline TEXT,
            competition_url TEXT,
            awarded_supplier TEXT,
            award_amount REAL,
            scraped_at TEXT NOT NULL,
            UNIQUE (reference_number, owner_id)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteCompetitionStore {
    pool: SqlitePool,
}

impl SqliteCompetitionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompetitionStore for SqliteCompetitionStore {
    async fn find_by_reference(&self, reference: &str, owner: &str) -> Result<Option<CompetitionRecord>> {
        let record = sqlx::query_as::<_, CompetitionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM competitions WHERE reference_number = ? AND owner_id = ?"
        ))
        .bind(reference)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list(&self, owner: &str) -> Result<Vec<CompetitionRecord>> {
        let records = sqlx::query_as::<_, CompetitionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM competitions WHERE owner_id = ? ORDER BY date_added DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn save(&self, mut record: CompetitionRecord, owner: &str) -> Result<CompetitionRecord> {
        record.normalize_empty();

        let id = match record.id.clone() {
            Some(id) => {
                let updated = sqlx::query(
                    "UPDATE competitions SET name = ?, reference_number = ?, brochure_cost = ?, \
                     competition_type = ?, contract_duration = ?, government_entity = ?, \
                     etimad_status = ?, submission_method = ?, competition_purpose = ?, \
                     guarantee_required = ?, deadline = ?, competition_url = ?, \
                     awarded_supplier = ?, award_amount = ? \
                     WHERE id = ? AND owner_id = ?",
                )
                .bind(&record.name)
                .bind(&record.reference_number)
                .bind(record.brochure_cost)
                .bind(&record.competition_type)
                .bind(&record.contract_duration)
                .bind(&record.government_entity)
                .bind(&record.etimad_status)
                .bind(&record.submission_method)
                .bind(&record.competition_purpose)
                .bind(&record.guarantee_required)
                .bind(&record.deadline)
                .bind(&record.competition_url)
                .bind(&record.awarded_supplier)
                .bind(record.award_amount)
                .bind(&id)
                .bind(owner)
                .execute(&self.pool)
                .await?
                .rows_affected();

                if updated == 0 {
                    return Err(AppError::Internal(format!(
                        "Competition {id} not found for this owner"
                    )));
                }
                id
            }
            None => {
                let id = generate_id();
                sqlx::query(
                    "INSERT INTO competitions (id, owner_id, name, reference_number, brochure_cost, \
                     competition_type, contract_duration, government_entity, etimad_status, \
                     submission_method, competition_purpose, guarantee_required, deadline, \
                     competition_url, awarded_supplier, award_amount, date_added) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(owner)
                .bind(&record.name)
                .bind(&record.reference_number)
                .bind(record.brochure_cost)
                .bind(&record.competition_type)
                .bind(&record.contract_duration)
                .bind(&record.government_entity)
                .bind(&record.etimad_status)
                .bind(&record.submission_method)
                .bind(&record.competition_purpose)
                .bind(&record.guarantee_required)
                .bind(&record.deadline)
                .bind(&record.competition_url)
                .bind(&record.awarded_supplier)
                .bind(record.award_amount)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;
                id
            }
        };

        let saved = sqlx::query_as::<_, CompetitionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM competitions WHERE id = ? AND owner_id = ?"
        ))
        .bind(&id)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn delete(&self, id: &str, owner: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM competitions WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[derive(Clone)]
pub struct SqlitePreviewStore {
    pool: SqlitePool,
}

impl SqlitePreviewStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreviewStore for SqlitePreviewStore {
    async fn find_by_reference(&self, reference: &str, owner: &str) -> Result<Option<ScrapedCompetitionRow>> {
        let row = sqlx::query_as::<_, ScrapedCompetitionRow>(&format!(
            "SELECT {PREVIEW_COLUMNS} FROM scraped_competitions \
             WHERE reference_number = ? AND owner_id = ?"
        ))
        .bind(reference)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, owner: &str) -> Result<Vec<ScrapedCompetitionRow>> {
        let rows = sqlx::query_as::<_, ScrapedCompetitionRow>(&format!(
            "SELECT {PREVIEW_COLUMNS} FROM scraped_competitions \
             WHERE owner_id = ? ORDER BY scraped_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn store_preview(&self, record: &CompetitionRecord, owner: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO scraped_competitions (id, owner_id, name, reference_number, brochure_cost, \
             competition_type, contract_duration, government_entity, etimad_status, \
             submission_method, competition_purpose, guarantee_required, deadline, \
             competition_url, awarded_supplier, award_amount, scraped_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (reference_number, owner_id) DO UPDATE SET \
             name = excluded.name, brochure_cost = excluded.brochure_cost, \
             competition_type = excluded.competition_type, \
             contract_duration = excluded.contract_duration, \
             government_entity = excluded.government_entity, \
             etimad_status = excluded.etimad_status, \
             submission_method = excluded.submission_method, \
             competition_purpose = excluded.competition_purpose, \
             guarantee_required = excluded.guarantee_required, \
             deadline = excluded.deadline, competition_url = excluded.competition_url, \
             awarded_supplier = excluded.awarded_supplier, \
             award_amount = excluded.award_amount, scraped_at = excluded.scraped_at",
        )
        .bind(generate_id())
        .bind(owner)
        .bind(&record.name)
        .bind(&record.reference_number)
        .bind(record.brochure_cost)
        .bind(&record.competition_type)
        .bind(&record.contract_duration)
        .bind(&record.government_entity)
        .bind(&record.etimad_status)
        .bind(&record.submission_method)
        .bind(&record.competition_purpose)
        .bind(&record.guarantee_required)
        .bind(&record.deadline)
        .bind(&record.competition_url)
        .bind(&record.awarded_supplier)
        .bind(record.award_amount)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    fn sample_record(reference: &str) -> CompetitionRecord {
        serde_json::from_value(serde_json::json!({
            "name": "توريد أجهزة",
            "referenceNumber": reference,
            "brochureCost": 1500.0,
            "competitionType": "منافسة عامة",
            "deadline": "2024-09-21 14:30",
            "competitionUrl": "https://tenders.etimad.sa/Tender/DetailsForVisitor?STenderId=x",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_find_by_reference() {
        let pool = memory_pool().await;
        let store = SqliteCompetitionStore::new(pool);

        let saved = store.save(sample_record("241239001234"), "user-1").await.unwrap();
        assert!(saved.id.is_some());
        assert!(saved.date_added.is_some());

        let found = store
            .find_by_reference("241239001234", "user-1")
            .await
            .unwrap()
            .expect("record should be found");
        assert_eq!(found.name.as_deref(), Some("توريد أجهزة"));
        assert_eq!(found.brochure_cost, 1500.0);
    }

    #[tokio::test]
    async fn test_find_is_owner_scoped() {
        let pool = memory_pool().await;
        let store = SqliteCompetitionStore::new(pool);

        store.save(sample_record("241239001234"), "user-1").await.unwrap();
        let other = store.find_by_reference("241239001234", "user-2").await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_save_updates_existing_record() {
        let pool = memory_pool().await;
        let store = SqliteCompetitionStore::new(pool);

        let saved = store.save(sample_record("241239001234"), "user-1").await.unwrap();
        let mut updated = saved.clone();
        updated.name = Some("اسم محدث".to_string());
        updated.etimad_status = Some("".to_string()); // normalized to NULL

        let stored = store.save(updated, "user-1").await.unwrap();
        assert_eq!(stored.id, saved.id);
        assert_eq!(stored.name.as_deref(), Some("اسم محدث"));
        assert!(stored.etimad_status.is_none());

        let all = store.list("user-1").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let pool = memory_pool().await;
        let store = SqliteCompetitionStore::new(pool);

        let mut record = sample_record("241239001234");
        record.id = Some("does-not-exist".to_string());
        let result = store.save(record, "user-1").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_delete_scoped_to_owner() {
        let pool = memory_pool().await;
        let store = SqliteCompetitionStore::new(pool);

        let saved = store.save(sample_record("241239001234"), "user-1").await.unwrap();
        let id = saved.id.unwrap();

        assert!(!store.delete(&id, "user-2").await.unwrap());
        assert!(store.delete(&id, "user-1").await.unwrap());
        assert!(store.find_by_reference("241239001234", "user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preview_roundtrip_and_upsert() {
        let pool = memory_pool().await;
        let store = SqlitePreviewStore::new(pool);

        let record = sample_record("241239001234");
        store.store_preview(&record, "user-1").await.unwrap();

        let row = store
            .find_by_reference("241239001234", "user-1")
            .await
            .unwrap()
            .expect("preview should be cached");
        assert_eq!(row.reference_number, "241239001234");
        assert_eq!(row.brochure_cost, 1500.0);

        // Storing again replaces the cached preview rather than duplicating it.
        let mut fresher = record.clone();
        fresher.name = Some("اسم جديد".to_string());
        store.store_preview(&fresher, "user-1").await.unwrap();

        let rows = store.list("user-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("اسم جديد"));
    }

    #[tokio::test]
    async fn test_preview_is_owner_scoped() {
        let pool = memory_pool().await;
        let store = SqlitePreviewStore::new(pool);

        store.store_preview(&sample_record("241239001234"), "user-1").await.unwrap();
        assert!(store.find_by_reference("241239001234", "user-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_on_disk() {
        // Exercise the rwc path against a real file, as production does.
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("scout.db").display());
        let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await.unwrap();
        init_schema(&pool).await.unwrap();

        let store = SqliteCompetitionStore::new(pool);
        store.save(sample_record("1"), "user-1").await.unwrap();
        assert_eq!(store.list("user-1").await.unwrap().len(), 1);
    }
}
