//! Repository for case records

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::intake::{Batch, CaseRepository, NormalizedRecord, PersistenceError};

/// [`CaseRepository`] backed by the `case_master` table
#[derive(Debug, Clone)]
pub struct SqliteCaseRepository {
    pool: SqlitePool,
}

impl SqliteCaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCaseRepository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CaseRepository for SqliteCaseRepository {
    async fn save_batch(&self, batch: &Batch) -> Result<Vec<String>, PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(|e| PersistenceError {
            row: None,
            message: format!("Failed to begin transaction: {}", e),
        })?;

        let mut case_ids = Vec::with_capacity(batch.len());
        for staged in &batch.records {
            match insert_case(&mut tx, &staged.record).await {
                Ok(case_id) => case_ids.push(case_id),
                Err(e) => {
                    log::warn!(
                        "Insert failed for row {}, rolling back {} record(s)",
                        staged.row_number(),
                        batch.len()
                    );
                    // Dropping the transaction rolls it back
                    return Err(PersistenceError {
                        row: Some(staged.row),
                        message: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(|e| PersistenceError {
            row: None,
            message: format!("Failed to commit transaction: {}", e),
        })?;

        Ok(case_ids)
    }
}

async fn insert_case(
    tx: &mut Transaction<'_, Sqlite>,
    record: &NormalizedRecord,
) -> Result<String, sqlx::Error> {
    let seq = sqlx::query("INSERT INTO case_id_seq DEFAULT VALUES")
        .execute(&mut **tx)
        .await?;
    let case_id = seq.last_insert_rowid().to_string();

    sqlx::query(
        r#"
        INSERT INTO case_master (
            case_id, channel_id, user_id, submitted_at, case_type, case_status_id,
            is_current_resident, title_code, first_name, middle_name, last_name,
            date_of_birth, post_code, third_party_reference_1, third_party_reference_2
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&case_id)
    .bind(&record.channel_id)
    .bind(&record.user_id)
    .bind(record.submitted_at)
    .bind(&record.case_type)
    .bind(record.case_status_id)
    .bind(&record.is_current_resident)
    .bind(&record.title_code)
    .bind(&record.first_name)
    .bind(&record.middle_name)
    .bind(&record.last_name)
    .bind(record.date_of_birth)
    .bind(&record.post_code)
    .bind(&record.third_party_reference_1)
    .bind(&record.third_party_reference_2)
    .execute(&mut **tx)
    .await?;

    Ok(case_id)
}

/// Number of persisted cases
pub async fn count_cases(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM case_master")
        .fetch_one(pool)
        .await
        .context("Failed to count cases")?;
    Ok(row.try_get("count")?)
}

/// Most recently created cases first
pub async fn list_cases(pool: &SqlitePool, limit: u32) -> Result<Vec<NormalizedRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT case_id, channel_id, user_id, submitted_at, case_type, case_status_id,
               is_current_resident, title_code, first_name, middle_name, last_name,
               date_of_birth, post_code, third_party_reference_1, third_party_reference_2
        FROM case_master
        ORDER BY rowid DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to list cases")?;

    let mut cases = Vec::new();
    for row in rows {
        cases.push(NormalizedRecord {
            case_id: row.try_get("case_id")?,
            channel_id: row.try_get("channel_id")?,
            user_id: row.try_get("user_id")?,
            submitted_at: row.try_get("submitted_at")?,
            case_type: row.try_get("case_type")?,
            case_status_id: row.try_get("case_status_id")?,
            is_current_resident: row.try_get("is_current_resident")?,
            title_code: row.try_get("title_code")?,
            first_name: row.try_get("first_name")?,
            middle_name: row.try_get("middle_name")?,
            last_name: row.try_get("last_name")?,
            date_of_birth: row.try_get("date_of_birth")?,
            post_code: row.try_get("post_code")?,
            third_party_reference_1: row.try_get("third_party_reference_1")?,
            third_party_reference_2: row.try_get("third_party_reference_2")?,
        });
    }

    Ok(cases)
}
