use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use argus_core::{ArgusError, Fingerprint, RunId};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use tokio::sync::Mutex;

use crate::fingerprint::compute_fingerprint;

/// One persisted audit record, as returned by trace queries.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub run_id: String,
    pub step_index: i64,
    pub action: String,
    pub payload: Value,
    pub fingerprint: Fingerprint,
    pub ts: DateTime<Utc>,
}

/// Summary row for `list_runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub last_activity_ts: DateTime<Utc>,
    pub step_count: i64,
}

/// Append-only SQLite audit store.
///
/// Writes for the same run id are serialized behind a per-run mutex so that
/// step index assignment and insertion cannot interleave. Records are never
/// updated or deleted by this crate.
#[derive(Clone)]
pub struct AuditStore {
    pool: Pool<Sqlite>,
    run_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AuditStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to connect to audit database")?;

        let store = Self {
            pool,
            run_locks: Arc::new(Mutex::new(HashMap::new())),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                step_index INTEGER NOT NULL,
                action TEXT NOT NULL,
                payload TEXT NOT NULL,
                fingerprint TEXT NOT NULL UNIQUE,
                ts INTEGER NOT NULL,
                UNIQUE(run_id, step_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create audit_records table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_run ON audit_records(run_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create audit run index")?;

        Ok(())
    }

    /// Get or create the write lock for one run id.
    async fn run_lock(&self, run_id: &RunId) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.lock().await;
        locks
            .entry(run_id.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return a run lock handle, dropping its map entry when no other writer
    /// holds one. Cloning only happens under the outer map lock, so the
    /// strong-count check here cannot race a new writer.
    async fn release_run_lock(&self, run_id: &RunId, lock: Arc<Mutex<()>>) {
        let mut locks = self.run_locks.lock().await;
        drop(lock);
        if let Some(entry) = locks.get(run_id.as_str()) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(run_id.as_str());
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn run_lock_count(&self) -> usize {
        self.run_locks.lock().await.len()
    }

    /// Persist one record and return its fingerprint.
    ///
    /// The write is committed before this returns; a failed write surfaces
    /// as `Persistence` and must abort the caller's run.
    pub async fn record(
        &self,
        run_id: &RunId,
        action: &str,
        payload: &Value,
    ) -> Result<Fingerprint, ArgusError> {
        let fingerprint = compute_fingerprint(run_id, action, payload)?;

        let lock = self.run_lock(run_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.insert_record(run_id, action, payload, &fingerprint).await
        };
        self.release_run_lock(run_id, lock).await;
        result?;
        Ok(fingerprint)
    }

    async fn insert_record(
        &self,
        run_id: &RunId,
        action: &str,
        payload: &Value,
        fingerprint: &Fingerprint,
    ) -> Result<(), ArgusError> {
        let payload_text = payload.to_string();
        let ts = Utc::now().timestamp_millis();

        let next_index: i64 = sqlx::query(
            "SELECT COALESCE(MAX(step_index) + 1, 0) AS next FROM audit_records WHERE run_id = ?",
        )
        .bind(run_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ArgusError::Persistence(format!("step index lookup failed: {e}")))?
        .get("next");

        sqlx::query(
            r#"
            INSERT INTO audit_records (run_id, step_index, action, payload, fingerprint, ts)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run_id.as_str())
        .bind(next_index)
        .bind(action)
        .bind(&payload_text)
        .bind(fingerprint.as_str())
        .bind(ts)
        .execute(&self.pool)
        .await
        .map_err(|e| ArgusError::Persistence(format!("audit insert failed: {e}")))?;

        tracing::debug!(
            "Audited {} step {} for run {} ({})",
            action,
            next_index,
            run_id,
            fingerprint
        );
        Ok(())
    }

    /// Run summaries ordered by most recent activity descending.
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<RunSummary>, ArgusError> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, MAX(ts) AS last_ts, COUNT(*) AS step_count
            FROM audit_records
            GROUP BY run_id
            ORDER BY last_ts DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ArgusError::Persistence(format!("run listing failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| RunSummary {
                run_id: row.get("run_id"),
                last_activity_ts: millis_to_datetime(row.get("last_ts")),
                step_count: row.get("step_count"),
            })
            .collect())
    }

    /// All records for a run, ascending by step index.
    pub async fn get_trace(&self, run_id: &RunId) -> Result<Vec<StepRecord>, ArgusError> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, step_index, action, payload, fingerprint, ts
            FROM audit_records
            WHERE run_id = ?
            ORDER BY step_index ASC
            "#,
        )
        .bind(run_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ArgusError::Persistence(format!("trace query failed: {e}")))?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Tamper lookup: find the record with a given fingerprint, if any.
    pub async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StepRecord>, ArgusError> {
        let row = sqlx::query(
            r#"
            SELECT run_id, step_index, action, payload, fingerprint, ts
            FROM audit_records
            WHERE fingerprint = ?
            "#,
        )
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ArgusError::Persistence(format!("fingerprint lookup failed: {e}")))?;

        row.map(row_to_record).transpose()
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<StepRecord, ArgusError> {
    let payload_text: String = row.get("payload");
    let payload: Value = serde_json::from_str(&payload_text)
        .map_err(|e| ArgusError::Persistence(format!("stored payload not valid JSON: {e}")))?;
    Ok(StepRecord {
        run_id: row.get("run_id"),
        step_index: row.get("step_index"),
        action: row.get("action"),
        payload,
        fingerprint: Fingerprint::from_hex(row.get::<String, _>("fingerprint")),
        ts: millis_to_datetime(row.get("ts")),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
