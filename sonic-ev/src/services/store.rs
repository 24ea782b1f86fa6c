//! TTL-keyed result store
//!
//! Key space:
//! - `result:{evaluator_id}:{fingerprint}:{segment_index}` -> EvaluationRecord
//! - `result:{evaluator_id}:{fingerprint}` -> bulk record list
//! - `summary:{fingerprint}` -> AggregateSummary (independent TTL)
//! - `transcript:{fingerprint}` -> raw transcript segments
//! - `segments:{fingerprint}` -> classified segments
//! - `filename:{fingerprint}` -> original upload filename
//!
//! Every write carries a TTL. A read miss means "not yet evaluated", never an
//! error. Each result key is written by exactly one worker execution, so
//! concurrent re-evaluation is last-writer-wins with no locking.

use crate::models::{AggregateSummary, EvaluationRecord, Segment, TranscriptSegment};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sonic_common::{Error, Result};
use sqlx::SqlitePool;
use std::time::Duration;

/// Key builders for the persisted layout
pub fn segment_key(evaluator_id: &str, fingerprint: &str, segment_index: usize) -> String {
    format!("result:{}:{}:{}", evaluator_id, fingerprint, segment_index)
}

pub fn bulk_key(evaluator_id: &str, fingerprint: &str) -> String {
    format!("result:{}:{}", evaluator_id, fingerprint)
}

pub fn summary_key(fingerprint: &str) -> String {
    format!("summary:{}", fingerprint)
}

pub fn transcript_key(fingerprint: &str) -> String {
    format!("transcript:{}", fingerprint)
}

pub fn segments_key(fingerprint: &str) -> String {
    format!("segments:{}", fingerprint)
}

pub fn filename_key(fingerprint: &str) -> String {
    format!("filename:{}", fingerprint)
}

/// TTL cache over the shared SQLite pool
#[derive(Clone)]
pub struct ResultStore {
    db: SqlitePool,
    record_ttl: Duration,
    summary_ttl: Duration,
}

impl ResultStore {
    pub fn new(db: SqlitePool, record_ttl: Duration, summary_ttl: Duration) -> Self {
        Self {
            db,
            record_ttl,
            summary_ttl,
        }
    }

    pub fn record_ttl(&self) -> Duration {
        self.record_ttl
    }

    /// Write a JSON value under `key` with the given TTL (last-writer-wins)
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| Error::Internal(format!("Failed to serialize cache value: {}", e)))?;
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;

        sqlx::query("INSERT OR REPLACE INTO cache (key, value, expires_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(&json)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache write");
        Ok(())
    }

    /// Read a JSON value; `Ok(None)` on miss or expiry
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.db)
                .await?;

        match row {
            None => Ok(None),
            Some((json,)) => {
                let value = serde_json::from_str(&json).map_err(|e| {
                    Error::Internal(format!("Corrupt cache value at {}: {}", key, e))
                })?;
                Ok(Some(value))
            }
        }
    }

    /// Whether a live (unexpired) value exists under `key`
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM cache WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.db)
                .await?;
        Ok(row.is_some())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Remove expired rows; returns the number deleted
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.db)
            .await?;
        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache entries");
        }
        Ok(purged)
    }

    // Typed accessors over the key layout

    pub async fn put_record(&self, record: &EvaluationRecord) -> Result<()> {
        let key = segment_key(&record.evaluator_id, &record.fingerprint, record.segment_index);
        self.set_json(&key, record, self.record_ttl).await
    }

    pub async fn get_record(
        &self,
        evaluator_id: &str,
        fingerprint: &str,
        segment_index: usize,
    ) -> Result<Option<EvaluationRecord>> {
        self.get_json(&segment_key(evaluator_id, fingerprint, segment_index))
            .await
    }

    pub async fn put_bulk(
        &self,
        evaluator_id: &str,
        fingerprint: &str,
        records: &[EvaluationRecord],
    ) -> Result<()> {
        self.set_json(&bulk_key(evaluator_id, fingerprint), &records, self.record_ttl)
            .await
    }

    pub async fn get_bulk(
        &self,
        evaluator_id: &str,
        fingerprint: &str,
    ) -> Result<Option<Vec<EvaluationRecord>>> {
        self.get_json(&bulk_key(evaluator_id, fingerprint)).await
    }

    pub async fn put_summary(&self, summary: &AggregateSummary) -> Result<()> {
        self.set_json(&summary_key(&summary.fingerprint), summary, self.summary_ttl)
            .await
    }

    pub async fn get_summary(&self, fingerprint: &str) -> Result<Option<AggregateSummary>> {
        self.get_json(&summary_key(fingerprint)).await
    }

    pub async fn put_transcript(
        &self,
        fingerprint: &str,
        segments: &[TranscriptSegment],
    ) -> Result<()> {
        self.set_json(&transcript_key(fingerprint), &segments, self.record_ttl)
            .await
    }

    pub async fn get_transcript(&self, fingerprint: &str) -> Result<Option<Vec<TranscriptSegment>>> {
        self.get_json(&transcript_key(fingerprint)).await
    }

    pub async fn put_segments(&self, fingerprint: &str, segments: &[Segment]) -> Result<()> {
        self.set_json(&segments_key(fingerprint), &segments, self.record_ttl)
            .await
    }

    pub async fn get_segments(&self, fingerprint: &str) -> Result<Option<Vec<Segment>>> {
        self.get_json(&segments_key(fingerprint)).await
    }

    pub async fn put_filename(&self, fingerprint: &str, filename: &str) -> Result<()> {
        self.set_json(&filename_key(fingerprint), &filename, self.record_ttl)
            .await
    }
}
