//! Size-bounded thumbnail index with timestamp-ordered eviction.
//!
//! Thumbnail bytes live in the blob store; this index maps drawing id to
//! blob hash and tracks the total stored bytes against a budget. When an
//! insert pushes the total over the budget, least-recently-touched entries
//! are evicted (oldest `touched_at` first, ties broken by drawing id) until
//! the total fits again. The entry being inserted is never a victim of its
//! own insert. Reads refresh `touched_at`.

use crate::db::{Database, StoreError};
use crate::types::ThumbnailRecord;
use rusqlite::{OptionalExtension, params};

/// An index row removed by eviction or replacement. The caller deletes the
/// blob once no other row references the hash.
#[derive(Debug, PartialEq)]
pub struct EvictedThumbnail {
    pub drawing_id: String,
    pub blob_hash: String,
}

pub struct UpsertOutcome {
    /// Hash of the image this drawing's previous thumbnail pointed at, when
    /// the upsert replaced it with different bytes.
    pub replaced_hash: Option<String>,
    /// Entries evicted to get back under the byte budget.
    pub evicted: Vec<EvictedThumbnail>,
}

#[derive(Clone)]
pub struct ThumbnailStore {
    db: Database,
    max_total_bytes: u64,
}

impl ThumbnailStore {
    pub fn new(db: Database, max_total_bytes: u64) -> Self {
        ThumbnailStore {
            db,
            max_total_bytes,
        }
    }

    pub fn max_total_bytes(&self) -> u64 {
        self.max_total_bytes
    }

    /// Insert or replace a drawing's thumbnail, then evict until the total
    /// fits the budget. The caller has already stored the image bytes in the
    /// blob store and verified `size_bytes` does not exceed the whole budget.
    pub fn upsert(
        &self,
        drawing_id: &str,
        blob_hash: &str,
        size_bytes: u64,
        now: u64,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let replaced_hash: Option<String> = tx
            .query_row(
                "SELECT blob_hash FROM thumbnails WHERE drawing_id = ?1",
                params![drawing_id],
                |row| row.get(0),
            )
            .optional()?
            .filter(|old: &String| old.as_str() != blob_hash);

        tx.execute(
            "INSERT INTO thumbnails (drawing_id, blob_hash, size_bytes, touched_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(drawing_id) DO UPDATE
             SET blob_hash = ?2, size_bytes = ?3, touched_at = ?4",
            params![drawing_id, blob_hash, size_bytes, now],
        )?;

        let mut total: u64 = tx.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM thumbnails",
            [],
            |row| row.get(0),
        )?;

        let mut evicted = Vec::new();
        while total > self.max_total_bytes {
            let victim: Option<(String, String, u64)> = tx
                .query_row(
                    "SELECT drawing_id, blob_hash, size_bytes FROM thumbnails
                     WHERE drawing_id != ?1
                     ORDER BY touched_at ASC, drawing_id ASC LIMIT 1",
                    params![drawing_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((victim_id, victim_hash, victim_size)) = victim else {
                // Only the fresh entry remains; the API rejects thumbnails
                // larger than the whole budget before they get here.
                break;
            };

            tx.execute(
                "DELETE FROM thumbnails WHERE drawing_id = ?1",
                params![victim_id],
            )?;
            total = total.saturating_sub(victim_size);
            evicted.push(EvictedThumbnail {
                drawing_id: victim_id,
                blob_hash: victim_hash,
            });
        }

        tx.commit()?;

        if !evicted.is_empty() {
            tracing::debug!(
                "thumbnail budget eviction: removed {} entries, {total} bytes retained",
                evicted.len()
            );
        }

        Ok(UpsertOutcome {
            replaced_hash,
            evicted,
        })
    }

    /// Look up a thumbnail, refreshing its recency.
    pub fn get(&self, drawing_id: &str, now: u64) -> Result<Option<ThumbnailRecord>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let record: Option<ThumbnailRecord> = tx
            .query_row(
                "SELECT drawing_id, blob_hash, size_bytes, touched_at
                 FROM thumbnails WHERE drawing_id = ?1",
                params![drawing_id],
                |row| {
                    Ok(ThumbnailRecord {
                        drawing_id: row.get(0)?,
                        blob_hash: row.get(1)?,
                        size_bytes: row.get(2)?,
                        touched_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        if record.is_some() {
            tx.execute(
                "UPDATE thumbnails SET touched_at = ?1 WHERE drawing_id = ?2",
                params![now, drawing_id],
            )?;
        }
        tx.commit()?;

        Ok(record)
    }

    pub fn total_bytes(&self) -> Result<u64, StoreError> {
        let conn = self.db.conn();
        let total = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM thumbnails",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
