use crate::db::{Database, StoreError};
use crate::types::{Drawing, unix_now};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use rusqlite::{OptionalExtension, Transaction, params};
use uuid::Uuid;

const SELECT_DRAWING: &str = "SELECT id, project_id, user_id, name, payload_hash, share_id,
        created_at, updated_at FROM drawings";

/// What a deleted drawing referenced, for blob garbage collection by the
/// caller.
#[derive(Debug)]
pub struct DeletedDrawing {
    pub payload_hash: String,
    pub thumbnail_hash: Option<String>,
}

#[derive(Clone)]
pub struct DrawingRepository {
    db: Database,
}

impl DrawingRepository {
    pub fn new(db: Database) -> Self {
        DrawingRepository { db }
    }

    /// Insert a drawing under one of the user's projects. `None` when the
    /// project does not exist for this user.
    pub fn create(
        &self,
        user_id: i64,
        project_id: &str,
        name: &str,
        payload_hash: &str,
    ) -> Result<Option<Drawing>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        if !project_owned(&tx, user_id, project_id)? {
            return Ok(None);
        }

        let drawing = Drawing {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            user_id,
            name: name.to_string(),
            payload_hash: payload_hash.to_string(),
            share_id: None,
            created_at: unix_now(),
            updated_at: unix_now(),
        };

        tx.execute(
            "INSERT INTO drawings (id, project_id, user_id, name, payload_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                drawing.id,
                drawing.project_id,
                drawing.user_id,
                drawing.name,
                drawing.payload_hash,
                drawing.created_at,
                drawing.updated_at
            ],
        )?;
        tx.execute(
            "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
            params![drawing.created_at, project_id],
        )?;
        tx.commit()?;

        Ok(Some(drawing))
    }

    /// Drawings of one of the user's projects, most recently updated first.
    /// `None` when the project itself is missing, which the API maps to 404
    /// rather than an empty list.
    pub fn list(&self, user_id: i64, project_id: &str) -> Result<Option<Vec<Drawing>>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        if !project_owned(&tx, user_id, project_id)? {
            return Ok(None);
        }

        let drawings = {
            let mut stmt = tx.prepare(&format!(
                "{SELECT_DRAWING} WHERE project_id = ?1 ORDER BY updated_at DESC, id"
            ))?;
            stmt.query_map(params![project_id], row_to_drawing)?
                .collect::<Result<_, _>>()?
        };

        Ok(Some(drawings))
    }

    pub fn find(&self, user_id: i64, id: &str) -> Result<Option<Drawing>, StoreError> {
        let conn = self.db.conn();
        let drawing = conn
            .query_row(
                &format!("{SELECT_DRAWING} WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                row_to_drawing,
            )
            .optional()?;
        Ok(drawing)
    }

    /// Update name and/or payload hash. Returns the updated row plus the
    /// payload hash that was replaced, if the payload changed — the caller
    /// decides whether the old blob is still referenced.
    pub fn update(
        &self,
        user_id: i64,
        id: &str,
        name: Option<&str>,
        payload_hash: Option<&str>,
    ) -> Result<Option<(Drawing, Option<String>)>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let Some(mut drawing) = find_in_tx(&tx, user_id, id)? else {
            return Ok(None);
        };

        let mut replaced = None;
        if let Some(name) = name {
            drawing.name = name.to_string();
        }
        if let Some(payload_hash) = payload_hash
            && payload_hash != drawing.payload_hash
        {
            replaced = Some(std::mem::replace(
                &mut drawing.payload_hash,
                payload_hash.to_string(),
            ));
        }
        drawing.updated_at = unix_now();

        tx.execute(
            "UPDATE drawings SET name = ?1, payload_hash = ?2, updated_at = ?3 WHERE id = ?4",
            params![drawing.name, drawing.payload_hash, drawing.updated_at, id],
        )?;
        tx.commit()?;

        Ok(Some((drawing, replaced)))
    }

    /// Delete a drawing and its thumbnail row, returning the hashes they
    /// referenced. `None` when the drawing is not the user's.
    pub fn delete(&self, user_id: i64, id: &str) -> Result<Option<DeletedDrawing>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let Some(drawing) = find_in_tx(&tx, user_id, id)? else {
            return Ok(None);
        };

        let thumbnail_hash: Option<String> = tx
            .query_row(
                "SELECT blob_hash FROM thumbnails WHERE drawing_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        // The thumbnail row goes with the drawing by cascade.
        tx.execute("DELETE FROM drawings WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok(Some(DeletedDrawing {
            payload_hash: drawing.payload_hash,
            thumbnail_hash,
        }))
    }

    /// Return the drawing's share id, creating one if absent. `None` when
    /// the drawing is not the user's.
    pub fn ensure_share_id(&self, user_id: i64, id: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let Some(drawing) = find_in_tx(&tx, user_id, id)? else {
            return Ok(None);
        };
        if let Some(existing) = drawing.share_id {
            return Ok(Some(existing));
        }

        // 16 random bytes is far past birthday-collision territory, but the
        // UNIQUE constraint backstops it; retry on the astronomically rare hit.
        loop {
            let share_id = new_share_id();
            let result = tx.execute(
                "UPDATE drawings SET share_id = ?1 WHERE id = ?2",
                params![share_id, id],
            );
            match result {
                Ok(_) => {
                    tx.commit()?;
                    return Ok(Some(share_id));
                }
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Revoke the share id. `Some(true)` when one was cleared, `Some(false)`
    /// when the drawing had none, `None` when it is not the user's.
    pub fn clear_share_id(&self, user_id: i64, id: &str) -> Result<Option<bool>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let Some(drawing) = find_in_tx(&tx, user_id, id)? else {
            return Ok(None);
        };
        let had_share = drawing.share_id.is_some();

        tx.execute(
            "UPDATE drawings SET share_id = NULL WHERE id = ?1",
            params![id],
        )?;
        tx.commit()?;

        Ok(Some(had_share))
    }

    /// Unauthenticated lookup: possession of the share id is the entire
    /// capability.
    pub fn find_by_share_id(&self, share_id: &str) -> Result<Option<Drawing>, StoreError> {
        let conn = self.db.conn();
        let drawing = conn
            .query_row(
                &format!("{SELECT_DRAWING} WHERE share_id = ?1"),
                params![share_id],
                row_to_drawing,
            )
            .optional()?;
        Ok(drawing)
    }

    /// How many rows (drawings or thumbnails) still reference a blob hash.
    pub fn blob_refcount(&self, hash: &str) -> Result<u64, StoreError> {
        let conn = self.db.conn();
        let count: u64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM drawings WHERE payload_hash = ?1)
                  + (SELECT COUNT(*) FROM thumbnails WHERE blob_hash = ?1)",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn project_owned(
    tx: &Transaction<'_>,
    user_id: i64,
    project_id: &str,
) -> Result<bool, StoreError> {
    let owned: Option<String> = tx
        .query_row(
            "SELECT id FROM projects WHERE id = ?1 AND user_id = ?2",
            params![project_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owned.is_some())
}

fn find_in_tx(
    tx: &Transaction<'_>,
    user_id: i64,
    id: &str,
) -> Result<Option<Drawing>, StoreError> {
    let drawing = tx
        .query_row(
            &format!("{SELECT_DRAWING} WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            row_to_drawing,
        )
        .optional()?;
    Ok(drawing)
}

fn row_to_drawing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Drawing> {
    Ok(Drawing {
        id: row.get(0)?,
        project_id: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        payload_hash: row.get(4)?,
        share_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn new_share_id() -> String {
    let raw: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(raw)
}
