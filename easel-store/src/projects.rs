use crate::db::{Database, StoreError};
use crate::types::{Project, unix_now};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

#[derive(Clone)]
pub struct ProjectRepository {
    db: Database,
}

impl ProjectRepository {
    pub fn new(db: Database) -> Self {
        ProjectRepository { db }
    }

    pub fn create(&self, user_id: i64, name: &str) -> Result<Project, StoreError> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            user_id,
            name: name.to_string(),
            created_at: unix_now(),
            updated_at: unix_now(),
        };

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO projects (id, user_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.user_id,
                project.name,
                project.created_at,
                project.updated_at
            ],
        )?;

        Ok(project)
    }

    /// The user's projects, most recently updated first.
    pub fn list(&self, user_id: i64) -> Result<Vec<Project>, StoreError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, created_at, updated_at FROM projects
             WHERE user_id = ?1 ORDER BY updated_at DESC, id",
        )?;
        let projects = stmt
            .query_map(params![user_id], row_to_project)?
            .collect::<Result<_, _>>()?;
        Ok(projects)
    }

    /// Lookups are always scoped to the owner; a foreign project id behaves
    /// exactly like a missing one.
    pub fn find(&self, user_id: i64, id: &str) -> Result<Option<Project>, StoreError> {
        let conn = self.db.conn();
        let project = conn
            .query_row(
                "SELECT id, user_id, name, created_at, updated_at FROM projects
                 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    pub fn rename(&self, user_id: i64, id: &str, name: &str) -> Result<Option<Project>, StoreError> {
        let now = unix_now();
        let conn = self.db.conn();
        let changed = conn.execute(
            "UPDATE projects SET name = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![name, now, id, user_id],
        )?;

        if changed == 0 {
            return Ok(None);
        }

        let project = conn.query_row(
            "SELECT id, user_id, name, created_at, updated_at FROM projects WHERE id = ?1",
            params![id],
            row_to_project,
        )?;
        Ok(Some(project))
    }

    /// Delete a project and, by cascade, its drawings and thumbnails.
    /// Returns the blob hashes those rows referenced so the caller can drop
    /// the ones no surviving row still points at. `None` when the project
    /// does not exist for this user.
    pub fn delete(&self, user_id: i64, id: &str) -> Result<Option<Vec<String>>, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let owned: Option<String> = tx
            .query_row(
                "SELECT id FROM projects WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        if owned.is_none() {
            return Ok(None);
        }

        // UNION deduplicates, so shared payloads appear once.
        let hashes: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT payload_hash FROM drawings WHERE project_id = ?1
                 UNION
                 SELECT t.blob_hash FROM thumbnails t
                 JOIN drawings d ON d.id = t.drawing_id WHERE d.project_id = ?1",
            )?;
            stmt.query_map(params![id], |row| row.get(0))?
                .collect::<Result<_, _>>()?
        };

        tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok(Some(hashes))
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepository;

    fn fixtures() -> (UserRepository, ProjectRepository, i64) {
        let db = Database::open_in_memory().unwrap();
        let users = UserRepository::new(db.clone());
        let projects = ProjectRepository::new(db);
        let user = users.create("a@example.com", "hash").unwrap();
        (users, projects, user.id)
    }

    #[test]
    fn test_crud() {
        let (_, projects, user_id) = fixtures();

        let created = projects.create(user_id, "sketches").unwrap();
        assert_eq!(projects.list(user_id).unwrap(), vec![created.clone()]);

        let renamed = projects.rename(user_id, &created.id, "diagrams").unwrap().unwrap();
        assert_eq!(renamed.name, "diagrams");
        assert_eq!(renamed.created_at, created.created_at);

        assert!(projects.delete(user_id, &created.id).unwrap().is_some());
        assert!(projects.list(user_id).unwrap().is_empty());
        assert!(projects.delete(user_id, &created.id).unwrap().is_none());
    }

    #[test]
    fn test_user_isolation() {
        let (users, projects, user_id) = fixtures();
        let other = users.create("b@example.com", "hash").unwrap();

        let project = projects.create(user_id, "mine").unwrap();

        assert!(projects.find(other.id, &project.id).unwrap().is_none());
        assert!(projects.rename(other.id, &project.id, "stolen").unwrap().is_none());
        assert!(projects.delete(other.id, &project.id).unwrap().is_none());
        assert!(projects.list(other.id).unwrap().is_empty());

        // The owner still sees the original name.
        let found = projects.find(user_id, &project.id).unwrap().unwrap();
        assert_eq!(found.name, "mine");
    }
}
