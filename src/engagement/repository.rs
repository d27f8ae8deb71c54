// Repository pattern - isolates relation persistence behind a trait
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::{self, RepositoryError};
use crate::engagement::domain::{Relation, RelationKind, SubjectKind};
use crate::state::DbPool;

/// Persistent record of which user likes or has read which content item.
///
/// Every operation resolves the user (and the item, where one is named) first
/// and fails with `NotFound` when either is missing. Mutations are single
/// statements, so callers never observe partial states.
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn has_relation(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<bool, RepositoryError>;

    /// Insert a relation stamped with `at`. For unique kinds an existing
    /// relation for the pair is returned unchanged.
    async fn add_relation_at(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
        at: DateTime<Utc>,
    ) -> Result<Relation, RepositoryError>;

    async fn add_relation(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<Relation, RepositoryError> {
        self.add_relation_at(user_id, item_id, kind, Utc::now())
            .await
    }

    /// Remove every relation of `kind` for the pair (returns rows deleted).
    async fn remove_relation(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<u64, RepositoryError>;

    /// Newest first; equal timestamps ordered by relation id ascending.
    async fn list_relations_for_user(
        &self,
        user_id: &str,
        kind: RelationKind,
    ) -> Result<Vec<Relation>, RepositoryError>;

    /// Ids of every item the user holds a relation of `kind` with.
    async fn related_ids(
        &self,
        user_id: &str,
        kind: RelationKind,
    ) -> Result<HashSet<String>, RepositoryError> {
        Ok(self
            .list_relations_for_user(user_id, kind)
            .await?
            .into_iter()
            .map(|r| r.item_id)
            .collect())
    }

    /// The newest relation per distinct item, newest first, at most `limit`.
    async fn latest_per_item(
        &self,
        user_id: &str,
        kind: RelationKind,
        limit: usize,
    ) -> Result<Vec<Relation>, RepositoryError>;

    async fn count_for_item(
        &self,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<i64, RepositoryError>;

    /// Relation counts keyed by item id; items without relations are absent.
    async fn counts_for_items(
        &self,
        item_ids: &[String],
        kind: RelationKind,
    ) -> Result<HashMap<String, i64>, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteRelationStore {
    pool: DbPool,
}

impl SqliteRelationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn ensure_exists(conn: &Connection, subject: SubjectKind, id: &str) -> Result<(), RepositoryError> {
    let sql = format!("SELECT COUNT(*) > 0 FROM {} WHERE id = ?1", subject.table());
    let exists: bool = conn.query_row(&sql, params![id], |row| row.get(0))?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found(subject.label(), id))
    }
}

fn ensure_user(conn: &Connection, user_id: &str) -> Result<(), RepositoryError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::not_found("User", user_id))
    }
}

/// Bound parameters per `IN (...)` batch, well under SQLite's variable limit.
const IN_BATCH: usize = 500;

/// An insert that lost a race with a delete reports the vanished side as `NotFound`.
fn missing_reference(
    conn: &Connection,
    kind: RelationKind,
    user_id: &str,
    item_id: &str,
    err: rusqlite::Error,
) -> RepositoryError {
    if !db::is_foreign_key_violation(&err) {
        return err.into();
    }
    if let Err(missing) = ensure_user(conn, user_id) {
        return missing;
    }
    if let Err(missing) = ensure_exists(conn, kind.subject(), item_id) {
        return missing;
    }
    err.into()
}

fn read_relation(kind: RelationKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Relation> {
    Ok(Relation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        kind,
        created_at: db::parse_timestamp(&row.get::<_, String>(3)?),
    })
}

#[async_trait]
impl RelationStore for SqliteRelationStore {
    async fn has_relation(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        ensure_user(&conn, user_id)?;
        ensure_exists(&conn, kind.subject(), item_id)?;

        let sql = format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE user_id = ?1 AND item_id = ?2",
            kind.table()
        );
        let found: bool = conn.query_row(&sql, params![user_id, item_id], |row| row.get(0))?;
        Ok(found)
    }

    async fn add_relation_at(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
        at: DateTime<Utc>,
    ) -> Result<Relation, RepositoryError> {
        let conn = self.pool.get()?;
        ensure_user(&conn, user_id)?;
        ensure_exists(&conn, kind.subject(), item_id)?;

        let relation = Relation {
            id: db::new_id(),
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            kind,
            created_at: at,
        };

        // Unique kinds: a racing duplicate insert is a no-op, the pair already holds
        let sql = if kind.is_unique() {
            format!(
                "INSERT INTO {} (id, user_id, item_id, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, item_id) DO NOTHING",
                kind.table()
            )
        } else {
            format!(
                "INSERT INTO {} (id, user_id, item_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                kind.table()
            )
        };

        let inserted = conn.execute(
            &sql,
            params![
                relation.id,
                relation.user_id,
                relation.item_id,
                db::format_timestamp(&relation.created_at)
            ],
        )
        .map_err(|e| missing_reference(&conn, kind, user_id, item_id, e))?;

        if inserted > 0 {
            return Ok(relation);
        }

        let sql = format!(
            "SELECT id, user_id, item_id, created_at FROM {} WHERE user_id = ?1 AND item_id = ?2",
            kind.table()
        );
        conn.query_row(&sql, params![user_id, item_id], |row| read_relation(kind, row))
            .optional()?
            .ok_or_else(|| {
                RepositoryError::Conflict(format!(
                    "Relation for user \"{}\" and item \"{}\" vanished during insert",
                    user_id, item_id
                ))
            })
    }

    async fn remove_relation(
        &self,
        user_id: &str,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;
        ensure_user(&conn, user_id)?;
        ensure_exists(&conn, kind.subject(), item_id)?;

        let sql = format!(
            "DELETE FROM {} WHERE user_id = ?1 AND item_id = ?2",
            kind.table()
        );
        let rows = conn.execute(&sql, params![user_id, item_id])?;
        Ok(rows as u64)
    }

    async fn list_relations_for_user(
        &self,
        user_id: &str,
        kind: RelationKind,
    ) -> Result<Vec<Relation>, RepositoryError> {
        let conn = self.pool.get()?;
        ensure_user(&conn, user_id)?;

        let sql = format!(
            "SELECT id, user_id, item_id, created_at FROM {}
             WHERE user_id = ?1
             ORDER BY created_at DESC, id ASC",
            kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let relations = stmt
            .query_map(params![user_id], |row| read_relation(kind, row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    async fn latest_per_item(
        &self,
        user_id: &str,
        kind: RelationKind,
        limit: usize,
    ) -> Result<Vec<Relation>, RepositoryError> {
        let conn = self.pool.get()?;
        ensure_user(&conn, user_id)?;

        let sql = format!(
            "SELECT id, user_id, item_id, created_at FROM (
                 SELECT id, user_id, item_id, created_at,
                        ROW_NUMBER() OVER (
                            PARTITION BY item_id ORDER BY created_at DESC, id ASC
                        ) AS rn
                 FROM {}
                 WHERE user_id = ?1
             )
             WHERE rn = 1
             ORDER BY created_at DESC, id ASC
             LIMIT ?2",
            kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let relations = stmt
            .query_map(params![user_id, limit as i64], |row| read_relation(kind, row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(relations)
    }

    async fn counts_for_items(
        &self,
        item_ids: &[String],
        kind: RelationKind,
    ) -> Result<HashMap<String, i64>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut counts = HashMap::new();

        for batch in item_ids.chunks(IN_BATCH) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "SELECT item_id, COUNT(*) FROM {} WHERE item_id IN ({}) GROUP BY item_id",
                kind.table(),
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (item_id, count) = row?;
                counts.insert(item_id, count);
            }
        }

        Ok(counts)
    }

    async fn count_for_item(
        &self,
        item_id: &str,
        kind: RelationKind,
    ) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE item_id = ?1", kind.table());
        let count: i64 = conn.query_row(&sql, params![item_id], |row| row.get(0))?;
        Ok(count)
    }
}

/// Type alias for Arc-wrapped store (for AppState)
pub type DynRelationStore = Arc<dyn RelationStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteRelationStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, username, created_at) VALUES ('u1', 'ann', '2025-01-01T00:00:00.000000Z');
             INSERT INTO users (id, username, created_at) VALUES ('u2', 'bob', '2025-01-01T00:00:00.000000Z');
             INSERT INTO authors (id, name, created_at) VALUES ('a1', 'Keats', '2025-01-01T00:00:00.000000Z');
             INSERT INTO poems (id, title, author_id, created_at) VALUES ('p1', 'Ode', 'a1', '2025-01-01T00:00:00.000000Z');
             INSERT INTO poems (id, title, author_id, created_at) VALUES ('p2', 'Elegy', 'a1', '2025-01-01T00:00:00.000000Z');",
        )
        .unwrap();
        drop(conn);

        (SqliteRelationStore::new(pool), temp_dir)
    }

    const LIKED_AUTHOR: RelationKind = RelationKind::Liked(SubjectKind::Author);

    #[tokio::test]
    async fn add_then_has_then_remove() {
        let (store, _temp) = create_test_store();

        assert!(!store.has_relation("u1", "a1", LIKED_AUTHOR).await.unwrap());
        let relation = store.add_relation("u1", "a1", LIKED_AUTHOR).await.unwrap();
        assert_eq!(relation.item_id, "a1");
        assert!(store.has_relation("u1", "a1", LIKED_AUTHOR).await.unwrap());

        assert_eq!(store.remove_relation("u1", "a1", LIKED_AUTHOR).await.unwrap(), 1);
        assert!(!store.has_relation("u1", "a1", LIKED_AUTHOR).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_like_is_a_noop() {
        let (store, _temp) = create_test_store();

        let first = store.add_relation("u1", "a1", LIKED_AUTHOR).await.unwrap();
        let second = store.add_relation("u1", "a1", LIKED_AUTHOR).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count_for_item("a1", LIKED_AUTHOR).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reads_may_repeat() {
        let (store, _temp) = create_test_store();

        store.add_relation("u1", "p1", RelationKind::Read).await.unwrap();
        store.add_relation("u1", "p1", RelationKind::Read).await.unwrap();

        let reads = store
            .list_relations_for_user("u1", RelationKind::Read)
            .await
            .unwrap();
        assert_eq!(reads.len(), 2);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (store, _temp) = create_test_store();
        let now = Utc::now();

        store
            .add_relation_at("u1", "p1", RelationKind::Read, now - Duration::days(2))
            .await
            .unwrap();
        store
            .add_relation_at("u1", "p2", RelationKind::Read, now)
            .await
            .unwrap();

        let reads = store
            .list_relations_for_user("u1", RelationKind::Read)
            .await
            .unwrap();
        let items: Vec<&str> = reads.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(items, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_id() {
        let (store, _temp) = create_test_store();
        let at = Utc::now();

        let first = store
            .add_relation_at("u1", "p1", RelationKind::Read, at)
            .await
            .unwrap();
        let second = store
            .add_relation_at("u1", "p2", RelationKind::Read, at)
            .await
            .unwrap();

        let reads = store
            .list_relations_for_user("u1", RelationKind::Read)
            .await
            .unwrap();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        let actual: Vec<String> = reads.into_iter().map(|r| r.id).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (store, _temp) = create_test_store();

        let err = store
            .add_relation("ghost", "a1", LIKED_AUTHOR)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("ghost")));

        let err = store
            .list_relations_for_user("ghost", RelationKind::Read)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (store, _temp) = create_test_store();

        let err = store
            .has_relation("u1", "missing", LIKED_AUTHOR)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(ref msg) if msg.contains("Author")));
    }

    #[tokio::test]
    async fn latest_per_item_collapses_repeats() {
        let (store, _temp) = create_test_store();
        let now = Utc::now();

        for (item, hours_ago) in [("p1", 3), ("p2", 2), ("p1", 1)] {
            store
                .add_relation_at("u1", item, RelationKind::Read, now - Duration::hours(hours_ago))
                .await
                .unwrap();
        }

        let latest = store
            .latest_per_item("u1", RelationKind::Read, 10)
            .await
            .unwrap();
        let items: Vec<&str> = latest.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(items, vec!["p1", "p2"]);
        assert_eq!(latest[0].created_at.timestamp(), (now - Duration::hours(1)).timestamp());

        let capped = store
            .latest_per_item("u1", RelationKind::Read, 1)
            .await
            .unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].item_id, "p1");
    }

    #[tokio::test]
    async fn counts_for_items_groups_by_item() {
        let (store, _temp) = create_test_store();
        let kind = RelationKind::Liked(SubjectKind::Poem);

        store.add_relation("u1", "p1", kind).await.unwrap();
        store.add_relation("u1", "p2", kind).await.unwrap();
        store.add_relation("u2", "p2", kind).await.unwrap();

        let ids = vec!["p1".to_string(), "p2".to_string(), "nothing".to_string()];
        let counts = store.counts_for_items(&ids, kind).await.unwrap();
        assert_eq!(counts.get("p1"), Some(&1));
        assert_eq!(counts.get("p2"), Some(&2));
        assert!(!counts.contains_key("nothing"));

        assert!(store.counts_for_items(&[], kind).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_racing_a_delete_is_not_found() {
        let (store, _temp) = create_test_store();
        let conn = store.pool.get().unwrap();

        // The item is gone by the time the insert runs
        let err = conn
            .execute(
                "INSERT INTO user_liked_authors (id, user_id, item_id, created_at)
                 VALUES ('r1', 'u1', 'deleted', '2025-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap_err();
        let mapped = missing_reference(&conn, LIKED_AUTHOR, "u1", "deleted", err);
        assert!(matches!(mapped, RepositoryError::NotFound(ref msg) if msg.contains("Author")));

        let err = conn
            .execute(
                "INSERT INTO user_read_poems (id, user_id, item_id, created_at)
                 VALUES ('r2', 'gone', 'p1', '2025-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap_err();
        let mapped = missing_reference(&conn, RelationKind::Read, "gone", "p1", err);
        assert!(matches!(mapped, RepositoryError::NotFound(ref msg) if msg.contains("User")));
    }

    #[tokio::test]
    async fn related_ids_collects_items() {
        let (store, _temp) = create_test_store();
        let kind = RelationKind::Liked(SubjectKind::Poem);

        store.add_relation("u1", "p1", kind).await.unwrap();
        store.add_relation("u1", "p2", kind).await.unwrap();
        store.add_relation("u2", "p2", kind).await.unwrap();

        let ids = store.related_ids("u1", kind).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("p1") && ids.contains("p2"));
        assert_eq!(store.count_for_item("p2", kind).await.unwrap(), 2);
    }
}
