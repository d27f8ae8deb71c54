// Repository pattern - content entities and curated home slots
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::models::{
    Author, Comment, CuratedSlot, Library, LibraryUpdate, NewAuthor, NewLibrary, NewPoem, Poem,
    PoemUpdate, User,
};
use crate::db::{self, RepositoryError};
use crate::engagement::domain::SubjectKind;
use crate::state::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

const AUTHOR_COLUMNS: &str = "a.id, a.name, a.image_url, a.biography, a.date_of_birth, \
     a.date_of_death, a.place_of_birth, a.place_of_residence, a.tags, a.created_at";

const POEM_SELECT: &str = "SELECT p.id, p.title, p.text, p.image_url, p.written_date, p.rating, \
     p.tags, p.created_at, a.id, a.name, a.image_url, a.biography, a.date_of_birth, \
     a.date_of_death, a.place_of_birth, a.place_of_residence, a.tags, a.created_at \
     FROM poems p LEFT JOIN authors a ON a.id = p.author_id";

const LIBRARY_COLUMNS: &str = "l.id, l.name, l.description, l.image_url, l.created_by, l.updated";

/// Entity lookup and storage for everything the engagement core reads.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn exists(&self, subject: SubjectKind, id: &str) -> Result<bool, RepositoryError>;

    // Users
    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError>;
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    async fn create_user(&self, username: &str) -> Result<User, RepositoryError>;
    async fn update_user(&self, id: &str, username: &str) -> Result<User, RepositoryError>;
    async fn delete_user(&self, id: &str) -> Result<bool, RepositoryError>;

    // Authors
    async fn find_author(&self, id: &str) -> Result<Option<Author>, RepositoryError>;
    async fn list_authors(&self) -> Result<Vec<Author>, RepositoryError>;
    async fn create_author(&self, author: NewAuthor) -> Result<Author, RepositoryError>;
    /// The author's poems, oldest first.
    async fn author_poems(&self, author_id: &str) -> Result<Vec<Poem>, RepositoryError>;

    // Poems
    async fn find_poem(&self, id: &str) -> Result<Option<Poem>, RepositoryError>;
    async fn list_poems(&self) -> Result<Vec<Poem>, RepositoryError>;
    async fn create_poem(&self, poem: NewPoem) -> Result<Poem, RepositoryError>;
    async fn update_poem(&self, id: &str, changes: PoemUpdate) -> Result<Poem, RepositoryError>;
    async fn delete_poem(&self, id: &str) -> Result<bool, RepositoryError>;
    /// Batch lookup; ids with no poem are absent from the map.
    async fn poems_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Poem>, RepositoryError>;

    // Libraries
    async fn find_library(&self, id: &str) -> Result<Option<Library>, RepositoryError>;
    async fn list_libraries(&self) -> Result<Vec<Library>, RepositoryError>;
    async fn create_library(&self, library: NewLibrary) -> Result<Library, RepositoryError>;
    /// Applies the given fields and bumps `updated`.
    async fn update_library(
        &self,
        id: &str,
        changes: LibraryUpdate,
    ) -> Result<Library, RepositoryError>;
    async fn delete_library(&self, id: &str) -> Result<bool, RepositoryError>;
    /// Append a poem; re-adding a member keeps its position.
    async fn add_poem_to_library(
        &self,
        library_id: &str,
        poem_id: &str,
    ) -> Result<(), RepositoryError>;
    /// Member poems in library order.
    async fn library_poems(&self, library_id: &str) -> Result<Vec<Poem>, RepositoryError>;

    // Comments
    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, RepositoryError>;
    async fn create_comment(
        &self,
        user_id: &str,
        poem_id: &str,
        text: &str,
    ) -> Result<Comment, RepositoryError>;
    async fn update_comment(&self, id: &str, text: &str) -> Result<Comment, RepositoryError>;
    async fn delete_comment(&self, id: &str) -> Result<bool, RepositoryError>;
    async fn comments_for_poem(&self, poem_id: &str) -> Result<Vec<Comment>, RepositoryError>;

    // Curated home slots
    async fn curated_poems(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<CuratedSlot<Poem>>, RepositoryError>;
    async fn curated_libraries(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<CuratedSlot<Library>>, RepositoryError>;
    async fn add_curated_poem(
        &self,
        date: NaiveDate,
        order: i64,
        poem_id: &str,
        quote: Option<String>,
    ) -> Result<CuratedSlot<Poem>, RepositoryError>;
    async fn add_featured_library(
        &self,
        date: NaiveDate,
        order: i64,
        library_id: &str,
    ) -> Result<CuratedSlot<Library>, RepositoryError>;
}

/// SQLite implementation
pub struct SqliteCatalogRepository {
    pool: DbPool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// --- Row helpers ---

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_tags(s: Option<String>) -> Vec<String> {
    s.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn author_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        image_url: row.get(offset + 2)?,
        biography: row.get(offset + 3)?,
        date_of_birth: parse_date(row.get(offset + 4)?),
        date_of_death: parse_date(row.get(offset + 5)?),
        place_of_birth: row.get(offset + 6)?,
        place_of_residence: row.get(offset + 7)?,
        tags: parse_tags(row.get(offset + 8)?),
        created_at: db::parse_timestamp(&row.get::<_, String>(offset + 9)?),
    })
}

/// Maps a `POEM_SELECT` row whose poem columns start at `offset`.
fn poem_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Poem> {
    let author = match row.get::<_, Option<String>>(offset + 8)? {
        Some(_) => Some(author_at(row, offset + 8)?),
        None => None,
    };

    Ok(Poem {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        text: row.get(offset + 2)?,
        image_url: row.get(offset + 3)?,
        written_date: parse_date(row.get(offset + 4)?),
        rating: row.get(offset + 5)?,
        tags: parse_tags(row.get(offset + 6)?),
        created_at: db::parse_timestamp(&row.get::<_, String>(offset + 7)?),
        author,
    })
}

fn poem_from_row(row: &Row<'_>) -> rusqlite::Result<Poem> {
    poem_at(row, 0)
}

fn library_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Library> {
    Ok(Library {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        image_url: row.get(offset + 3)?,
        created_by: row.get(offset + 4)?,
        updated: db::parse_timestamp(&row.get::<_, String>(offset + 5)?),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: db::parse_timestamp(&row.get::<_, String>(2)?),
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        user_id: row.get(2)?,
        poem_id: row.get(3)?,
        created_at: db::parse_timestamp(&row.get::<_, String>(4)?),
    })
}

fn query_poems<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Poem>, RepositoryError> {
    let mut stmt = conn.prepare(sql)?;
    let poems = stmt
        .query_map(params, poem_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(poems)
}

fn poem_by_id(conn: &Connection, id: &str) -> Result<Option<Poem>, RepositoryError> {
    let sql = format!("{} WHERE p.id = ?1", POEM_SELECT);
    Ok(conn.query_row(&sql, params![id], poem_from_row).optional()?)
}

fn library_by_id(conn: &Connection, id: &str) -> Result<Option<Library>, RepositoryError> {
    let sql = format!("SELECT {} FROM libraries l WHERE l.id = ?1", LIBRARY_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], |row| library_at(row, 0))
        .optional()?)
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> Result<bool, RepositoryError> {
    let sql = format!("SELECT COUNT(*) > 0 FROM {} WHERE id = ?1", table);
    Ok(conn.query_row(&sql, params![id], |row| row.get(0))?)
}

/// Maps a UNIQUE violation on insert to `Conflict`.
fn conflict_on_duplicate(err: rusqlite::Error, message: String) -> RepositoryError {
    if db::is_unique_violation(&err) {
        RepositoryError::Conflict(message)
    } else {
        err.into()
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn exists(&self, subject: SubjectKind, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        row_exists(&conn, subject.table(), id)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?)
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, username, created_at FROM users ORDER BY created_at, id")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    async fn create_user(&self, username: &str) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;
        let user = User {
            id: db::new_id(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.username, db::format_timestamp(&user.created_at)],
        )
        .map_err(|e| conflict_on_duplicate(e, format!("Username \"{}\" is taken", username)))?;
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn update_user(&self, id: &str, username: &str) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE users SET username = ?2 WHERE id = ?1",
                params![id, username],
            )
            .map_err(|e| conflict_on_duplicate(e, format!("Username \"{}\" is taken", username)))?;
        if rows == 0 {
            return Err(RepositoryError::not_found("User", id));
        }

        conn.query_row(
            "SELECT id, username, created_at FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("User", id))
    }

    async fn find_author(&self, id: &str) -> Result<Option<Author>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM authors a WHERE a.id = ?1", AUTHOR_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], |row| author_at(row, 0))
            .optional()?)
    }

    async fn list_authors(&self) -> Result<Vec<Author>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM authors a ORDER BY a.name, a.id",
            AUTHOR_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let authors = stmt
            .query_map([], |row| author_at(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    async fn create_author(&self, author: NewAuthor) -> Result<Author, RepositoryError> {
        let conn = self.pool.get()?;
        let created = Author {
            id: db::new_id(),
            name: author.name,
            image_url: author.image_url,
            biography: author.biography,
            date_of_birth: author.date_of_birth,
            date_of_death: author.date_of_death,
            place_of_birth: author.place_of_birth,
            place_of_residence: author.place_of_residence,
            tags: author.tags,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO authors (id, name, image_url, biography, date_of_birth, date_of_death,
                                  place_of_birth, place_of_residence, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                created.id,
                created.name,
                created.image_url,
                created.biography,
                format_date(created.date_of_birth),
                format_date(created.date_of_death),
                created.place_of_birth,
                created.place_of_residence,
                serde_json::to_string(&created.tags)?,
                db::format_timestamp(&created.created_at),
            ],
        )?;
        Ok(created)
    }

    async fn author_poems(&self, author_id: &str) -> Result<Vec<Poem>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} WHERE p.author_id = ?1 ORDER BY p.created_at, p.id",
            POEM_SELECT
        );
        query_poems(&conn, &sql, params![author_id])
    }

    async fn find_poem(&self, id: &str) -> Result<Option<Poem>, RepositoryError> {
        let conn = self.pool.get()?;
        poem_by_id(&conn, id)
    }

    async fn list_poems(&self) -> Result<Vec<Poem>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("{} ORDER BY p.created_at, p.id", POEM_SELECT);
        query_poems(&conn, &sql, [])
    }

    async fn create_poem(&self, poem: NewPoem) -> Result<Poem, RepositoryError> {
        let conn = self.pool.get()?;
        if let Some(ref author_id) = poem.author_id {
            if !row_exists(&conn, "authors", author_id)? {
                return Err(RepositoryError::not_found("Author", author_id));
            }
        }

        let id = db::new_id();
        conn.execute(
            "INSERT INTO poems (id, title, text, image_url, written_date, rating, tags,
                                author_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                poem.title,
                poem.text,
                poem.image_url,
                format_date(poem.written_date),
                poem.rating,
                serde_json::to_string(&poem.tags)?,
                poem.author_id,
                db::format_timestamp(&Utc::now()),
            ],
        )?;

        poem_by_id(&conn, &id)?.ok_or_else(|| RepositoryError::not_found("Poem", &id))
    }

    async fn update_poem(&self, id: &str, changes: PoemUpdate) -> Result<Poem, RepositoryError> {
        let conn = self.pool.get()?;
        let current = poem_by_id(&conn, id)?.ok_or_else(|| RepositoryError::not_found("Poem", id))?;

        if let Some(ref author_id) = changes.author_id {
            if !row_exists(&conn, "authors", author_id)? {
                return Err(RepositoryError::not_found("Author", author_id));
            }
        }

        let author_id = changes
            .author_id
            .or_else(|| current.author.map(|author| author.id));
        conn.execute(
            "UPDATE poems SET title = ?2, text = ?3, image_url = ?4, written_date = ?5,
                              rating = ?6, tags = ?7, author_id = ?8
             WHERE id = ?1",
            params![
                id,
                changes.title.unwrap_or(current.title),
                changes.text.or(current.text),
                changes.image_url.or(current.image_url),
                format_date(changes.written_date.or(current.written_date)),
                changes.rating.or(current.rating),
                serde_json::to_string(&changes.tags.unwrap_or(current.tags))?,
                author_id,
            ],
        )?;

        poem_by_id(&conn, id)?.ok_or_else(|| RepositoryError::not_found("Poem", id))
    }

    async fn delete_poem(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM poems WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn poems_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Poem>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.pool.get()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{} WHERE p.id IN ({})", POEM_SELECT, placeholders);
        let poems = query_poems(&conn, &sql, params_from_iter(ids.iter()))?;

        Ok(poems.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    async fn find_library(&self, id: &str) -> Result<Option<Library>, RepositoryError> {
        let conn = self.pool.get()?;
        library_by_id(&conn, id)
    }

    async fn list_libraries(&self) -> Result<Vec<Library>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM libraries l ORDER BY l.name, l.id",
            LIBRARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let libraries = stmt
            .query_map([], |row| library_at(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(libraries)
    }

    async fn create_library(&self, library: NewLibrary) -> Result<Library, RepositoryError> {
        let conn = self.pool.get()?;
        if let Some(ref owner) = library.created_by {
            if !row_exists(&conn, "users", owner)? {
                return Err(RepositoryError::not_found("User", owner));
            }
        }

        let created = Library {
            id: db::new_id(),
            name: library.name,
            description: library.description,
            image_url: library.image_url,
            created_by: library.created_by,
            updated: Utc::now(),
        };
        conn.execute(
            "INSERT INTO libraries (id, name, description, image_url, created_by, updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                created.id,
                created.name,
                created.description,
                created.image_url,
                created.created_by,
                db::format_timestamp(&created.updated),
            ],
        )?;
        Ok(created)
    }

    async fn update_library(
        &self,
        id: &str,
        changes: LibraryUpdate,
    ) -> Result<Library, RepositoryError> {
        let conn = self.pool.get()?;
        let current =
            library_by_id(&conn, id)?.ok_or_else(|| RepositoryError::not_found("Library", id))?;

        let updated = Library {
            name: changes.name.unwrap_or(current.name),
            description: changes.description.or(current.description),
            image_url: changes.image_url.or(current.image_url),
            updated: Utc::now(),
            ..current
        };
        conn.execute(
            "UPDATE libraries SET name = ?2, description = ?3, image_url = ?4, updated = ?5
             WHERE id = ?1",
            params![
                id,
                updated.name,
                updated.description,
                updated.image_url,
                db::format_timestamp(&updated.updated),
            ],
        )?;
        Ok(updated)
    }

    async fn delete_library(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM libraries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn add_poem_to_library(
        &self,
        library_id: &str,
        poem_id: &str,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        if !row_exists(&conn, "libraries", library_id)? {
            return Err(RepositoryError::not_found("Library", library_id));
        }
        if !row_exists(&conn, "poems", poem_id)? {
            return Err(RepositoryError::not_found("Poem", poem_id));
        }

        conn.execute(
            "INSERT INTO library_poems (library_id, poem_id, position)
             SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1 FROM library_poems WHERE library_id = ?1
             ON CONFLICT(library_id, poem_id) DO NOTHING",
            params![library_id, poem_id],
        )?;
        conn.execute(
            "UPDATE libraries SET updated = ?2 WHERE id = ?1",
            params![library_id, db::format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    async fn library_poems(&self, library_id: &str) -> Result<Vec<Poem>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} JOIN library_poems lp ON lp.poem_id = p.id
             WHERE lp.library_id = ?1
             ORDER BY lp.position",
            POEM_SELECT
        );
        query_poems(&conn, &sql, params![library_id])
    }

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        Ok(conn
            .query_row(
                "SELECT id, text, user_id, poem_id, created_at FROM comments WHERE id = ?1",
                params![id],
                comment_from_row,
            )
            .optional()?)
    }

    async fn create_comment(
        &self,
        user_id: &str,
        poem_id: &str,
        text: &str,
    ) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;
        if !row_exists(&conn, "users", user_id)? {
            return Err(RepositoryError::not_found("User", user_id));
        }
        if !row_exists(&conn, "poems", poem_id)? {
            return Err(RepositoryError::not_found("Poem", poem_id));
        }

        let comment = Comment {
            id: db::new_id(),
            text: text.to_string(),
            user_id: user_id.to_string(),
            poem_id: poem_id.to_string(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO comments (id, text, user_id, poem_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment.id,
                comment.text,
                comment.user_id,
                comment.poem_id,
                db::format_timestamp(&comment.created_at),
            ],
        )?;
        Ok(comment)
    }

    async fn update_comment(&self, id: &str, text: &str) -> Result<Comment, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE comments SET text = ?2 WHERE id = ?1",
            params![id, text],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Comment", id));
        }

        conn.query_row(
            "SELECT id, text, user_id, poem_id, created_at FROM comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("Comment", id))
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    async fn comments_for_poem(&self, poem_id: &str) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;
        if !row_exists(&conn, "poems", poem_id)? {
            return Err(RepositoryError::not_found("Poem", poem_id));
        }

        let mut stmt = conn.prepare(
            "SELECT id, text, user_id, poem_id, created_at FROM comments
             WHERE poem_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let comments = stmt
            .query_map(params![poem_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn curated_poems(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<CuratedSlot<Poem>>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "{} JOIN home_poems hp ON hp.poem_id = p.id
             WHERE hp.view_date = ?1
             ORDER BY hp.slot_order ASC",
            POEM_SELECT.replacen("SELECT ", "SELECT hp.slot_order, hp.quote, ", 1)
        );
        let mut stmt = conn.prepare(&sql)?;
        let slots = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                let order: i64 = row.get(0)?;
                let quote: Option<String> = row.get(1)?;
                let poem = poem_at(row, 2)?;
                Ok(CuratedSlot {
                    view_date: date,
                    order,
                    content: poem,
                    annotation: quote,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    async fn curated_libraries(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<CuratedSlot<Library>>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT hl.slot_order, {} FROM home_featured_libraries hl
             JOIN libraries l ON l.id = hl.library_id
             WHERE hl.view_date = ?1
             ORDER BY hl.slot_order ASC",
            LIBRARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let slots = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
                Ok(CuratedSlot {
                    view_date: date,
                    order: row.get(0)?,
                    content: library_at(row, 1)?,
                    annotation: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    async fn add_curated_poem(
        &self,
        date: NaiveDate,
        order: i64,
        poem_id: &str,
        quote: Option<String>,
    ) -> Result<CuratedSlot<Poem>, RepositoryError> {
        let conn = self.pool.get()?;
        let poem = poem_by_id(&conn, poem_id)?
            .ok_or_else(|| RepositoryError::not_found("Poem", poem_id))?;

        conn.execute(
            "INSERT INTO home_poems (id, view_date, slot_order, poem_id, quote)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                db::new_id(),
                date.format(DATE_FORMAT).to_string(),
                order,
                poem_id,
                quote
            ],
        )
        .map_err(|e| {
            conflict_on_duplicate(e, format!("Home poem slot {} already set for {}", order, date))
        })?;

        Ok(CuratedSlot {
            view_date: date,
            order,
            content: poem,
            annotation: quote,
        })
    }

    async fn add_featured_library(
        &self,
        date: NaiveDate,
        order: i64,
        library_id: &str,
    ) -> Result<CuratedSlot<Library>, RepositoryError> {
        let conn = self.pool.get()?;
        let library = library_by_id(&conn, library_id)?
            .ok_or_else(|| RepositoryError::not_found("Library", library_id))?;

        conn.execute(
            "INSERT INTO home_featured_libraries (id, view_date, slot_order, library_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                db::new_id(),
                date.format(DATE_FORMAT).to_string(),
                order,
                library_id
            ],
        )
        .map_err(|e| {
            conflict_on_duplicate(
                e,
                format!("Featured library slot {} already set for {}", order, date),
            )
        })?;

        Ok(CuratedSlot {
            view_date: date,
            order,
            content: library,
            annotation: None,
        })
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynCatalogRepository = Arc<dyn CatalogRepository>;
