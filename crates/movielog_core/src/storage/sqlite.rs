//! Relational backend over SQLite with declared foreign keys.
//!
//! # Responsibility
//! - Implement the storage contract on the migrated catalog schema.
//! - Own the review extension that only this backend supports.
//!
//! # Invariants
//! - Cascade delete is declarative: removing a user removes its movies and
//!   reviews, removing a movie removes its reviews.
//! - Username/email uniqueness is enforced by the engine; the username is
//!   additionally pre-checked to surface `DuplicateUsername` instead of a
//!   raw constraint violation.
//! - Ownership and movie id are checked jointly; a foreign user's movie is
//!   indistinguishable from an absent one.

use crate::auth;
use crate::db::{open_db, open_db_in_memory};
use crate::model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
use crate::model::review::Review;
use crate::model::user::{User, UserDraft, UserId, UserUpdate};
use crate::storage::{
    AddMovieOutcome, CatalogStorage, StorageError, StorageResult, UserSelector,
};
use log::info;
use rusqlite::{params, Connection, Row};
use std::path::Path;

const USER_SELECT_SQL: &str = "SELECT id, name, username, email, password_hash FROM users";
const MOVIE_SELECT_SQL: &str = "SELECT id, title, year, rating, poster, owner_id FROM movies";
const REVIEW_SELECT_SQL: &str = "SELECT id, user_id, movie_id, text FROM reviews";

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// Handle on one catalog database connection.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens a database file; migrations run before the handle is usable.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens an in-memory database, mainly for tests and tooling.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    fn get_user_by_id(&self, user_id: UserId) -> StorageResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn authenticate(&self, user_id: UserId, password: &str) -> StorageResult<User> {
        let user = self
            .get_user_by_id(user_id)?
            .ok_or(StorageError::UserNotFound(user_id))?;
        if !auth::verify_password(&user.password_hash, password) {
            return Err(StorageError::InvalidCredential);
        }
        Ok(user)
    }

    fn username_taken(&self, username: &str, excluding: Option<UserId>) -> StorageResult<bool> {
        let count: i64 = match excluding {
            Some(user_id) => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1 AND id <> ?2;",
                params![username, user_id],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1;",
                params![username],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    fn try_add_movie(&self, user_id: UserId, draft: &MovieDraft) -> StorageResult<Movie> {
        if self.get_user_by_id(user_id)?.is_none() {
            return Err(StorageError::UserNotFound(user_id));
        }

        self.conn.execute(
            "INSERT INTO movies (title, year, rating, poster, owner_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                draft.title,
                draft.year,
                draft.rating,
                draft.poster,
                user_id
            ],
        )?;
        let movie_id = self.conn.last_insert_rowid();
        Ok(draft.clone().into_movie(movie_id, user_id))
    }

    /// Stores a review for a movie in the given user's list.
    ///
    /// Reviews exist only in this backend; the shared contract deliberately
    /// knows nothing about them.
    pub fn add_review(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        text: &str,
    ) -> StorageResult<Review> {
        let movie = self
            .get_movie(user_id, movie_id)?
            .ok_or(StorageError::MovieNotFound(movie_id))?;

        self.conn.execute(
            "INSERT INTO reviews (user_id, movie_id, text) VALUES (?1, ?2, ?3);",
            params![user_id, movie.id, text],
        )?;
        Ok(Review {
            id: self.conn.last_insert_rowid(),
            user_id,
            movie_id: movie.id,
            text: text.to_string(),
        })
    }

    /// Returns every stored review, ordered by id.
    pub fn list_reviews(&self) -> StorageResult<Vec<Review>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT_SQL} ORDER BY id;"))?;
        let mut rows = stmt.query([])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_review_row(row)?);
        }
        Ok(reviews)
    }

    /// Returns the reviews attached to one movie, ordered by id.
    pub fn movie_reviews(&self, movie_id: MovieId) -> StorageResult<Vec<Review>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REVIEW_SELECT_SQL} WHERE movie_id = ?1 ORDER BY id;"))?;
        let mut rows = stmt.query(params![movie_id])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_review_row(row)?);
        }
        Ok(reviews)
    }
}

impl CatalogStorage for SqliteStorage {
    fn list_users(&self) -> StorageResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY name, id;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>> {
        match selector {
            UserSelector::Id(user_id) => self.get_user_by_id(*user_id),
            UserSelector::Username(username) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
                let mut rows = stmt.query(params![username])?;
                if let Some(row) = rows.next()? {
                    return Ok(Some(parse_user_row(row)?));
                }
                Ok(None)
            }
        }
    }

    fn check_password(&self, user_id: UserId, password: &str) -> StorageResult<bool> {
        Ok(self
            .get_user_by_id(user_id)?
            .map(|user| auth::verify_password(&user.password_hash, password))
            .unwrap_or(false))
    }

    fn create_user(&self, draft: &UserDraft) -> StorageResult<User> {
        draft.validate()?;
        if self.username_taken(&draft.username, None)? {
            return Err(StorageError::DuplicateUsername(draft.username.clone()));
        }

        let password_hash = auth::hash_password(&draft.password)?;
        self.conn.execute(
            "INSERT INTO users (name, username, email, password_hash)
             VALUES (?1, ?2, ?3, ?4);",
            params![draft.name, draft.username, draft.email, password_hash],
        )?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            name: draft.name.clone(),
            username: draft.username.clone(),
            email: draft.email.clone(),
            password_hash,
        })
    }

    fn update_user(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()> {
        self.authenticate(user_id, current_password)?;
        if self.username_taken(&update.username, Some(user_id))? {
            return Err(StorageError::DuplicateUsername(update.username.clone()));
        }

        self.conn.execute(
            "UPDATE users SET name = ?1, username = ?2, email = ?3 WHERE id = ?4;",
            params![update.name, update.username, update.email, user_id],
        )?;
        Ok(())
    }

    fn delete_user(&self, user_id: UserId, current_password: &str) -> StorageResult<()> {
        self.authenticate(user_id, current_password)?;

        // Movies and reviews go with the user via ON DELETE CASCADE.
        self.conn
            .execute("DELETE FROM users WHERE id = ?1;", params![user_id])?;
        info!(
            "event=user_delete module=storage_sqlite status=ok user_id={}",
            user_id
        );
        Ok(())
    }

    fn list_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>> {
        if self.get_user_by_id(user_id)?.is_none() {
            return Err(StorageError::UserNotFound(user_id));
        }

        let mut stmt = self
            .conn
            .prepare(&format!("{MOVIE_SELECT_SQL} WHERE owner_id = ?1 ORDER BY id;"))?;
        let mut rows = stmt.query(params![user_id])?;
        let mut movies = Vec::new();
        while let Some(row) = rows.next()? {
            movies.push(parse_movie_row(row)?);
        }
        Ok(movies)
    }

    fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome {
        match self.try_add_movie(user_id, draft) {
            Ok(movie) => AddMovieOutcome::accepted(movie),
            Err(err) => AddMovieOutcome::rejected(err.to_string()),
        }
    }

    fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MOVIE_SELECT_SQL} WHERE id = ?1 AND owner_id = ?2;"))?;
        let mut rows = stmt.query(params![movie_id, user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_movie_row(row)?));
        }
        Ok(None)
    }

    fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE movies SET title = ?1, year = ?2, rating = ?3
             WHERE id = ?4 AND owner_id = ?5;",
            params![update.title, update.year, update.rating, movie_id, user_id],
        )?;

        if changed == 0 {
            return Err(StorageError::MovieNotFound(movie_id));
        }
        Ok(())
    }

    fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String> {
        let movie = self
            .get_movie(user_id, movie_id)?
            .ok_or(StorageError::MovieNotFound(movie_id))?;

        self.conn.execute(
            "DELETE FROM movies WHERE id = ?1 AND owner_id = ?2;",
            params![movie_id, user_id],
        )?;
        Ok(format!("{} deleted", movie.title))
    }
}

fn parse_user_row(row: &Row<'_>) -> StorageResult<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
    })
}

fn parse_movie_row(row: &Row<'_>) -> StorageResult<Movie> {
    Ok(Movie {
        id: row.get("id")?,
        title: row.get("title")?,
        year: row.get::<_, Option<String>>("year")?.unwrap_or_default(),
        rating: row.get("rating")?,
        poster: row.get("poster")?,
        owner_id: row.get("owner_id")?,
    })
}

fn parse_review_row(row: &Row<'_>) -> StorageResult<Review> {
    Ok(Review {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        movie_id: row.get("movie_id")?,
        text: row.get("text")?,
    })
}
