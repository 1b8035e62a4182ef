//! Storage contract and backend selection.
//!
//! # Responsibility
//! - Define the operation set every catalog backend implements.
//! - Map configuration strings to concrete backends behind one trait object.
//! - Own the storage error taxonomy shared by all backends.
//!
//! # Invariants
//! - Uniqueness and credential checks happen before any write is issued.
//! - `add_movie` never returns `Err`; every other operation does.
//! - Unknown backend selectors fail at this boundary, not inside a handler.

use crate::model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate, UserValidationError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

mod csv;
mod json;
mod sqlite;

pub use csv::CsvStorage;
pub use json::JsonStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Error taxonomy shared by every backend.
#[derive(Debug)]
pub enum StorageError {
    UserNotFound(UserId),
    MovieNotFound(MovieId),
    DuplicateUsername(String),
    InvalidCredential,
    Validation(UserValidationError),
    /// Underlying medium unreadable, unwritable, or corrupt. Not retried;
    /// a malformed file is not self-healing.
    Persistence(String),
    /// Unknown backend selector at the configuration boundary.
    Configuration(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::MovieNotFound(id) => write!(f, "movie not found: {id}"),
            Self::DuplicateUsername(username) => {
                write!(f, "username `{username}` already exists")
            }
            Self::InvalidCredential => write!(f, "invalid password"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Persistence(message) => write!(f, "storage medium failure: {message}"),
            Self::Configuration(message) => write!(f, "storage configuration error: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for StorageError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<crate::auth::CredentialError> for StorageError {
    fn from(value: crate::auth::CredentialError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<crate::db::DbError> for StorageError {
    fn from(value: crate::db::DbError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

/// Lookup key for `find_user`: by id or by unique username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSelector {
    Id(UserId),
    Username(String),
}

/// Outcome of `add_movie`.
///
/// The operation reports failure as a normal branch instead of an error:
/// its caller treats a rejected add as ordinary control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct AddMovieOutcome {
    pub accepted: bool,
    pub message: String,
    /// The stored record with its assigned id, present only on success.
    pub movie: Option<Movie>,
}

impl AddMovieOutcome {
    pub(crate) fn accepted(movie: Movie) -> Self {
        Self {
            accepted: true,
            message: format!("{} added", movie.title),
            movie: Some(movie),
        }
    }

    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
            movie: None,
        }
    }
}

/// The operation set every catalog backend implements.
///
/// Backends are stateless handles: each call re-reads durable state,
/// computes, and writes synchronously. That guarantees callers see the
/// latest committed state but gives no isolation; the contract is only
/// valid under a single-writer-at-a-time execution model.
pub trait CatalogStorage: std::fmt::Debug {
    /// Returns all users known to this backend.
    fn list_users(&self) -> StorageResult<Vec<User>>;

    /// Finds one user by id or unique username.
    fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>>;

    /// Checks a plaintext password against the stored hash.
    ///
    /// Returns `Ok(false)` when the user does not exist.
    fn check_password(&self, user_id: UserId, password: &str) -> StorageResult<bool>;

    /// Registers a new user: validates, rejects duplicate usernames,
    /// assigns the next id, hashes the password, persists.
    fn create_user(&self, draft: &UserDraft) -> StorageResult<User>;

    /// Updates profile fields after re-authenticating with the current
    /// plaintext password.
    fn update_user(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()>;

    /// Deletes a user after re-authenticating; owned movies never survive.
    fn delete_user(&self, user_id: UserId, current_password: &str) -> StorageResult<()>;

    /// Returns all movies owned by the given user.
    fn list_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>>;

    /// Adds a movie to a user's list. Never fails with `Err`; rejection is
    /// reported through the outcome.
    fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome;

    /// Gets one movie by id within the given user's list.
    ///
    /// `Ok(None)` covers both an unknown id and an id owned by another
    /// user, so existence is not leaked across owners.
    fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>>;

    /// Updates title/year/rating of one owned movie.
    fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()>;

    /// Removes one owned movie and returns a confirmation message
    /// containing its title.
    fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String>;
}

impl CatalogStorage for Box<dyn CatalogStorage> {
    fn list_users(&self) -> StorageResult<Vec<User>> {
        (**self).list_users()
    }

    fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>> {
        (**self).find_user(selector)
    }

    fn check_password(&self, user_id: UserId, password: &str) -> StorageResult<bool> {
        (**self).check_password(user_id, password)
    }

    fn create_user(&self, draft: &UserDraft) -> StorageResult<User> {
        (**self).create_user(draft)
    }

    fn update_user(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()> {
        (**self).update_user(user_id, update, current_password)
    }

    fn delete_user(&self, user_id: UserId, current_password: &str) -> StorageResult<()> {
        (**self).delete_user(user_id, current_password)
    }

    fn list_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>> {
        (**self).list_movies(user_id)
    }

    fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome {
        (**self).add_movie(user_id, draft)
    }

    fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>> {
        (**self).get_movie(user_id, movie_id)
    }

    fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()> {
        (**self).update_movie(user_id, movie_id, update)
    }

    fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String> {
        (**self).delete_movie(user_id, movie_id)
    }
}

/// Supported backend selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Json,
    Csv,
    Sqlite,
}

impl StorageKind {
    /// Parses a configuration string; unknown values fail fast.
    pub fn parse(kind_text: &str) -> StorageResult<Self> {
        match kind_text.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(StorageError::Configuration(format!(
                "unknown storage kind `{other}`; expected json|csv|sqlite"
            ))),
        }
    }

    /// Canonical selector string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Sqlite => "sqlite",
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens the backend selected by a configuration string.
///
/// Creates `data_dir` when missing, then resolves fixed file names inside
/// it: `catalog.json`, `users.csv` + `movies.csv`, or `catalog.db`.
pub fn open_storage(kind_text: &str, data_dir: &Path) -> StorageResult<Box<dyn CatalogStorage>> {
    let kind = StorageKind::parse(kind_text)?;
    std::fs::create_dir_all(data_dir)?;

    let storage: Box<dyn CatalogStorage> = match kind {
        StorageKind::Json => Box::new(JsonStorage::open(data_dir.join("catalog.json"))?),
        StorageKind::Csv => Box::new(CsvStorage::open(
            data_dir.join("users.csv"),
            data_dir.join("movies.csv"),
        )?),
        StorageKind::Sqlite => Box::new(SqliteStorage::open(data_dir.join("catalog.db"))?),
    };

    info!(
        "event=storage_open module=storage status=ok kind={} data_dir={}",
        kind,
        data_dir.display()
    );
    Ok(storage)
}
