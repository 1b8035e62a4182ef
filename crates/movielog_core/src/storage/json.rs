//! Document store backend: one JSON file, users nested with their movies.
//!
//! # Responsibility
//! - Persist the whole catalog as a single hierarchical document.
//! - Keep the on-disk shape `{version, users: {<id>: {.., movies: [..]}}}`
//!   stable for in-place reuse of existing data files.
//!
//! # Invariants
//! - Every operation is read-whole-file, mutate in memory, write-whole-file.
//! - Movies live inside their owner's record; deleting a user cannot leave
//!   an orphaned movie behind.
//! - A malformed document surfaces `Persistence` immediately; it is never
//!   rewritten or repaired.

use crate::auth;
use crate::model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};
use crate::storage::{
    AddMovieOutcome, CatalogStorage, StorageError, StorageResult, UserSelector,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const DOCUMENT_VERSION: u32 = 1;

/// Handle on one catalog document file.
#[derive(Debug)]
pub struct JsonStorage {
    path: PathBuf,
}

/// On-disk document shape. Map keys are decimal string ids, mirroring the
/// record's own `id` field.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    version: u32,
    users: BTreeMap<String, UserEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserEntry {
    id: UserId,
    name: String,
    username: String,
    email: Option<String>,
    password_hash: String,
    movies: Vec<Movie>,
}

impl UserEntry {
    fn to_user(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            password_hash: self.password_hash.clone(),
        }
    }
}

impl JsonStorage {
    /// Opens a document file, seeding an empty catalog when none exists.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let storage = Self { path: path.into() };
        if !storage.path.exists() {
            storage.write_document(&CatalogDocument {
                version: DOCUMENT_VERSION,
                users: BTreeMap::new(),
            })?;
        }
        Ok(storage)
    }

    fn read_document(&self) -> StorageResult<CatalogDocument> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            StorageError::Persistence(format!(
                "cannot read catalog document `{}`: {err}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            StorageError::Persistence(format!(
                "malformed catalog document `{}`: {err}",
                self.path.display()
            ))
        })
    }

    fn write_document(&self, document: &CatalogDocument) -> StorageResult<()> {
        let raw = serde_json::to_string_pretty(document).map_err(|err| {
            StorageError::Persistence(format!("cannot serialize catalog document: {err}"))
        })?;
        std::fs::write(&self.path, raw).map_err(|err| {
            StorageError::Persistence(format!(
                "cannot write catalog document `{}`: {err}",
                self.path.display()
            ))
        })?;
        Ok(())
    }

    fn next_user_id(document: &CatalogDocument) -> UserId {
        document.users.values().map(|entry| entry.id).max().unwrap_or(0) + 1
    }

    /// Movie ids are scoped to one user's list in this backend.
    fn next_movie_id(entry: &UserEntry) -> MovieId {
        entry.movies.iter().map(|movie| movie.id).max().unwrap_or(0) + 1
    }

    fn authenticate(entry: &UserEntry, password: &str) -> StorageResult<()> {
        if !auth::verify_password(&entry.password_hash, password) {
            return Err(StorageError::InvalidCredential);
        }
        Ok(())
    }

    fn try_add_movie(&self, user_id: UserId, draft: &MovieDraft) -> StorageResult<Movie> {
        let mut document = self.read_document()?;
        let entry = document
            .users
            .get_mut(&user_id.to_string())
            .ok_or(StorageError::UserNotFound(user_id))?;

        let movie = draft.clone().into_movie(Self::next_movie_id(entry), user_id);
        entry.movies.push(movie.clone());
        self.write_document(&document)?;
        Ok(movie)
    }
}

impl CatalogStorage for JsonStorage {
    fn list_users(&self) -> StorageResult<Vec<User>> {
        let document = self.read_document()?;
        Ok(document.users.values().map(UserEntry::to_user).collect())
    }

    fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>> {
        let document = self.read_document()?;
        let entry = match selector {
            UserSelector::Id(user_id) => document.users.get(&user_id.to_string()),
            // Username lookups scan the whole map; the document layout has
            // no secondary index.
            UserSelector::Username(username) => document
                .users
                .values()
                .find(|entry| entry.username == *username),
        };
        Ok(entry.map(UserEntry::to_user))
    }

    fn check_password(&self, user_id: UserId, password: &str) -> StorageResult<bool> {
        let document = self.read_document()?;
        Ok(document
            .users
            .get(&user_id.to_string())
            .map(|entry| auth::verify_password(&entry.password_hash, password))
            .unwrap_or(false))
    }

    fn create_user(&self, draft: &UserDraft) -> StorageResult<User> {
        draft.validate()?;
        let mut document = self.read_document()?;

        if document
            .users
            .values()
            .any(|entry| entry.username == draft.username)
        {
            return Err(StorageError::DuplicateUsername(draft.username.clone()));
        }

        let entry = UserEntry {
            id: Self::next_user_id(&document),
            name: draft.name.clone(),
            username: draft.username.clone(),
            email: draft.email.clone(),
            password_hash: auth::hash_password(&draft.password)?,
            movies: Vec::new(),
        };
        let user = entry.to_user();
        document.users.insert(entry.id.to_string(), entry);
        self.write_document(&document)?;
        Ok(user)
    }

    fn update_user(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()> {
        let mut document = self.read_document()?;
        let key = user_id.to_string();
        {
            let entry = document
                .users
                .get(&key)
                .ok_or(StorageError::UserNotFound(user_id))?;
            Self::authenticate(entry, current_password)?;
        }

        if document
            .users
            .values()
            .any(|other| other.id != user_id && other.username == update.username)
        {
            return Err(StorageError::DuplicateUsername(update.username.clone()));
        }

        let entry = document
            .users
            .get_mut(&key)
            .ok_or(StorageError::UserNotFound(user_id))?;
        entry.name = update.name.clone();
        entry.username = update.username.clone();
        entry.email = update.email.clone();
        self.write_document(&document)
    }

    fn delete_user(&self, user_id: UserId, current_password: &str) -> StorageResult<()> {
        let mut document = self.read_document()?;
        let key = user_id.to_string();
        {
            let entry = document
                .users
                .get(&key)
                .ok_or(StorageError::UserNotFound(user_id))?;
            Self::authenticate(entry, current_password)?;
        }

        let removed = document
            .users
            .remove(&key)
            .ok_or(StorageError::UserNotFound(user_id))?;
        self.write_document(&document)?;
        info!(
            "event=user_delete module=storage_json status=ok user_id={} movies_dropped={}",
            user_id,
            removed.movies.len()
        );
        Ok(())
    }

    fn list_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>> {
        let document = self.read_document()?;
        let entry = document
            .users
            .get(&user_id.to_string())
            .ok_or(StorageError::UserNotFound(user_id))?;
        Ok(entry.movies.clone())
    }

    fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome {
        match self.try_add_movie(user_id, draft) {
            Ok(movie) => AddMovieOutcome::accepted(movie),
            Err(err) => AddMovieOutcome::rejected(err.to_string()),
        }
    }

    fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>> {
        let document = self.read_document()?;
        Ok(document
            .users
            .get(&user_id.to_string())
            .and_then(|entry| entry.movies.iter().find(|movie| movie.id == movie_id))
            .cloned())
    }

    fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()> {
        let mut document = self.read_document()?;
        let movie = document
            .users
            .get_mut(&user_id.to_string())
            .and_then(|entry| entry.movies.iter_mut().find(|movie| movie.id == movie_id))
            .ok_or(StorageError::MovieNotFound(movie_id))?;

        movie.title = update.title.clone();
        movie.year = update.year.clone();
        movie.rating = update.rating;
        self.write_document(&document)
    }

    fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String> {
        let mut document = self.read_document()?;
        let entry = document
            .users
            .get_mut(&user_id.to_string())
            .ok_or(StorageError::MovieNotFound(movie_id))?;
        let index = entry
            .movies
            .iter()
            .position(|movie| movie.id == movie_id)
            .ok_or(StorageError::MovieNotFound(movie_id))?;

        let removed = entry.movies.remove(index);
        self.write_document(&document)?;
        Ok(format!("{} deleted", removed.title))
    }
}
