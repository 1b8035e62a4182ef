//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide stable account/movie entry points for core callers.
//! - Delegate persistence to whichever backend the caller selected.
//!
//! # Invariants
//! - Service APIs never bypass contract validation or uniqueness checks.
//! - The service layer stays storage-agnostic; it holds one handle and
//!   never inspects which backend is behind it.

use crate::model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
use crate::model::user::{User, UserDraft, UserId, UserUpdate};
use crate::storage::{
    open_storage, AddMovieOutcome, CatalogStorage, StorageResult, UserSelector,
};
use std::path::Path;

/// Use-case service over one selected storage backend.
pub struct CatalogService<S: CatalogStorage> {
    storage: S,
}

impl CatalogService<Box<dyn CatalogStorage>> {
    /// Resolves the backend from a configuration string and wraps it.
    ///
    /// Unknown selectors fail here, before any handler runs.
    pub fn from_config(kind_text: &str, data_dir: &Path) -> StorageResult<Self> {
        Ok(Self::new(open_storage(kind_text, data_dir)?))
    }
}

impl<S: CatalogStorage> CatalogService<S> {
    /// Creates a service using the provided backend handle.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Registers a new account.
    pub fn register(&self, draft: &UserDraft) -> StorageResult<User> {
        self.storage.create_user(draft)
    }

    /// Authenticates a username/password pair.
    ///
    /// Returns `Ok(None)` for an unknown username and for a wrong password;
    /// callers cannot tell the two apart.
    pub fn sign_in(&self, username: &str, password: &str) -> StorageResult<Option<User>> {
        let user = self
            .storage
            .find_user(&UserSelector::Username(username.to_string()))?;
        match user {
            Some(user) if self.storage.check_password(user.id, password)? => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    /// Lists all registered users.
    pub fn list_users(&self) -> StorageResult<Vec<User>> {
        self.storage.list_users()
    }

    /// Finds one user by id or username.
    pub fn find_user(&self, selector: &UserSelector) -> StorageResult<Option<User>> {
        self.storage.find_user(selector)
    }

    /// Updates profile fields after re-authentication.
    pub fn update_profile(
        &self,
        user_id: UserId,
        update: &UserUpdate,
        current_password: &str,
    ) -> StorageResult<()> {
        self.storage.update_user(user_id, update, current_password)
    }

    /// Deletes an account after re-authentication; owned movies go too.
    pub fn delete_account(&self, user_id: UserId, current_password: &str) -> StorageResult<()> {
        self.storage.delete_user(user_id, current_password)
    }

    /// Lists one user's movies.
    pub fn user_movies(&self, user_id: UserId) -> StorageResult<Vec<Movie>> {
        self.storage.list_movies(user_id)
    }

    /// Adds a movie to a user's list; rejection is an ordinary outcome,
    /// never an error.
    pub fn add_movie(&self, user_id: UserId, draft: &MovieDraft) -> AddMovieOutcome {
        self.storage.add_movie(user_id, draft)
    }

    /// Gets one movie from a user's list.
    pub fn get_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<Option<Movie>> {
        self.storage.get_movie(user_id, movie_id)
    }

    /// Updates one movie in a user's list.
    pub fn update_movie(
        &self,
        user_id: UserId,
        movie_id: MovieId,
        update: &MovieUpdate,
    ) -> StorageResult<()> {
        self.storage.update_movie(user_id, movie_id, update)
    }

    /// Removes one movie from a user's list.
    pub fn delete_movie(&self, user_id: UserId, movie_id: MovieId) -> StorageResult<String> {
        self.storage.delete_movie(user_id, movie_id)
    }
}
