//! Storage core for the movielog catalog.
//! One contract, three physically incompatible backends, same invariants.

pub mod auth;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::movie::{Movie, MovieDraft, MovieId, MovieUpdate};
pub use model::review::Review;
pub use model::user::{User, UserDraft, UserId, UserUpdate, UserValidationError};
pub use service::catalog_service::CatalogService;
pub use storage::{
    open_storage, AddMovieOutcome, CatalogStorage, CsvStorage, JsonStorage, SqliteStorage,
    StorageError, StorageKind, StorageResult, UserSelector,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
