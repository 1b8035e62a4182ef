//! Movie domain model and its input shapes.
//!
//! # Responsibility
//! - Define the canonical movie record shared by every backend.
//! - Define the draft shape an external title-lookup collaborator returns.
//!
//! # Invariants
//! - `owner_id` always references an existing user in the same backend.
//! - Id scope is backend-specific: user-scoped in the document store,
//!   global in the flat-file and relational stores.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a movie by its owning backend.
pub type MovieId = i64;

/// Canonical movie record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Release year kept as text; lookup collaborators return it verbatim.
    pub year: String,
    pub rating: Option<f64>,
    pub poster: Option<String>,
    /// Back-reference to the owning user.
    pub owner_id: UserId,
}

/// Input for `add_movie`: the fields an external lookup returns.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieDraft {
    pub title: String,
    pub year: String,
    pub rating: Option<f64>,
    pub poster: Option<String>,
}

/// Mutation input for `update_movie`.
///
/// Posters come from the lookup collaborator and are not editable here.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieUpdate {
    pub title: String,
    pub year: String,
    pub rating: Option<f64>,
}

impl MovieDraft {
    /// Materializes the stored record once the backend has assigned ids.
    pub fn into_movie(self, id: MovieId, owner_id: UserId) -> Movie {
        Movie {
            id,
            title: self.title,
            year: self.year,
            rating: self.rating,
            poster: self.poster,
            owner_id,
        }
    }
}
