//! Review record, relational backend only.
//!
//! The document and flat-file stores have no review concept; the asymmetry
//! is deliberate and must not be unified into the shared contract.

use crate::model::movie::MovieId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

/// A user's free-text review of one movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub text: String,
}
