//! Domain model shared by every storage backend.
//!
//! # Responsibility
//! - Define the canonical user/movie/review shapes all backends honor.
//! - Own draft/update input shapes and their validation rules.
//!
//! # Invariants
//! - `User::username` is unique within a backend instance.
//! - A `Movie` always belongs to exactly one `User` via `owner_id`.
//! - Ids are backend-assigned and never reused while a higher id exists.

pub mod movie;
pub mod review;
pub mod user;
