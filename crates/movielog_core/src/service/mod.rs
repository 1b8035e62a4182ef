//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate storage-contract calls into use-case level APIs.
//! - Keep callers (web/CLI layers) decoupled from backend mechanics.

pub mod catalog_service;
