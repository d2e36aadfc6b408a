//! Database module for the storefront server
//!
//! This module holds the persistent models and the data access layer
//! for users, credentials, sessions, and tokens.

pub mod models;
pub mod operations;

pub use models::{Credential, Session, Token, TokenKind, User};
pub use operations::DbOperations;
