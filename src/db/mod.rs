//! User store: SQL-only functions over the `authorized_users` table.
//!
//! External modules should import from `extractor_bot::db`; the repository API
//! is re-exported here.

pub mod repo;

pub use repo::*;
