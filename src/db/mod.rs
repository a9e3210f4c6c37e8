//! SQLite persistence for participants, events, memberships and expenses.
//!
//! `init_db` opens the pool and applies `schema.sql`. `Repository` is the
//! `Storage` implementation the service runs on in production.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
