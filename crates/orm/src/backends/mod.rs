//! Storage backends
//!
//! The executor reads through the [`StorageBackend`] trait. Two backends ship
//! with the crate: an in-memory store and a PostgreSQL store.

pub mod core;
pub mod memory;
pub mod postgres;

pub use self::core::{FetchRequest, Row, StorageBackend};
pub use memory::MemoryStore;
pub use postgres::PgStore;
