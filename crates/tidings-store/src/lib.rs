//! Configuration storage for Tidings
//!
//! The durable key → bytes store behind the notification configuration cache.
//! Supports an in-process memory backend and SQLite.

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryConfigStore;
pub use sqlite::SqliteConfigStore;
pub use traits::*;
