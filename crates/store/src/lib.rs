//! Conversation log implementations for Scaffold.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryLog;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLog;
