//! ConversationLog trait: the append-mostly record of chat cycles.
//!
//! The core only needs ordered retrieval and append. The single supported
//! bulk mutation is [`ConversationLog::redact`], which blanks a learner's
//! message and reply text without removing rows.

use async_trait::async_trait;
use crate::error::LogError;
use crate::record::ConversationRecord;

/// The core ConversationLog trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// Append a record. Returns the record ID.
    async fn append(&self, record: ConversationRecord) -> std::result::Result<String, LogError>;

    /// All records for one learner, oldest first.
    async fn query_ordered(&self, learner: &str) -> std::result::Result<Vec<ConversationRecord>, LogError>;

    /// All records for every learner, oldest first.
    async fn query_all(&self) -> std::result::Result<Vec<ConversationRecord>, LogError>;

    /// Blank message and reply text for one learner, atomically.
    ///
    /// Row count is preserved. Returns how many rows changed, so a second
    /// call on an already-redacted log returns 0.
    async fn redact(&self, learner: &str) -> std::result::Result<usize, LogError>;

    /// Number of records for one learner.
    async fn count(&self, learner: &str) -> std::result::Result<usize, LogError>;
}
