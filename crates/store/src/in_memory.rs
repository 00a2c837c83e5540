//! In-memory log: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use scaffold_core::error::LogError;
use scaffold_core::log::ConversationLog;
use scaffold_core::record::ConversationRecord;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A conversation log that keeps records in a Vec, in append order.
pub struct InMemoryLog {
    records: Arc<RwLock<Vec<ConversationRecord>>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationLog for InMemoryLog {
    fn name(&self) -> &str { "memory" }

    async fn append(&self, mut record: ConversationRecord) -> Result<String, LogError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn query_ordered(&self, learner: &str) -> Result<Vec<ConversationRecord>, LogError> {
        let records = self.records.read().await;
        let mut rows: Vec<ConversationRecord> = records
            .iter()
            .filter(|r| r.learner == learner)
            .cloned()
            .collect();
        // Stable: equal timestamps keep append order
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    async fn query_all(&self) -> Result<Vec<ConversationRecord>, LogError> {
        let mut rows = self.records.read().await.clone();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    async fn redact(&self, learner: &str) -> Result<usize, LogError> {
        let mut records = self.records.write().await;
        let mut changed = 0;
        for record in records.iter_mut().filter(|r| r.learner == learner && !r.is_redacted()) {
            record.message.clear();
            record.reply.clear();
            changed += 1;
        }
        Ok(changed)
    }

    async fn count(&self, learner: &str) -> Result<usize, LogError> {
        Ok(self.records.read().await.iter().filter(|r| r.learner == learner).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use scaffold_core::{ScaffoldingType, UnderstandingLevel};

    fn record(learner: &str, message: &str, minutes_ago: i64) -> ConversationRecord {
        ConversationRecord {
            id: String::new(),
            learner: learner.into(),
            message: message.into(),
            reply: format!("reply to {message}"),
            unit: Some("資料前處理".into()),
            scaffolding: Some(ScaffoldingType::Repetitive),
            level: Some(UnderstandingLevel::Intermediate),
            rationale: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn append_assigns_id() {
        let log = InMemoryLog::new();
        let id = log.append(record("amy", "hi", 0)).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(log.count("amy").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_is_chronological_and_scoped() {
        let log = InMemoryLog::new();
        log.append(record("amy", "second", 1)).await.unwrap();
        log.append(record("bob", "other", 5)).await.unwrap();
        log.append(record("amy", "first", 10)).await.unwrap();

        let rows = log.query_ordered("amy").await.unwrap();
        let messages: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(log.query_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn redact_is_scoped_count_preserving_and_idempotent() {
        let log = InMemoryLog::new();
        log.append(record("amy", "one", 2)).await.unwrap();
        log.append(record("amy", "two", 1)).await.unwrap();
        log.append(record("bob", "keep", 0)).await.unwrap();

        assert_eq!(log.redact("amy").await.unwrap(), 2);
        assert_eq!(log.count("amy").await.unwrap(), 2);
        assert_eq!(log.redact("amy").await.unwrap(), 0);
        assert_eq!(log.count("amy").await.unwrap(), 2);

        let amy = log.query_ordered("amy").await.unwrap();
        assert!(amy.iter().all(|r| r.is_redacted()));
        assert_eq!(amy[0].level, Some(UnderstandingLevel::Intermediate));

        let bob = log.query_ordered("bob").await.unwrap();
        assert_eq!(bob[0].message, "keep");
    }
}
