//! SQLite conversation log.
//!
//! A single `conversations` table holds one row per chat cycle. Rows are
//! never deleted; redaction blanks `message` and `reply` in one UPDATE
//! statement, which SQLite applies atomically.

use async_trait::async_trait;
use chrono::Utc;
use scaffold_core::error::LogError;
use scaffold_core::log::ConversationLog;
use scaffold_core::record::ConversationRecord;
use scaffold_core::{ScaffoldingType, UnderstandingLevel};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A production SQLite conversation log.
pub struct SqliteLog {
    pool: SqlitePool,
}

impl SqliteLog {
    /// Open a log from a connection string.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests); it is served from a single connection so every query sees
    /// the same database.
    pub async fn new(url: &str) -> Result<Self, LogError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| LogError::Storage(format!("Invalid SQLite path: {e}")))?;
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections).await
    }

    /// Open (creating if needed) a database file.
    pub async fn open(path: &Path) -> Result<Self, LogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| LogError::Storage(format!("Create {}: {e}", parent.display())))?;
        }
        let log = Self::connect(SqliteConnectOptions::new().filename(path), 4).await?;
        info!("SQLite conversation log opened at {}", path.display());
        Ok(log)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, LogError> {
        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    async fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self, LogError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LogError::Storage(format!("Failed to open SQLite: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Create the conversations table and its index.
    async fn run_migrations(&self) -> Result<(), LogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                learner      TEXT NOT NULL,
                message      TEXT NOT NULL,
                reply        TEXT NOT NULL,
                unit         TEXT,
                scaffolding  TEXT,
                level        TEXT,
                rationale    TEXT,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LogError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_learner ON conversations(learner, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LogError::MigrationFailed(format!("learner index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `ConversationRecord` from a SQLite row.
    ///
    /// Stored labels that no longer parse decode to `None`.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationRecord, LogError> {
        let column = |name: &str, e: sqlx::Error| LogError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| column("id", e))?;
        let learner: String = row.try_get("learner").map_err(|e| column("learner", e))?;
        let message: String = row.try_get("message").map_err(|e| column("message", e))?;
        let reply: String = row.try_get("reply").map_err(|e| column("reply", e))?;
        let unit: Option<String> = row.try_get("unit").map_err(|e| column("unit", e))?;
        let scaffolding: Option<String> =
            row.try_get("scaffolding").map_err(|e| column("scaffolding", e))?;
        let level: Option<String> = row.try_get("level").map_err(|e| column("level", e))?;
        let rationale: Option<String> =
            row.try_get("rationale").map_err(|e| column("rationale", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;

        let scaffolding = scaffolding.as_deref().and_then(|raw| {
            let parsed = ScaffoldingType::recognize(raw);
            if parsed.is_none() {
                warn!(record = %id, value = raw, "Unrecognized stored scaffolding type");
            }
            parsed
        });
        let level = level.as_deref().and_then(|raw| {
            let parsed = UnderstandingLevel::recognize(raw);
            if parsed.is_none() {
                warn!(record = %id, value = raw, "Unrecognized stored understanding level");
            }
            parsed
        });

        // Unreadable timestamps pin to the epoch so repeated reads agree
        let timestamp = match chrono::DateTime::parse_from_rfc3339(&created_at) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!(record = %id, value = %created_at, error = %e, "Unparseable stored timestamp");
                chrono::DateTime::<Utc>::UNIX_EPOCH
            }
        };

        Ok(ConversationRecord {
            id,
            learner,
            message,
            reply,
            unit,
            scaffolding,
            level,
            rationale,
            timestamp,
        })
    }
}

#[async_trait]
impl ConversationLog for SqliteLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, mut record: ConversationRecord) -> Result<String, LogError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }

        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, learner, message, reply, unit, scaffolding, level, rationale, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.learner)
        .bind(&record.message)
        .bind(&record.reply)
        .bind(&record.unit)
        .bind(record.scaffolding.map(ScaffoldingType::as_str))
        .bind(record.level.map(UnderstandingLevel::as_str))
        .bind(&record.rationale)
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LogError::Storage(format!("INSERT failed: {e}")))?;

        debug!(record = %record.id, learner = %record.learner, "Appended conversation record");
        Ok(record.id)
    }

    async fn query_ordered(&self, learner: &str) -> Result<Vec<ConversationRecord>, LogError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE learner = ?1 ORDER BY created_at ASC, iid ASC",
        )
        .bind(learner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogError::QueryFailed(format!("Learner query: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn query_all(&self) -> Result<Vec<ConversationRecord>, LogError> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY created_at ASC, iid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LogError::QueryFailed(format!("Full query: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn redact(&self, learner: &str) -> Result<usize, LogError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET message = '', reply = ''
            WHERE learner = ?1 AND (message <> '' OR reply <> '')
            "#,
        )
        .bind(learner)
        .execute(&self.pool)
        .await
        .map_err(|e| LogError::Storage(format!("REDACT failed: {e}")))?;

        let changed = result.rows_affected() as usize;
        info!(learner, changed, "Redacted conversation text");
        Ok(changed)
    }

    async fn count(&self, learner: &str) -> Result<usize, LogError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM conversations WHERE learner = ?1")
            .bind(learner)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LogError::QueryFailed(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| LogError::QueryFailed(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }
}
