use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::MemoryError;

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Short-term cap: exchanges kept per session, oldest evicted first.
    pub max_exchanges: usize,
    pub short_term_ttl: Duration,
    pub long_term_ttl: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_exchanges: 10,
            short_term_ttl: Duration::from_secs(3600),
            long_term_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// One user/assistant exchange in short-term memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user_text: String,
    pub ai_text: String,
    pub created_at: String,
}

/// A long-term memory entry written by explicit summarization.
#[derive(Debug, Clone)]
pub struct SummaryEntry {
    pub summary: String,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One side of an exchange, for prompt replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

/// Session-scoped conversation memory over `SQLite`.
///
/// Two tiers: short-term exchanges (capped, short TTL) and long-term
/// summaries (long TTL). Expiry is read-side: rows past `expires_at`
/// read back as absent, there is no sweeper.
#[derive(Debug, Clone)]
pub struct SessionMemory {
    pool: SqlitePool,
    config: MemoryConfig,
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn ttl_to_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

impl SessionMemory {
    /// Open (or create) the `SQLite` database and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn new(path: &str, config: MemoryConfig) -> Result<Self, MemoryError> {
        // An in-memory database exists per connection, so the pool must
        // hold exactly one and never recycle it.
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{path}?mode=rwc"), 5)
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        Ok(Self { pool, config })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record one exchange: insert, trim to the cap (oldest first), and
    /// refresh the whole short-term tier's TTL. A single transaction, so a
    /// reader never observes the insert without the trim.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement or the commit fails.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_text: &str,
        ai_text: &str,
    ) -> Result<(), MemoryError> {
        let expires_at = now_unix() + ttl_to_secs(self.config.short_term_ttl);
        let cap = i64::try_from(self.config.max_exchanges).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO exchanges (session_id, user_text, ai_text, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(user_text)
        .bind(ai_text)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM exchanges WHERE session_id = ? AND id NOT IN \
             (SELECT id FROM exchanges WHERE session_id = ? ORDER BY id DESC LIMIT ?)",
        )
        .bind(session_id)
        .bind(session_id)
        .bind(cap)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE exchanges SET expires_at = ? WHERE session_id = ?")
            .bind(expires_at)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(session_id, "recorded exchange");
        Ok(())
    }

    /// Unexpired exchanges for a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_exchanges(&self, session_id: &str) -> Result<Vec<Exchange>, MemoryError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT user_text, ai_text, created_at FROM exchanges \
             WHERE session_id = ? AND expires_at > ? ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(now_unix())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(user_text, ai_text, created_at)| Exchange {
                user_text,
                ai_text,
                created_at,
            })
            .collect())
    }

    /// Short-term memory expanded into alternating user/assistant turns,
    /// chronological.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn turns(&self, session_id: &str) -> Result<Vec<Turn>, MemoryError> {
        let exchanges = self.get_exchanges(session_id).await?;
        let mut turns = Vec::with_capacity(exchanges.len() * 2);
        for exchange in exchanges {
            turns.push(Turn {
                role: TurnRole::User,
                content: exchange.user_text,
            });
            turns.push(Turn {
                role: TurnRole::Assistant,
                content: exchange.ai_text,
            });
        }
        Ok(turns)
    }

    /// Append a long-term summary and refresh the tier's TTL. Never called
    /// automatically by query turns.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement or the commit fails.
    pub async fn append_summary(
        &self,
        session_id: &str,
        summary: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), MemoryError> {
        let expires_at = now_unix() + ttl_to_secs(self.config.long_term_ttl);
        let metadata = serde_json::to_string(metadata)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO summaries (session_id, summary, metadata, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(summary)
        .bind(&metadata)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE summaries SET expires_at = ? WHERE session_id = ?")
            .bind(expires_at)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(session_id, "recorded summary");
        Ok(())
    }

    /// Unexpired summaries for a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or stored metadata is not JSON.
    pub async fn get_summaries(&self, session_id: &str) -> Result<Vec<SummaryEntry>, MemoryError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT summary, metadata, created_at FROM summaries \
             WHERE session_id = ? AND expires_at > ? ORDER BY id ASC",
        )
        .bind(session_id)
        .bind(now_unix())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(summary, metadata, created_at)| {
                Ok(SummaryEntry {
                    summary,
                    metadata: serde_json::from_str(&metadata)?,
                    created_at,
                })
            })
            .collect()
    }

    /// Delete both tiers for a session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails.
    pub async fn clear_session(&self, session_id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM exchanges WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM summaries WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        tracing::info!(session_id, "cleared session memory");
        Ok(())
    }

    /// Distinct session ids with unexpired short-term memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn active_sessions(&self) -> Result<Vec<String>, MemoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT session_id FROM exchanges WHERE expires_at > ? ORDER BY session_id",
        )
        .bind(now_unix())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn healthy(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SessionMemory {
        SessionMemory::new(":memory:", MemoryConfig::default())
            .await
            .unwrap()
    }

    async fn memory_with(config: MemoryConfig) -> SessionMemory {
        SessionMemory::new(":memory:", config).await.unwrap()
    }

    #[tokio::test]
    async fn append_and_read_back_chronological() {
        let mem = memory().await;
        mem.append_exchange("s1", "first q", "first a").await.unwrap();
        mem.append_exchange("s1", "second q", "second a").await.unwrap();

        let exchanges = mem.get_exchanges("s1").await.unwrap();
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].user_text, "first q");
        assert_eq!(exchanges[1].ai_text, "second a");
    }

    #[tokio::test]
    async fn cap_evicts_oldest_first() {
        let mem = memory_with(MemoryConfig {
            max_exchanges: 3,
            ..MemoryConfig::default()
        })
        .await;

        for i in 0..5 {
            mem.append_exchange("s1", &format!("q{i}"), &format!("a{i}"))
                .await
                .unwrap();
        }

        let exchanges = mem.get_exchanges("s1").await.unwrap();
        assert_eq!(exchanges.len(), 3);
        assert_eq!(exchanges[0].user_text, "q2");
        assert_eq!(exchanges[2].user_text, "q4");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let mem = memory().await;
        mem.append_exchange("s1", "q", "a").await.unwrap();
        mem.append_exchange("s2", "other", "reply").await.unwrap();

        assert_eq!(mem.get_exchanges("s1").await.unwrap().len(), 1);
        assert_eq!(mem.get_exchanges("s2").await.unwrap().len(), 1);
        assert!(mem.get_exchanges("s3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_rows_read_as_absent() {
        let mem = memory_with(MemoryConfig {
            short_term_ttl: Duration::ZERO,
            ..MemoryConfig::default()
        })
        .await;
        mem.append_exchange("s1", "q", "a").await.unwrap();

        assert!(mem.get_exchanges("s1").await.unwrap().is_empty());
        assert!(mem.active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn turns_expand_exchanges_in_order() {
        let mem = memory().await;
        mem.append_exchange("s1", "hello", "hi there").await.unwrap();

        let turns = mem.turns("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].content, "hello");
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[1].content, "hi there");
    }

    #[tokio::test]
    async fn summaries_round_trip_with_metadata() {
        let mem = memory().await;
        let meta = serde_json::json!({"kind": "manual"});
        mem.append_summary("s1", "talked about rust", &meta)
            .await
            .unwrap();

        let summaries = mem.get_summaries("s1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].summary, "talked about rust");
        assert_eq!(summaries[0].metadata, meta);
    }

    #[tokio::test]
    async fn clear_session_empties_both_tiers() {
        let mem = memory().await;
        mem.append_exchange("s1", "q", "a").await.unwrap();
        mem.append_summary("s1", "sum", &serde_json::json!({}))
            .await
            .unwrap();

        mem.clear_session("s1").await.unwrap();

        assert!(mem.get_exchanges("s1").await.unwrap().is_empty());
        assert!(mem.get_summaries("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_missing_session_is_noop() {
        let mem = memory().await;
        mem.clear_session("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn active_sessions_lists_distinct_ids() {
        let mem = memory().await;
        mem.append_exchange("a", "q", "r").await.unwrap();
        mem.append_exchange("a", "q2", "r2").await.unwrap();
        mem.append_exchange("b", "q", "r").await.unwrap();

        assert_eq!(mem.active_sessions().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn healthy_on_open_pool() {
        let mem = memory().await;
        assert!(mem.healthy().await);
    }

    #[tokio::test]
    async fn wal_mode_on_file_db() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let mem = SessionMemory::new(path, MemoryConfig::default())
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(mem.pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
