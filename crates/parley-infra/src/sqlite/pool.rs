//! SQLite connections for the chat store.
//!
//! Message inserts go through one writer connection so `created_at` order and
//! commit order agree; history and chat-list reads use a small read-only pool.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const DATABASE_FILE: &str = "parley.db";
const READER_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader and writer pools over one WAL-mode database.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if needed) `parley.db` inside `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self, sqlx::Error> {
        Self::new(&database_url(data_dir)).await
    }

    /// Connect to `database_url` and bring the schema up to date.
    ///
    /// The schema is migrated on the writer before any read-only connection
    /// exists.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

/// URL of the chat database inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        data_dir.join(DATABASE_FILE).display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_temp() -> (tempfile::TempDir, DatabasePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open(dir.path()).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn open_creates_chat_tables() {
        let (dir, pool) = open_temp().await;
        assert!(dir.path().join("parley.db").exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(names, vec!["chats", "messages"]);
    }

    #[tokio::test]
    async fn writer_uses_wal_and_foreign_keys() {
        let (_dir, pool) = open_temp().await;

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let (fk,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn reader_rejects_writes() {
        let (_dir, pool) = open_temp().await;
        let result = sqlx::query("INSERT INTO chats (id, user_id, title, created_at) VALUES ('c', 'u', 't', 'now')")
            .execute(&pool.reader)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deleting_a_chat_removes_its_messages() {
        let (_dir, pool) = open_temp().await;
        sqlx::query("INSERT INTO chats (id, user_id, title, created_at) VALUES ('c1', 'u1', 'Chat', '2025-01-01T00:00:00.000000Z')")
            .execute(&pool.writer)
            .await
            .unwrap();
        sqlx::query("INSERT INTO messages (id, chat_id, content, sender, created_at) VALUES ('m1', 'c1', 'hi', 'user', '2025-01-01T00:00:01.000000Z')")
            .execute(&pool.writer)
            .await
            .unwrap();

        sqlx::query("DELETE FROM chats WHERE id = 'c1'")
            .execute(&pool.writer)
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unknown_sender_is_rejected_by_schema() {
        let (_dir, pool) = open_temp().await;
        sqlx::query("INSERT INTO chats (id, user_id, title, created_at) VALUES ('c1', 'u1', 'Chat', '2025-01-01T00:00:00.000000Z')")
            .execute(&pool.writer)
            .await
            .unwrap();

        let result = sqlx::query("INSERT INTO messages (id, chat_id, content, sender, created_at) VALUES ('m1', 'c1', 'hi', 'bot', '2025-01-01T00:00:01.000000Z')")
            .execute(&pool.writer)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn database_url_points_into_data_dir() {
        let url = database_url(Path::new("/tmp/parley"));
        assert_eq!(url, "sqlite:///tmp/parley/parley.db?mode=rwc");
    }
}
