use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info, warn};

use crate::cache::token::Token;
use crate::config::settings::PersistenceConfig;
use crate::error::TokenError;
use crate::helpers::time::now_i64;
use crate::persistence::TokenPersistence;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS access_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    token       TEXT    NOT NULL,
    expires_at  INTEGER NOT NULL,
    created_at  INTEGER NOT NULL
)
"#;

/// Append-only token table in a single SQLite file.
///
/// rusqlite is blocking, every statement runs on `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTokenStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, TokenError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, TokenError> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Open the configured database, retrying every `connect_retry_ms`.
    ///
    /// `connect_attempts == 0` retries forever.
    pub async fn connect_with_retry(config: &PersistenceConfig) -> Result<Self, TokenError> {
        let delay = Duration::from_millis(config.connect_retry_ms);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let path = PathBuf::from(&config.path);
            let opened = tokio::task::spawn_blocking(move || Self::open(path))
                .await
                .map_err(|e| TokenError::Persistence(format!("open task failed: {e}")))?;

            match opened {
                Ok(store) => {
                    info!("connected to token database '{}'", config.path);
                    return Ok(store);
                }
                Err(e) if config.connect_attempts != 0 && attempt >= config.connect_attempts => {
                    error!("database connection failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("database connection failed: {}, retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run_blocking<T, F>(&self, label: &'static str, f: F) -> Result<T, TokenError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| TokenError::Persistence(format!("{label}: connection lock poisoned")))?;
            f(&guard).map_err(TokenError::from)
        })
        .await
        .map_err(|e| {
            error!(label, "blocking task failed");
            TokenError::Persistence(format!("{label}: task failed: {e}"))
        })?
    }
}

impl TokenPersistence for SqliteTokenStore {
    async fn load_latest(&self) -> Result<Option<Token>, TokenError> {
        let token = self
            .run_blocking("load_latest", |conn| {
                conn.query_row(
                    "SELECT token, expires_at FROM access_tokens ORDER BY created_at DESC, id DESC LIMIT 1",
                    [],
                    |row| Ok(Token::new(row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await?;

        match &token {
            Some(t) => debug!("loaded token (expires at {})", t.expires_at),
            None => debug!("no token persisted yet"),
        }
        Ok(token)
    }

    async fn store(&self, token: Token) -> Result<(), TokenError> {
        let expires_at = token.expires_at;
        let affected = self
            .run_blocking("store", move |conn| {
                conn.execute(
                    "INSERT INTO access_tokens (token, expires_at, created_at) VALUES (?1, ?2, ?3)",
                    params![token.value, token.expires_at, now_i64()],
                )
            })
            .await?;
        info!("token stored (expires at {}), rows affected: {}", expires_at, affected);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_database_has_no_token() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        assert_eq!(store.load_latest().await.unwrap(), None);
    }

    #[tokio::test]
    async fn newest_row_wins() {
        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.store(Token::new("older".into(), 100)).await.unwrap();
        store.store(Token::new("newer".into(), 50)).await.unwrap();
        assert_eq!(store.load_latest().await.unwrap(), Some(Token::new("newer".into(), 50)));
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");
        {
            let store = SqliteTokenStore::open(&path).unwrap();
            store.store(Token::new("persisted".into(), 4_102_444_800)).await.unwrap();
        }
        let reopened = SqliteTokenStore::open(&path).unwrap();
        assert_eq!(
            reopened.load_latest().await.unwrap(),
            Some(Token::new("persisted".into(), 4_102_444_800))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_gives_up_after_configured_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            path: dir.path().join("missing").join("tokens.db").to_string_lossy().into_owned(),
            connect_retry_ms: 5_000,
            connect_attempts: 3,
        };
        let start = tokio::time::Instant::now();
        let err = SqliteTokenStore::connect_with_retry(&config).await.unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn connect_opens_valid_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            path: dir.path().join("tokens.db").to_string_lossy().into_owned(),
            connect_retry_ms: 10,
            connect_attempts: 1,
        };
        let store = SqliteTokenStore::connect_with_retry(&config).await.unwrap();
        assert_eq!(store.load_latest().await.unwrap(), None);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn logs_never_carry_token_text() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = SqliteTokenStore::open_in_memory().unwrap();
        store.store(Token::new("Zq9xW7secretvalue".into(), 4_102_444_800)).await.unwrap();
        store.load_latest().await.unwrap();

        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("4102444800"));
        assert!(!logs.contains("Zq9"));
    }
}
