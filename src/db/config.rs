use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite connection url; `None` keeps every record in process memory.
    pub database_url: Option<String>,
    pub store_timeout: Duration,
    pub busy_timeout: Duration,
    pub journal_mode: SqliteJournalMode,
}

impl DbConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let journal_mode = std::env::var("SQLITE_JOURNAL_MODE")
            .ok()
            .as_deref()
            .and_then(SqliteJournalMode::parse)
            .unwrap_or(SqliteJournalMode::Wal);

        Self {
            database_url,
            store_timeout: Duration::from_millis(env_u64("STORE_TIMEOUT_MS", 5000)),
            busy_timeout: Duration::from_millis(env_u64("SQLITE_BUSY_TIMEOUT_MS", 5000)),
            journal_mode,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            store_timeout: Duration::from_millis(5000),
            busy_timeout: Duration::from_millis(5000),
            journal_mode: SqliteJournalMode::Wal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteJournalMode {
    Wal,
    Delete,
    Memory,
}

impl SqliteJournalMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "WAL" => Some(Self::Wal),
            "DELETE" => Some(Self::Delete),
            "MEMORY" => Some(Self::Memory),
            _ => None,
        }
    }

    pub(crate) fn to_sqlx(self) -> sqlx::sqlite::SqliteJournalMode {
        match self {
            Self::Wal => sqlx::sqlite::SqliteJournalMode::Wal,
            Self::Delete => sqlx::sqlite::SqliteJournalMode::Delete,
            Self::Memory => sqlx::sqlite::SqliteJournalMode::Memory,
        }
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
