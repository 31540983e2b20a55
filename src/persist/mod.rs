pub mod memory;
pub mod sqlite;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// String key-value storage shared by every feed screen.
///
/// Implementations must tolerate concurrent callers; writes are last-write-wins
/// per key.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> PersistResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> PersistResult<()>;
    fn remove_item(&self, key: &str) -> PersistResult<()>;
    fn all_keys(&self) -> PersistResult<Vec<String>>;
}
