//! Local key-value cache mirroring server state.
//!
//! The cache is a best-effort shadow of the remote store, written on every
//! successful remote read/write and consulted only when the remote store is
//! unreachable. Last writer wins; the remote store is the source of truth
//! whenever it can be reached, so a read or write that fails here is logged
//! and dropped rather than propagated.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::CacheError;

use super::data_dir;

/// Well-known cache keys shared between services.
pub mod keys {
    pub const CHAT_DAY_COUNT: &str = "chat_day_count";
    pub const CHAT_DAY_LIMIT: &str = "chat_day_limit";
    pub const CHAT_LAST_RESET: &str = "chat_last_reset";
    pub const IS_PREMIUM: &str = "is_premium";
    pub const PREMIUM_UNTIL: &str = "premium_until";
    pub const MEDITATION_SESSIONS: &str = "meditation_sessions";
}

/// Injected cache interface. Values are stored as strings; typed accessors
/// parse on the way out and return `None` for absent or malformed entries.
pub trait LocalCache: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_string(&self, key: &str, value: &str);
    fn delete(&self, key: &str);

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_string(key).and_then(|s| s.parse().ok())
    }

    fn set_i64(&self, key: &str, value: i64) {
        self.set_string(key, &value.to_string());
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key).and_then(|s| s.parse().ok())
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set_string(key, if value { "true" } else { "false" });
    }
}

/// JSON helpers over any [`LocalCache`].
pub trait LocalCacheExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T);
}

impl<C: LocalCache + ?Sized> LocalCacheExt for C {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.get_string(key)?;
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding unparseable cache entry");
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.set_string(key, &json),
            Err(err) => warn!(key, error = %err, "failed to serialize cache entry"),
        }
    }
}

/// SQLite-backed cache.
///
/// A single `kv(key TEXT PRIMARY KEY, value TEXT)` table in the app data
/// directory. All operations are best effort.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open the cache at `~/.config/mindwell/mindwell.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CacheError> {
        let path = data_dir()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
            .join("mindwell.db");
        Self::open_at(&path)
    }

    /// Open the cache at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|source| CacheError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().expect("cache lock poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl LocalCache for SqliteCache {
    fn get_string(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().expect("cache lock poisoned");
        match conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cache read failed");
                None
            }
        }
    }

    fn set_string(&self, key: &str, value: &str) {
        let conn = self.conn.lock().expect("cache lock poisoned");
        if let Err(err) = conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        ) {
            warn!(key, error = %err, "cache write failed");
        }
    }

    fn delete(&self, key: &str) {
        let conn = self.conn.lock().expect("cache lock poisoned");
        if let Err(err) = conn.execute("DELETE FROM kv WHERE key = ?1", params![key]) {
            warn!(key, error = %err, "cache delete failed");
        }
    }
}

/// In-memory cache for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get_string(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn set_string(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.entries.lock().expect("cache lock poisoned").remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache.set_i64(keys::CHAT_DAY_COUNT, 3);
        cache.set_bool(keys::IS_PREMIUM, true);
        cache.set_string(keys::CHAT_LAST_RESET, "2024-01-15T00:00:00+00:00");

        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(3));
        assert_eq!(cache.get_bool(keys::IS_PREMIUM), Some(true));
        assert_eq!(
            cache.get_string(keys::CHAT_LAST_RESET).as_deref(),
            Some("2024-01-15T00:00:00+00:00")
        );

        cache.delete(keys::IS_PREMIUM);
        assert_eq!(cache.get_bool(keys::IS_PREMIUM), None);
    }

    #[test]
    fn typed_getters_reject_malformed_values() {
        let cache = MemoryCache::new();
        cache.set_string(keys::CHAT_DAY_COUNT, "not a number");
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), None);
        assert_eq!(cache.get_bool(keys::CHAT_DAY_COUNT), None);
    }

    #[test]
    fn json_round_trip() {
        let cache = MemoryCache::new();
        cache.set_json("list", &vec![1u32, 2, 3]);
        assert_eq!(cache.get_json::<Vec<u32>>("list"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get_json::<Vec<String>>("missing"), None);
    }

    #[test]
    fn sqlite_cache_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::open_at(&path).expect("open");
            cache.set_i64(keys::CHAT_DAY_COUNT, 4);
            cache.set_string(keys::PREMIUM_UNTIL, "2024-06-01T00:00:00+00:00");
        }

        let cache = SqliteCache::open_at(&path).expect("reopen");
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(4));
        assert_eq!(
            cache.get_string(keys::PREMIUM_UNTIL).as_deref(),
            Some("2024-06-01T00:00:00+00:00")
        );

        cache.set_i64(keys::CHAT_DAY_COUNT, 5);
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), Some(5));

        cache.delete(keys::CHAT_DAY_COUNT);
        assert_eq!(cache.get_i64(keys::CHAT_DAY_COUNT), None);
    }
}
