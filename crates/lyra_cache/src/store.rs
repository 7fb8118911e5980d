//! SQLite-backed media cache.
//!
//! Each cache is one table in a shared database file. A fixed prefix of
//! columns (`id`, `parent`, `updated`, `media`) carries identity, hierarchy,
//! the write timestamp and the full serialized record; caches additionally
//! declare searchable keys, each mapped to a typed column usable in raw SQL
//! predicates. Writes are batched inside a lazily opened transaction that is
//! committed before the next read.

use std::fmt::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use uuid::Uuid;

use lyra_core::{
    deserialize, serialize, KeyRegistry, LyraError, LyraResult, Media, MediaKey, SerializeMode,
    Value, ValueType,
};

use crate::config::CacheConfig;

const FIXED_COLUMNS: &[&str] = &["id", "parent", "updated", "media"];

const BUSY_ATTEMPTS: u32 = 50;
const BUSY_DELAY: Duration = Duration::from_millis(20);

/// A record as stored in the cache, with its hierarchy link and the
/// timestamp of its last write.
#[derive(Clone, Debug)]
pub struct CachedMedia {
    pub media: Media,
    pub parent: Option<String>,
    pub updated: DateTime<Utc>,
}

/// One cache table. Ephemeral caches get a generated name and a
/// `TEMPORARY` table that vanishes with the connection; persistent caches
/// use a caller-chosen identifier and survive reopening the database.
#[derive(Debug)]
pub struct MediaCache {
    conn: Connection,
    cache_id: String,
    registry: Arc<KeyRegistry>,
    extra_keys: Vec<MediaKey>,
    on_transaction: bool,
}

impl MediaCache {
    /// Creates an ephemeral cache backed by a `TEMPORARY` table with a
    /// generated name.
    pub fn new(
        config: &CacheConfig,
        registry: Arc<KeyRegistry>,
        keys: &[MediaKey],
    ) -> LyraResult<Self> {
        let cache_id = format!("cache_{}", Uuid::new_v4().simple());
        Self::create(config, registry, cache_id, keys, false)
    }

    /// Creates a persistent cache under a caller-chosen identifier. The
    /// identifier must be a plain SQL name: letters, digits and `_`, not
    /// starting with a digit.
    pub fn new_persistent(
        config: &CacheConfig,
        registry: Arc<KeyRegistry>,
        cache_id: &str,
        keys: &[MediaKey],
    ) -> LyraResult<Self> {
        validate_cache_id(cache_id)?;
        Self::create(config, registry, cache_id.to_string(), keys, true)
    }

    /// Reopens a persistent cache created earlier, recovering its
    /// searchable keys from the table schema.
    pub fn load_persistent(
        config: &CacheConfig,
        registry: Arc<KeyRegistry>,
        cache_id: &str,
    ) -> LyraResult<Self> {
        validate_cache_id(cache_id)?;
        let conn = open_database(config)?;

        let exists: Option<String> = with_busy_retry(|| {
            conn.query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![cache_id],
                |row| row.get(0),
            )
            .optional()
        })
        .map_err(|err| storage_error(cache_id, None, &err))?;
        if exists.is_none() {
            return Err(LyraError::not_found(format!(
                "no persistent cache '{cache_id}'"
            )));
        }

        let mut extra_keys = Vec::new();
        let columns = with_busy_retry(|| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({cache_id})"))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .map_err(|err| storage_error(cache_id, None, &err))?;
        for column in columns {
            if FIXED_COLUMNS.contains(&column.as_str()) {
                continue;
            }
            match registry.key_by_name(&column) {
                Some(key) => extra_keys.push(key),
                // Column from a key no longer registered; it stays in the
                // table but is not addressable through this handle.
                None => warn!("cache '{cache_id}': unknown column '{column}' skipped"),
            }
        }

        debug!(
            "loaded persistent cache '{cache_id}' with {} searchable keys",
            extra_keys.len()
        );
        Ok(Self {
            conn,
            cache_id: cache_id.to_string(),
            registry,
            extra_keys,
            on_transaction: false,
        })
    }

    fn create(
        config: &CacheConfig,
        registry: Arc<KeyRegistry>,
        cache_id: String,
        keys: &[MediaKey],
        persistent: bool,
    ) -> LyraResult<Self> {
        let conn = open_database(config)?;

        let mut extra_keys = Vec::new();
        let mut sql = format!(
            "CREATE {}TABLE {cache_id} (id TEXT PRIMARY KEY, parent TEXT REFERENCES {cache_id} (id), updated DATE, media TEXT",
            if persistent { "" } else { "TEMPORARY " },
        );
        for key in keys {
            let column_type = match registry.declared_type(*key) {
                Some(ValueType::Str) => "TEXT",
                Some(ValueType::Int) => "INTEGER",
                Some(ValueType::Float) => "REAL",
                Some(ValueType::Blob) | None => {
                    warn!("cache '{cache_id}': key {key:?} cannot be a searchable column");
                    continue;
                }
            };
            let Some(name) = registry.name(*key) else {
                continue;
            };
            let _ = write!(sql, ", {name} {column_type}");
            extra_keys.push(*key);
        }
        sql.push(')');

        with_busy_retry(|| conn.execute_batch(&sql))
            .map_err(|err| LyraError::storage(format!("create cache '{cache_id}': {err}")))?;

        debug!(
            "created {} cache '{cache_id}' with {} searchable keys",
            if persistent { "persistent" } else { "ephemeral" },
            extra_keys.len()
        );
        Ok(Self {
            conn,
            cache_id,
            registry,
            extra_keys,
            on_transaction: false,
        })
    }

    pub fn cache_id(&self) -> &str {
        &self.cache_id
    }

    /// Searchable keys actually accepted at creation, in column order.
    pub fn searchable_keys(&self) -> &[MediaKey] {
        &self.extra_keys
    }

    /// Inserts `media` under its id, replacing any previous row with the
    /// same id. The write joins the current batch transaction.
    pub fn insert(&mut self, media: &Media, parent: Option<&str>) -> LyraResult<()> {
        let media_id = media
            .id()
            .ok_or_else(|| {
                LyraError::validation(format!(
                    "cannot cache a record without an id in '{}'",
                    self.cache_id
                ))
            })?
            .to_string();
        let serial = serialize(media, &SerializeMode::Full)?;
        self.begin_if_needed()?;

        let mut columns = String::new();
        let mut placeholders = String::new();
        for key in &self.extra_keys {
            if let Some(name) = self.registry.name(*key) {
                let _ = write!(columns, ", {name}");
                placeholders.push_str(", ?");
            }
        }
        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, parent, updated, media{columns}) VALUES (?, ?, ?, ?{placeholders})",
            self.cache_id,
        );

        let mut values: Vec<SqlValue> = vec![
            SqlValue::Text(media_id.clone()),
            match parent {
                Some(parent) => SqlValue::Text(parent.to_string()),
                None => SqlValue::Null,
            },
            SqlValue::Text(Utc::now().to_rfc3339()),
            SqlValue::Text(serial),
        ];
        for key in &self.extra_keys {
            values.push(match media.get(*key) {
                Some(Value::Str(text)) => SqlValue::Text(text.clone()),
                Some(Value::Int(number)) => SqlValue::Integer(*number),
                Some(Value::Float(number)) => SqlValue::Real(*number),
                Some(Value::Blob(_)) | None => SqlValue::Null,
            });
        }

        with_busy_retry(|| self.conn.execute(&sql, params_from_iter(values.iter())))
            .map_err(|err| storage_error(&self.cache_id, Some(&media_id), &err))?;
        Ok(())
    }

    /// Fetches one record by id. Commits any pending writes first so the
    /// read observes them.
    pub fn get(&mut self, media_id: &str) -> LyraResult<CachedMedia> {
        self.commit_if_needed()?;
        let sql = format!(
            "SELECT parent, updated, media FROM {} WHERE id = ?1",
            self.cache_id,
        );
        let row: Option<(Option<String>, String, String)> = with_busy_retry(|| {
            self.conn
                .query_row(&sql, params![media_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .optional()
        })
        .map_err(|err| storage_error(&self.cache_id, Some(media_id), &err))?;

        let Some((parent, updated, serial)) = row else {
            return Err(LyraError::not_found(format!(
                "no media '{media_id}' in cache '{}'",
                self.cache_id
            )));
        };
        let updated = DateTime::parse_from_rfc3339(&updated)
            .map_err(|err| {
                LyraError::storage(format!(
                    "cache '{}': bad timestamp for '{media_id}': {err}",
                    self.cache_id
                ))
            })?
            .with_timezone(&Utc);
        let media = deserialize(&serial, &self.registry)?;
        Ok(CachedMedia {
            media,
            parent,
            updated,
        })
    }

    /// Returns every record matching the raw SQL `condition` over the
    /// cache's columns, or all records when `condition` is `None`. Commits
    /// any pending writes first.
    pub fn search(&mut self, condition: Option<&str>) -> LyraResult<Vec<Media>> {
        self.commit_if_needed()?;
        let sql = match condition {
            Some(condition) => format!("SELECT media FROM {} WHERE {condition}", self.cache_id),
            None => format!("SELECT media FROM {}", self.cache_id),
        };
        let serials = with_busy_retry(|| {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .map_err(|err| storage_error(&self.cache_id, None, &err))?;
        serials
            .iter()
            .map(|serial| deserialize(serial, &self.registry))
            .collect()
    }

    /// Deletes every record matching the raw SQL `condition`, or all
    /// records when `condition` is `None`. The delete joins the current
    /// batch transaction.
    pub fn remove(&mut self, condition: Option<&str>) -> LyraResult<()> {
        self.begin_if_needed()?;
        let sql = match condition {
            Some(condition) => format!("DELETE FROM {} WHERE {condition}", self.cache_id),
            None => format!("DELETE FROM {}", self.cache_id),
        };
        with_busy_retry(|| self.conn.execute(&sql, []))
            .map_err(|err| storage_error(&self.cache_id, None, &err))?;
        Ok(())
    }

    /// Drops the cache table, persistent or not.
    pub fn destroy(mut self) -> LyraResult<()> {
        self.commit_if_needed()?;
        let sql = format!("DROP TABLE {}", self.cache_id);
        with_busy_retry(|| self.conn.execute_batch(&sql))
            .map_err(|err| storage_error(&self.cache_id, None, &err))?;
        debug!("destroyed cache '{}'", self.cache_id);
        Ok(())
    }

    fn begin_if_needed(&mut self) -> LyraResult<()> {
        if self.on_transaction {
            return Ok(());
        }
        with_busy_retry(|| self.conn.execute_batch("BEGIN"))
            .map_err(|err| storage_error(&self.cache_id, None, &err))?;
        self.on_transaction = true;
        Ok(())
    }

    fn commit_if_needed(&mut self) -> LyraResult<()> {
        if !self.on_transaction {
            return Ok(());
        }
        with_busy_retry(|| self.conn.execute_batch("COMMIT"))
            .map_err(|err| storage_error(&self.cache_id, None, &err))?;
        self.on_transaction = false;
        Ok(())
    }
}

impl Drop for MediaCache {
    fn drop(&mut self) {
        if self.on_transaction {
            if let Err(err) = self.conn.execute_batch("COMMIT") {
                warn!("cache '{}': commit on drop failed: {err}", self.cache_id);
            }
        }
    }
}

fn open_database(config: &CacheConfig) -> LyraResult<Connection> {
    Connection::open(&config.db_path).map_err(|err| {
        LyraError::config(format!(
            "cannot open cache database at '{}': {err}",
            config.db_path.display()
        ))
    })
}

fn validate_cache_id(cache_id: &str) -> LyraResult<()> {
    let mut chars = cache_id.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LyraError::validation(format!(
            "invalid cache id '{cache_id}': use letters, digits and '_', not starting with a digit"
        )))
    }
}

fn storage_error(cache_id: &str, media_id: Option<&str>, err: &rusqlite::Error) -> LyraError {
    match media_id {
        Some(media_id) => LyraError::storage(format!(
            "cache operation failed for '{cache_id}', media '{media_id}': {err}"
        )),
        None => LyraError::storage(format!("cache operation failed for '{cache_id}': {err}")),
    }
}

/// Retries an operation while SQLite reports the database busy or locked,
/// up to a bounded number of attempts.
fn with_busy_retry<T>(mut op: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(rusqlite::Error::SqliteFailure(code, message))
                if matches!(
                    code.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                if attempt >= BUSY_ATTEMPTS {
                    return Err(rusqlite::Error::SqliteFailure(code, message));
                }
                attempt += 1;
                thread::sleep(BUSY_DELAY);
            }
            other => return other,
        }
    }
}
