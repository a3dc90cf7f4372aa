//! Forum data persistence using RocksDB.
//!
//! ## Storage Layout
//!
//! Uses column families for logical separation:
//! - `forums`: `{forum_id}` -> serialized forum row
//! - `settings`: `{name}` -> serialized settings row
//! - `messages`: `{message_id}` -> serialized [`MessageRow`]
//! - `thread_index`: `{thread}{message_id}` -> () (messages by thread)
//! - `thread_meta`: `{thread}` -> serialized [`ThreadMeta`]
//! - `meta`: `next_forum_id` -> next id to hand out
//!
//! Numeric ids are stored as 8 byte big-endian keys so iteration follows id
//! order.

use super::constants::FORUM_ID;
use super::store::{display_cmp, ForumQuery, ForumStore, Row, SettingsStore};
use super::types::{FieldValue, ForumId};
use crate::config::ForumConfig;
use crate::error::{ForumError, Result};
use crate::rebuild::{MessageId, MessageRow, ThreadMeta, ThreadRef, ThreadStore};
use crate::storage::{id_key, pair_key, RocksDbConfig, RocksDbHandle};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Database subdirectory.
const DB_DIR: &str = "forum_db";

/// Column family names.
const CF_FORUMS: &str = "forums";
const CF_SETTINGS: &str = "settings";
const CF_MESSAGES: &str = "messages";
const CF_THREAD_INDEX: &str = "thread_index";
const CF_THREAD_META: &str = "thread_meta";
const CF_META: &str = "meta";

/// Key for the id allocator in the meta column family.
const META_NEXT_FORUM_ID: &[u8] = b"next_forum_id";

/// RocksDB-backed forum storage.
#[derive(Debug)]
pub struct RocksForumStore {
    db: RocksDbHandle,
    /// Serializes read-modify-write cycles on forum rows.
    write_lock: Mutex<()>,
}

impl RocksForumStore {
    /// Opens (or creates) the store in the configured data directory.
    pub fn open_with_config(config: &ForumConfig) -> Result<Self> {
        Self::open(&config.data_dir)
    }

    /// Opens (or creates) the store below `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let column_families = &[
            CF_FORUMS,
            CF_SETTINGS,
            CF_MESSAGES,
            CF_THREAD_INDEX,
            CF_THREAD_META,
            CF_META,
        ];

        let db = RocksDbHandle::open(&db_path, &RocksDbConfig::default(), column_families)?;
        info!("Opened forum RocksDB at {:?}", db_path);

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| ForumError::storage("Forum store write lock poisoned"))
    }

    fn load_row(&self, forum_id: ForumId) -> Result<Option<Row>> {
        self.db.get(CF_FORUMS, &id_key(forum_id))
    }

    fn next_forum_id(&self) -> Result<ForumId> {
        Ok(self
            .db
            .get::<ForumId>(CF_META, META_NEXT_FORUM_ID)?
            .unwrap_or(1))
    }

    /// Stores a message and indexes it under its thread.
    pub fn add_message(&self, message: &MessageRow) -> Result<()> {
        self.db
            .put(CF_MESSAGES, &id_key(message.message_id), message)?;
        self.db.put_raw(
            CF_THREAD_INDEX,
            &pair_key(message.thread, message.message_id),
            &[],
        )?;
        debug!(
            message_id = message.message_id,
            thread = message.thread,
            "Stored message"
        );
        Ok(())
    }

    /// Metadata stored for a thread by the last rebuild.
    pub fn thread_meta(&self, thread: MessageId) -> Result<Option<ThreadMeta>> {
        self.db.get(CF_THREAD_META, &id_key(thread))
    }

    fn all_messages(&self) -> Result<Vec<MessageRow>> {
        self.db.collect_all(CF_MESSAGES)
    }
}

impl ForumStore for RocksForumStore {
    fn fetch(&self, query: &ForumQuery) -> Result<Vec<Row>> {
        let mut rows = match query {
            ForumQuery::Ids(ids) => {
                let mut rows = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(row) = self.load_row(*id)? {
                        rows.push(row);
                    }
                }
                rows
            }
            _ => self
                .db
                .collect_all::<Row>(CF_FORUMS)?
                .into_iter()
                .filter(|row| query.matches(row))
                .collect(),
        };
        rows.sort_by(display_cmp);
        Ok(rows)
    }

    fn insert(&self, mut row: Row) -> Result<ForumId> {
        let _guard = self.lock()?;
        let next = self.next_forum_id()?;

        let forum_id = match row.get(FORUM_ID).and_then(FieldValue::as_int) {
            Some(id) if id <= 0 => {
                return Err(ForumError::storage(format!("Invalid forum id {}", id)));
            }
            Some(id) => {
                if self.db.exists(CF_FORUMS, &id_key(id))? {
                    return Err(ForumError::storage(format!("Forum id {} already exists", id)));
                }
                id
            }
            None => {
                let mut id = next;
                while self.db.exists(CF_FORUMS, &id_key(id))? {
                    id += 1;
                }
                id
            }
        };

        row.insert(FORUM_ID.to_string(), FieldValue::Int(forum_id));
        self.db.put(CF_FORUMS, &id_key(forum_id), &row)?;
        self.db
            .put(CF_META, META_NEXT_FORUM_ID, &next.max(forum_id + 1))?;

        debug!(forum_id = forum_id, "Inserted forum row");
        Ok(forum_id)
    }

    fn update(&self, forum_id: ForumId, changes: Row) -> Result<()> {
        let _guard = self.lock()?;
        let mut row = self
            .load_row(forum_id)?
            .ok_or_else(|| ForumError::storage(format!("Forum {} not found", forum_id)))?;

        for (name, value) in changes {
            if name != FORUM_ID {
                row.insert(name, value);
            }
        }
        self.db.put(CF_FORUMS, &id_key(forum_id), &row)
    }
}

impl SettingsStore for RocksForumStore {
    fn load_setting(&self, name: &str) -> Result<Option<Row>> {
        self.db.get(CF_SETTINGS, name.as_bytes())
    }

    fn store_setting(&self, name: &str, value: &Row) -> Result<()> {
        self.db.put(CF_SETTINGS, name.as_bytes(), value)
    }
}

impl ThreadStore for RocksForumStore {
    fn count_threads(&self) -> Result<usize> {
        Ok(self
            .all_messages()?
            .iter()
            .filter(|m| m.is_thread_root())
            .count())
    }

    fn thread_roots(&self) -> Result<Vec<ThreadRef>> {
        Ok(self
            .all_messages()?
            .into_iter()
            .filter(MessageRow::is_thread_root)
            .map(|m| ThreadRef {
                message_id: m.message_id,
                forum_id: m.forum_id,
            })
            .collect())
    }

    fn thread_messages(&self, thread: MessageId) -> Result<Vec<MessageRow>> {
        let mut ids = Vec::new();
        self.db
            .prefix_iterate(CF_THREAD_INDEX, &id_key(thread), |key, _| {
                if let Ok(bytes) = <[u8; 8]>::try_from(&key[8..]) {
                    ids.push(MessageId::from_be_bytes(bytes));
                }
                true
            })?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(message) = self.db.get(CF_MESSAGES, &id_key(id))? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    fn store_thread_meta(&self, thread: MessageId, meta: &ThreadMeta) -> Result<()> {
        self.db.put(CF_THREAD_META, &id_key(thread), meta)
    }
}
