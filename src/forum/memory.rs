//! In-memory storage backend.
//!
//! Keeps forum rows, settings and messages in maps behind `RwLock`s. Used by
//! tests and for dry runs; nothing survives the process.

use super::constants::FORUM_ID;
use super::store::{display_cmp, ForumQuery, ForumStore, Row, SettingsStore};
use super::types::{FieldValue, ForumId};
use crate::error::{ForumError, Result};
use crate::rebuild::{MessageId, MessageRow, ThreadMeta, ThreadRef, ThreadStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Storage backend that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryForumStore {
    forums: RwLock<BTreeMap<ForumId, Row>>,
    settings: RwLock<HashMap<String, Row>>,
    messages: RwLock<BTreeMap<MessageId, MessageRow>>,
    thread_meta: RwLock<HashMap<MessageId, ThreadMeta>>,
}

fn poisoned<T>(_: T) -> ForumError {
    ForumError::storage("Memory store lock poisoned")
}

impl MemoryForumStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a message.
    pub fn add_message(&self, message: &MessageRow) -> Result<()> {
        self.messages
            .write()
            .map_err(poisoned)?
            .insert(message.message_id, message.clone());
        Ok(())
    }

    /// Metadata stored for a thread by the last rebuild.
    pub fn thread_meta(&self, thread: MessageId) -> Option<ThreadMeta> {
        self.thread_meta.read().ok()?.get(&thread).cloned()
    }

    /// Number of stored forum rows.
    pub fn forum_count(&self) -> usize {
        self.forums.read().map(|f| f.len()).unwrap_or(0)
    }
}

impl ForumStore for MemoryForumStore {
    fn fetch(&self, query: &ForumQuery) -> Result<Vec<Row>> {
        let forums = self.forums.read().map_err(poisoned)?;
        let mut rows: Vec<Row> = match query {
            ForumQuery::Ids(ids) => ids.iter().filter_map(|id| forums.get(id).cloned()).collect(),
            _ => forums
                .values()
                .filter(|row| query.matches(row))
                .cloned()
                .collect(),
        };
        rows.sort_by(display_cmp);
        Ok(rows)
    }

    fn insert(&self, mut row: Row) -> Result<ForumId> {
        let mut forums = self.forums.write().map_err(poisoned)?;

        let requested = row.get(FORUM_ID).and_then(FieldValue::as_int);
        let forum_id = match requested {
            Some(id) if id <= 0 => {
                return Err(ForumError::storage(format!("Invalid forum id {}", id)));
            }
            Some(id) if forums.contains_key(&id) => {
                return Err(ForumError::storage(format!("Forum id {} already exists", id)));
            }
            Some(id) => id,
            None => forums.keys().next_back().map_or(1, |last| last + 1),
        };

        row.insert(FORUM_ID.to_string(), FieldValue::Int(forum_id));
        forums.insert(forum_id, row);
        Ok(forum_id)
    }

    fn update(&self, forum_id: ForumId, changes: Row) -> Result<()> {
        let mut forums = self.forums.write().map_err(poisoned)?;
        let row = forums
            .get_mut(&forum_id)
            .ok_or_else(|| ForumError::storage(format!("Forum {} not found", forum_id)))?;
        for (name, value) in changes {
            if name != FORUM_ID {
                row.insert(name, value);
            }
        }
        Ok(())
    }
}

impl SettingsStore for MemoryForumStore {
    fn load_setting(&self, name: &str) -> Result<Option<Row>> {
        let settings = self.settings.read().map_err(poisoned)?;
        Ok(settings.get(name).cloned())
    }

    fn store_setting(&self, name: &str, value: &Row) -> Result<()> {
        let mut settings = self.settings.write().map_err(poisoned)?;
        settings.insert(name.to_string(), value.clone());
        Ok(())
    }
}

impl ThreadStore for MemoryForumStore {
    fn count_threads(&self) -> Result<usize> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages.values().filter(|m| m.is_thread_root()).count())
    }

    fn thread_roots(&self) -> Result<Vec<ThreadRef>> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages
            .values()
            .filter(|m| m.is_thread_root())
            .map(|m| ThreadRef {
                message_id: m.message_id,
                forum_id: m.forum_id,
            })
            .collect())
    }

    fn thread_messages(&self, thread: MessageId) -> Result<Vec<MessageRow>> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages
            .values()
            .filter(|m| m.thread == thread)
            .cloned()
            .collect())
    }

    fn store_thread_meta(&self, thread: MessageId, meta: &ThreadMeta) -> Result<()> {
        let mut stored = self.thread_meta.write().map_err(poisoned)?;
        stored.insert(thread, meta.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::constants::{NAME, PARENT_ID};

    fn row(name: &str, parent: i64) -> Row {
        let mut row = Row::new();
        row.insert(FORUM_ID.into(), FieldValue::Null);
        row.insert(NAME.into(), FieldValue::from(name));
        row.insert(PARENT_ID.into(), FieldValue::Int(parent));
        row
    }

    fn message(id: MessageId, thread: MessageId) -> MessageRow {
        MessageRow {
            message_id: id,
            forum_id: 1,
            thread,
            parent_id: if id == thread { 0 } else { thread },
            datestamp: id * 10,
        }
    }

    #[test]
    fn test_add_message() {
        let store = MemoryForumStore::new();
        store.add_message(&message(1, 1)).unwrap();
        store.add_message(&message(2, 1)).unwrap();
        assert_eq!(store.count_threads().unwrap(), 1);
        assert_eq!(store.thread_messages(1).unwrap().len(), 2);
    }

    #[test]
    fn test_add_message_poisoned_lock() {
        let store = MemoryForumStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.messages.write().unwrap();
            panic!("writer crashed");
        }));

        let result = store.add_message(&message(1, 1));
        assert!(matches!(result, Err(ForumError::Storage(_))));
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = MemoryForumStore::new();
        assert_eq!(store.insert(row("a", 0)).unwrap(), 1);
        assert_eq!(store.insert(row("b", 0)).unwrap(), 2);

        let mut explicit = row("c", 0);
        explicit.insert(FORUM_ID.into(), FieldValue::Int(10));
        assert_eq!(store.insert(explicit).unwrap(), 10);
        assert_eq!(store.insert(row("d", 0)).unwrap(), 11);
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let store = MemoryForumStore::new();
        let mut explicit = row("a", 0);
        explicit.insert(FORUM_ID.into(), FieldValue::Int(3));
        store.insert(explicit.clone()).unwrap();
        assert!(store.insert(explicit).is_err());
    }

    #[test]
    fn test_fetch_by_ids_skips_unknown() {
        let store = MemoryForumStore::new();
        store.insert(row("a", 0)).unwrap();
        let rows = store.fetch(&ForumQuery::Ids(vec![1, 99])).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_update_keeps_id() {
        let store = MemoryForumStore::new();
        let id = store.insert(row("a", 0)).unwrap();

        let mut changes = Row::new();
        changes.insert(NAME.into(), FieldValue::from("renamed"));
        changes.insert(FORUM_ID.into(), FieldValue::Int(77));
        store.update(id, changes).unwrap();

        let rows = store.fetch(&ForumQuery::Parent(0)).unwrap();
        assert_eq!(rows[0][NAME], FieldValue::from("renamed"));
        assert_eq!(rows[0][FORUM_ID], FieldValue::Int(id));
        assert!(store.update(99, Row::new()).is_err());
    }

    #[test]
    fn test_settings_round_trip() {
        let store = MemoryForumStore::new();
        assert!(store.load_setting("x").unwrap().is_none());
        let mut value = Row::new();
        value.insert("language".into(), FieldValue::from("dutch"));
        store.store_setting("x", &value).unwrap();
        assert_eq!(store.load_setting("x").unwrap(), Some(value));
    }
}
