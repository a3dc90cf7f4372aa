//! Thread info rebuild.
//!
//! Walks every top-level thread (a message with `parent_id == 0` that is its
//! own thread) and asks a [`ThreadMetadataUpdater`] to recompute the cached
//! metadata for it. This takes a while on big installs and is meant for
//! recovering from errors or after upgrades, not for routine use.

use crate::error::Result;
use crate::forum::ForumId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Identifier of a message.
pub type MessageId = i64;

/// Width of the progress bar in characters.
pub const PROGRESS_BAR_WIDTH: usize = 20;

/// Printed instead of running when invoked from a web request.
pub const WEB_REQUEST_MESSAGE: &str = "This script cannot be run from a browser.";

/// Returns true when the environment looks like a CGI request, which is
/// signalled by `REMOTE_ADDR` being set.
pub fn is_web_request<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup("REMOTE_ADDR").is_some()
}

/// A top-level thread and the forum it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub message_id: MessageId,
    pub forum_id: ForumId,
}

/// The message columns the rebuild cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub message_id: MessageId,
    pub forum_id: ForumId,
    /// Id of the thread starter.
    pub thread: MessageId,
    /// 0 for the thread starter.
    pub parent_id: MessageId,
    /// Posting time in seconds since the Unix epoch.
    pub datestamp: i64,
}

impl MessageRow {
    /// Returns true for the message that starts a thread.
    pub fn is_thread_root(&self) -> bool {
        self.parent_id == 0 && self.message_id == self.thread
    }
}

/// Cached metadata of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub message_count: u64,
    pub last_post_time: i64,
    /// Message ids in posting order.
    pub message_ids: Vec<MessageId>,
}

impl ThreadMeta {
    /// Computes the metadata for the messages of one thread.
    pub fn from_messages(messages: &[MessageRow]) -> Self {
        let mut ordered: Vec<&MessageRow> = messages.iter().collect();
        ordered.sort_by_key(|m| (m.datestamp, m.message_id));

        Self {
            message_count: ordered.len() as u64,
            last_post_time: ordered.last().map_or(0, |m| m.datestamp),
            message_ids: ordered.iter().map(|m| m.message_id).collect(),
        }
    }
}

/// Read access to the message table, plus the place the rebuilt metadata
/// goes.
pub trait ThreadStore {
    /// Number of top-level threads.
    fn count_threads(&self) -> Result<usize>;

    /// All top-level threads, ordered by message id.
    fn thread_roots(&self) -> Result<Vec<ThreadRef>>;

    /// All messages of one thread, including the starter.
    fn thread_messages(&self, thread: MessageId) -> Result<Vec<MessageRow>>;

    /// Stores recomputed metadata for a thread.
    fn store_thread_meta(&self, thread: MessageId, meta: &ThreadMeta) -> Result<()>;
}

/// Recomputes the cached metadata of a single thread.
pub trait ThreadMetadataUpdater {
    fn update_metadata(&mut self, thread: &ThreadRef) -> Result<()>;
}

/// Updater that recomputes message count, last post time and message order
/// from the message table.
#[derive(Debug)]
pub struct MessageCountUpdater<'a, T: ?Sized> {
    store: &'a T,
}

impl<'a, T: ThreadStore + ?Sized> MessageCountUpdater<'a, T> {
    pub fn new(store: &'a T) -> Self {
        Self { store }
    }
}

impl<T: ThreadStore + ?Sized> ThreadMetadataUpdater for MessageCountUpdater<'_, T> {
    fn update_metadata(&mut self, thread: &ThreadRef) -> Result<()> {
        let messages = self.store.thread_messages(thread.message_id)?;
        let meta = ThreadMeta::from_messages(&messages);

        debug!(
            thread = thread.message_id,
            forum_id = thread.forum_id,
            message_count = meta.message_count,
            "Recomputed thread metadata"
        );

        self.store.store_thread_meta(thread.message_id, &meta)
    }
}

/// Progress of a running rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildProgress {
    pub done: usize,
    pub total: usize,
}

impl RebuildProgress {
    /// Completed share in whole percent, rounded down. An empty run is at
    /// 0%.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        self.done * 100 / self.total
    }

    /// Fixed-width bar such as `[==========          ]`.
    pub fn bar(&self) -> String {
        let filled = PROGRESS_BAR_WIDTH * self.percent() / 100;
        format!(
            "[{}{}]",
            "=".repeat(filled),
            " ".repeat(PROGRESS_BAR_WIDTH - filled)
        )
    }
}

impl fmt::Display for RebuildProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.total.to_string().len();
        write!(
            f,
            "updating {:>width$} / {:>width$}  {} ({}%)",
            self.done,
            self.total,
            self.bar(),
            self.percent(),
            width = width
        )
    }
}

/// Outcome of a completed rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub total: usize,
    pub updated: usize,
}

/// Rebuilds the metadata of every top-level thread.
///
/// `progress` is called after each thread, or once at 0% when there are no
/// threads. The first failing thread or progress report aborts the run;
/// threads updated before it keep their new metadata.
pub fn rebuild_thread_info<T, U, F>(store: &T, updater: &mut U, mut progress: F) -> Result<RebuildReport>
where
    T: ThreadStore + ?Sized,
    U: ThreadMetadataUpdater + ?Sized,
    F: FnMut(&RebuildProgress) -> Result<()>,
{
    let total = store.count_threads()?;
    let threads = store.thread_roots()?;

    info!(total = total, "Rebuilding thread info meta data");

    if threads.is_empty() {
        progress(&RebuildProgress { done: 0, total: 0 })?;
    }

    let mut updated = 0;
    for thread in &threads {
        updater.update_metadata(thread)?;
        updated += 1;
        progress(&RebuildProgress {
            done: updated,
            total: total.max(updated),
        })?;
    }

    info!(updated = updated, "Thread info rebuild complete");

    Ok(RebuildReport { total, updated })
}
