//! Storage collaborator traits for the forum tree.
//!
//! The tree service only talks to storage through these traits. Rows are
//! loosely typed column maps; type coercion happens in the reader, not in the
//! backend.

use super::constants::{DISPLAY_ORDER, FORUM_ID, INHERIT_ID, PARENT_ID, VROOT};
use super::types::{FieldValue, ForumId};
use crate::error::Result;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A raw forum table row: column name to value.
pub type Row = BTreeMap<String, FieldValue>;

/// Selection of forum rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForumQuery {
    /// Rows with one of the given ids. Unknown ids are skipped.
    Ids(Vec<ForumId>),
    /// Direct children of a folder (0 for top level).
    Parent(ForumId),
    /// All rows in a vroot (0 for the main tree).
    Vroot(ForumId),
    /// Rows whose `inherit_id` equals the given id (0 for the defaults).
    InheritFrom(ForumId),
    /// Every row.
    All,
}

impl ForumQuery {
    /// Returns true if the row is selected by this query.
    pub fn matches(&self, row: &Row) -> bool {
        let column = |name: &str| row.get(name).and_then(FieldValue::as_int);
        match self {
            ForumQuery::Ids(ids) => column(FORUM_ID).is_some_and(|id| ids.contains(&id)),
            ForumQuery::Parent(parent) => column(PARENT_ID).unwrap_or(0) == *parent,
            ForumQuery::Vroot(vroot) => column(VROOT).unwrap_or(0) == *vroot,
            ForumQuery::InheritFrom(source) => column(INHERIT_ID) == Some(*source),
            ForumQuery::All => true,
        }
    }
}

/// Display ordering for rows: `display_order`, then `forum_id`.
pub fn display_cmp(a: &Row, b: &Row) -> Ordering {
    let key = |row: &Row| {
        (
            row.get(DISPLAY_ORDER).and_then(FieldValue::as_int).unwrap_or(0),
            row.get(FORUM_ID).and_then(FieldValue::as_int).unwrap_or(0),
        )
    };
    key(a).cmp(&key(b))
}

/// Row level access to the forum table.
pub trait ForumStore {
    /// Returns the selected rows sorted with [`display_cmp`].
    fn fetch(&self, query: &ForumQuery) -> Result<Vec<Row>>;

    /// Inserts a new row and returns its id.
    ///
    /// A row without a `forum_id` (or with a NULL one) gets the next free id.
    /// Inserting an id that is already taken is an error.
    fn insert(&self, row: Row) -> Result<ForumId>;

    /// Overwrites the given columns of an existing row.
    fn update(&self, forum_id: ForumId, changes: Row) -> Result<()>;
}

/// Named settings records.
pub trait SettingsStore {
    fn load_setting(&self, name: &str) -> Result<Option<Row>>;

    fn store_setting(&self, name: &str, value: &Row) -> Result<()>;
}
