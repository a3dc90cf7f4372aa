//! Record shapes handled by the tree service.
//!
//! - `ForumRecord`: a typed, schema-coerced folder or forum
//! - `ForumData`: partial data handed to the writer
//! - `ForumMap`: ordered collection of records keyed by id

use super::constants::*;
use super::store::Row;
use super::types::{FieldValue, ForumId, ForumPath, Inheritance, NodeKind};
use serde::Serialize;

/// A folder or forum as returned by the reader and the writer.
///
/// Values are already coerced to their declared types. Typed accessors fall
/// back to the schema zero value for absent columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumRecord {
    fields: Row,
}

impl ForumRecord {
    /// Wraps already coerced fields.
    pub fn from_fields(fields: Row) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn into_fields(self) -> Row {
        self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(FieldValue::as_int)
    }

    pub fn bool(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(FieldValue::truthy)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_str)
    }

    pub(crate) fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// The id, or `None` for a record that has not been stored yet.
    pub fn forum_id(&self) -> Option<ForumId> {
        self.int(FORUM_ID)
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_flag(self.bool(FOLDER_FLAG))
    }

    pub fn is_folder(&self) -> bool {
        self.kind().is_folder()
    }

    pub fn parent_id(&self) -> ForumId {
        self.int(PARENT_ID).unwrap_or(0)
    }

    pub fn name(&self) -> &str {
        self.str(NAME).unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.str(DESCRIPTION).unwrap_or_default()
    }

    pub fn active(&self) -> bool {
        self.bool(ACTIVE)
    }

    pub fn display_order(&self) -> i64 {
        self.int(DISPLAY_ORDER).unwrap_or(0)
    }

    pub fn vroot(&self) -> ForumId {
        self.int(VROOT).unwrap_or(0)
    }

    pub fn cache_version(&self) -> i64 {
        self.int(CACHE_VERSION).unwrap_or(0)
    }

    pub fn inheritance(&self) -> Inheritance {
        Inheritance::from_field(self.fields.get(INHERIT_ID))
    }

    pub fn forum_path(&self) -> Option<&ForumPath> {
        self.fields.get(FORUM_PATH).and_then(FieldValue::as_path)
    }

    /// Returns true if this node is a folder configured as its own vroot.
    pub fn is_vroot(&self) -> bool {
        self.is_folder() && self.forum_id().is_some_and(|id| id != 0 && self.vroot() == id)
    }

    /// Plain JSON view of the record.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for ForumRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Partial folder or forum data for the writer.
///
/// The writer requires a `forum_id` column: NULL creates a new node, an id
/// updates (or creates) that node.
///
/// ```rust
/// use forum_tree::forum::ForumData;
///
/// let data = ForumData::create_forum("Chess")
///     .parent(12)
///     .set("read_length", 25);
/// assert!(data.get("forum_id").unwrap().is_null());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumData {
    fields: Row,
}

impl ForumData {
    /// Empty data without a `forum_id`; only useful for defaults saves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Data for a new node with an auto-assigned id.
    pub fn create() -> Self {
        Self::new().set(FORUM_ID, FieldValue::Null)
    }

    /// Data for a new folder with an auto-assigned id.
    pub fn create_folder(name: impl Into<String>) -> Self {
        Self::create().set(FOLDER_FLAG, true).set(NAME, name.into())
    }

    /// Data for a new forum with an auto-assigned id.
    pub fn create_forum(name: impl Into<String>) -> Self {
        Self::create().set(FOLDER_FLAG, false).set(NAME, name.into())
    }

    /// Data addressing an existing node.
    pub fn existing(forum_id: ForumId) -> Self {
        Self::new().set(FORUM_ID, forum_id)
    }

    /// Sets an arbitrary column.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn parent(self, parent_id: ForumId) -> Self {
        self.set(PARENT_ID, parent_id)
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.set(NAME, name.into())
    }

    pub fn vroot(self, vroot: ForumId) -> Self {
        self.set(VROOT, vroot)
    }

    pub fn inherit(self, inheritance: Inheritance) -> Self {
        self.set(INHERIT_ID, inheritance.to_field())
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn into_fields(self) -> Row {
        self.fields
    }
}

impl From<ForumRecord> for ForumData {
    fn from(record: ForumRecord) -> Self {
        Self {
            fields: record.into_fields(),
        }
    }
}

impl From<Row> for ForumData {
    fn from(fields: Row) -> Self {
        Self { fields }
    }
}

/// Records keyed by id, kept in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumMap {
    records: Vec<ForumRecord>,
}

impl ForumMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, forum_id: ForumId) -> Option<&ForumRecord> {
        self.records
            .iter()
            .find(|r| r.forum_id() == Some(forum_id))
    }

    pub fn contains(&self, forum_id: ForumId) -> bool {
        self.get(forum_id).is_some()
    }

    /// Position of a record in display order.
    pub fn position(&self, forum_id: ForumId) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.forum_id() == Some(forum_id))
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<ForumId> {
        self.records.iter().filter_map(ForumRecord::forum_id).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForumRecord> {
        self.records.iter()
    }

    pub fn values(&self) -> &[ForumRecord] {
        &self.records
    }

    pub(crate) fn push(&mut self, record: ForumRecord) {
        self.records.push(record);
    }
}

impl IntoIterator for ForumMap {
    type Item = ForumRecord;
    type IntoIter = std::vec::IntoIter<ForumRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ForumMap {
    type Item = &'a ForumRecord;
    type IntoIter = std::slice::Iter<'a, ForumRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
