//! Core value types for the forum tree.
//!
//! - `FieldValue`: a single loosely typed column value
//! - `ForumPath`: the cached ancestor path of a node
//! - `NodeKind`: folder/forum discriminator
//! - `Inheritance`: typed view of the `inherit_id` column

use crate::error::{ForumError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a forum or folder. `0` is the synthetic root.
pub type ForumId = i64;

/// Identifier of the synthetic root node, which has no stored row.
pub const ROOT_ID: ForumId = 0;

/// A single column value, as stored in a row or passed in by a caller.
///
/// Incoming data may use any variant for any field; the schema pass coerces
/// values to the declared field type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Int(i64),
    Bool(bool),
    Str(String),
    Path(ForumPath),
}

impl FieldValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Int(_) => "int",
            FieldValue::Bool(_) => "bool",
            FieldValue::Str(_) => "string",
            FieldValue::Path(_) => "path",
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Integer view of the value, if it has one.
    ///
    /// Strings are parsed after trimming; an empty string counts as zero.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            FieldValue::Str(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Some(0)
                } else {
                    s.parse().ok()
                }
            }
            FieldValue::Null | FieldValue::Path(_) => None,
        }
    }

    /// Truthiness of the value: zero, empty strings, `"0"`, null and empty
    /// paths are false.
    pub fn truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Int(v) => *v != 0,
            FieldValue::Bool(b) => *b,
            FieldValue::Str(s) => !(s.is_empty() || s == "0"),
            FieldValue::Path(p) => !p.is_empty(),
        }
    }

    /// String view of the value, if it has one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Path view of the value, if it has one.
    pub fn as_path(&self) -> Option<&ForumPath> {
        match self {
            FieldValue::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Converts the value to plain JSON for display.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Int(v) => serde_json::Value::from(*v),
            FieldValue::Bool(b) => serde_json::Value::from(*b),
            FieldValue::Str(s) => serde_json::Value::from(s.as_str()),
            FieldValue::Path(p) => serde_json::Value::Array(
                p.iter()
                    .map(|e| serde_json::json!([e.id, e.name]))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", u8::from(*b)),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Path(p) => write!(f, "{}", p),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<ForumPath> for FieldValue {
    fn from(v: ForumPath) -> Self {
        FieldValue::Path(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// One node in a forum path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub id: ForumId,
    pub name: String,
}

/// Cached ancestor path of a node, root first and the node itself last.
///
/// The first entry is either the synthetic root (id 0) or the vroot folder
/// the node lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForumPath(Vec<PathEntry>);

impl ForumPath {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from `(id, name)` pairs in root-first order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ForumId, S)>,
        S: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(id, name)| PathEntry {
                    id,
                    name: name.into(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathEntry> {
        self.0.iter()
    }

    /// The (v)root the path starts at.
    pub fn first(&self) -> Option<&PathEntry> {
        self.0.first()
    }

    /// The node the path was built for.
    pub fn last(&self) -> Option<&PathEntry> {
        self.0.last()
    }

    /// Ids along the path, root first.
    pub fn ids(&self) -> Vec<ForumId> {
        self.0.iter().map(|e| e.id).collect()
    }

    /// Returns true if the given id appears on the path.
    pub fn contains(&self, id: ForumId) -> bool {
        self.0.iter().any(|e| e.id == id)
    }

    /// Serializes the path for storage in a row, as a JSON array of
    /// `{"id", "name"}` objects.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ForumError::serialization(format!("Failed to encode forum path: {}", e)))
    }

    /// Parses a path previously produced by [`ForumPath::encode`].
    pub fn decode(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(raw)
            .map_err(|e| ForumError::serialization(format!("Failed to decode forum path: {}", e)))
    }

    pub(crate) fn push(&mut self, id: ForumId, name: impl Into<String>) {
        self.0.push(PathEntry {
            id,
            name: name.into(),
        });
    }

    pub(crate) fn reverse(&mut self) {
        self.0.reverse();
    }
}

impl fmt::Display for ForumPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|e| e.name.as_str()).collect();
        write!(f, "{}", names.join(" / "))
    }
}

impl<'a> IntoIterator for &'a ForumPath {
    type Item = &'a PathEntry;
    type IntoIter = std::slice::Iter<'a, PathEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Folder/forum discriminator, derived from the `folder_flag` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Container for other folders and forums.
    Folder,
    /// Leaf container for message threads.
    Forum,
}

impl NodeKind {
    pub fn from_flag(folder_flag: bool) -> Self {
        if folder_flag {
            NodeKind::Folder
        } else {
            NodeKind::Forum
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, NodeKind::Folder)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Folder => write!(f, "folder"),
            NodeKind::Forum => write!(f, "forum"),
        }
    }
}

/// Where a node takes its slave settings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inheritance {
    /// The node carries its own settings (`inherit_id` is NULL).
    None,
    /// Settings come from the global defaults (`inherit_id` is 0).
    Defaults,
    /// Settings come from another forum.
    Forum(ForumId),
}

impl Inheritance {
    /// Reads the typed inheritance from an `inherit_id` value.
    ///
    /// A missing or NULL column means no inheritance.
    pub fn from_field(value: Option<&FieldValue>) -> Self {
        match value.and_then(FieldValue::as_int) {
            None => Inheritance::None,
            Some(0) => Inheritance::Defaults,
            Some(id) => Inheritance::Forum(id),
        }
    }

    /// The `inherit_id` column value for this inheritance.
    pub fn to_field(self) -> FieldValue {
        match self {
            Inheritance::None => FieldValue::Null,
            Inheritance::Defaults => FieldValue::Int(0),
            Inheritance::Forum(id) => FieldValue::Int(id),
        }
    }

    pub fn is_inheriting(&self) -> bool {
        !matches!(self, Inheritance::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coercion() {
        assert_eq!(FieldValue::Int(7).as_int(), Some(7));
        assert_eq!(FieldValue::Bool(true).as_int(), Some(1));
        assert_eq!(FieldValue::from(" 42 ").as_int(), Some(42));
        assert_eq!(FieldValue::from("").as_int(), Some(0));
        assert_eq!(FieldValue::from("abc").as_int(), None);
        assert_eq!(FieldValue::Null.as_int(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::from("0").truthy());
        assert!(!FieldValue::from("").truthy());
        assert!(FieldValue::from("yes").truthy());
        assert!(!FieldValue::Int(0).truthy());
        assert!(FieldValue::Int(-1).truthy());
        assert!(!FieldValue::Null.truthy());
    }

    #[test]
    fn test_path_encode_decode() {
        let path = ForumPath::from_pairs([(0, "Phorum"), (3, "Games"), (9, "Chess")]);
        let raw = path.encode().unwrap();
        let decoded = ForumPath::decode(&raw).unwrap();
        assert_eq!(decoded, path);
        assert_eq!(decoded.ids(), vec![0, 3, 9]);
        assert_eq!(decoded.last().unwrap().name, "Chess");
        assert_eq!(decoded.to_string(), "Phorum / Games / Chess");
    }

    #[test]
    fn test_path_stored_form() {
        let path = ForumPath::from_pairs([(0, "Phorum"), (3, "Games")]);
        assert_eq!(
            path.encode().unwrap(),
            r#"[{"id":0,"name":"Phorum"},{"id":3,"name":"Games"}]"#
        );
    }

    #[test]
    fn test_path_decode_blank_and_garbage() {
        assert!(ForumPath::decode("").unwrap().is_empty());
        assert!(ForumPath::decode("a:1:{i:0;}").is_err());
    }

    #[test]
    fn test_inheritance_mapping() {
        assert_eq!(Inheritance::from_field(None), Inheritance::None);
        assert_eq!(
            Inheritance::from_field(Some(&FieldValue::Null)),
            Inheritance::None
        );
        assert_eq!(
            Inheritance::from_field(Some(&FieldValue::Int(0))),
            Inheritance::Defaults
        );
        assert_eq!(
            Inheritance::from_field(Some(&FieldValue::from("12"))),
            Inheritance::Forum(12)
        );
        assert_eq!(Inheritance::Forum(5).to_field(), FieldValue::Int(5));
        assert!(!Inheritance::None.is_inheriting());
    }

    #[test]
    fn test_option_into_field_value() {
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(3i64)), FieldValue::Int(3));
    }
}
