//! Field schema registry for folders and forums.
//!
//! Every column a folder or forum may carry is declared here with its
//! primitive type, its default value and its role:
//!
//! - **master** fields are intrinsic to the node and always come from its own
//!   configuration (name, parent, ordering, statistics, ...)
//! - **slave** fields are display and behaviour settings that are overwritten
//!   by the inheritance source when `inherit_id` is set
//!
//! Folders carry a small subset of the forum fields. The registry is used
//! by the reader to coerce raw rows and by the writer for its validation pass.

use super::constants::*;
use super::store::Row;
use super::types::{FieldValue, ForumPath, NodeKind};
use crate::config::ForumConfig;
use crate::error::Result;
use std::fmt;
use tracing::warn;

/// Role of a field with respect to settings inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Always determined by the node's own configuration.
    Master,
    /// Overridden by the inheritance source when one is configured.
    Slave,
}

/// Declared primitive type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    String,
    Bool,
    /// Serialized collection; only used for `forum_path`.
    Path,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::String => write!(f, "string"),
            FieldType::Bool => write!(f, "bool"),
            FieldType::Path => write!(f, "path"),
        }
    }
}

impl FieldType {
    /// Strict coercion used when saving. Returns `None` when the value cannot
    /// represent this type. NULL handling is up to the caller.
    pub fn coerce(&self, value: &FieldValue) -> Option<FieldValue> {
        match (self, value) {
            (FieldType::Int, v) => v.as_int().map(FieldValue::Int),
            (FieldType::String, FieldValue::Str(s)) => Some(FieldValue::Str(s.trim().to_string())),
            (FieldType::String, FieldValue::Int(v)) => Some(FieldValue::Str(v.to_string())),
            (FieldType::String, FieldValue::Bool(b)) => {
                Some(FieldValue::Str(if *b { "1" } else { "" }.to_string()))
            }
            (FieldType::String, _) => None,
            (FieldType::Bool, FieldValue::Path(_)) => None,
            (FieldType::Bool, v) => Some(FieldValue::Bool(v.truthy())),
            (FieldType::Path, FieldValue::Path(p)) => Some(FieldValue::Path(p.clone())),
            (FieldType::Path, FieldValue::Str(s)) => ForumPath::decode(s).ok().map(FieldValue::Path),
            (FieldType::Path, _) => None,
        }
    }

    /// Lenient coercion used when reading stored rows. Never fails; values
    /// that make no sense for the type collapse to the type's zero value.
    pub fn coerce_stored(&self, field: &str, value: &FieldValue) -> FieldValue {
        match self {
            FieldType::Int => match value {
                FieldValue::Null => FieldValue::Null,
                v => FieldValue::Int(v.as_int().unwrap_or(0)),
            },
            FieldType::String => match value {
                FieldValue::Str(s) => FieldValue::Str(s.clone()),
                FieldValue::Int(v) => FieldValue::Str(v.to_string()),
                FieldValue::Bool(true) => FieldValue::Str("1".to_string()),
                _ => FieldValue::Str(String::new()),
            },
            FieldType::Bool => FieldValue::Bool(value.truthy()),
            FieldType::Path => match value {
                FieldValue::Path(p) => FieldValue::Path(p.clone()),
                FieldValue::Str(raw) => match ForumPath::decode(raw) {
                    Ok(path) => FieldValue::Path(path),
                    Err(e) => {
                        warn!(field = field, error = %e, "Unreadable stored path, using empty path");
                        FieldValue::Path(ForumPath::new())
                    }
                },
                _ => FieldValue::Path(ForumPath::new()),
            },
        }
    }
}

/// A single field level problem found while validating record data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The field does not exist for this kind of node.
    UnknownField(String),
    /// The value cannot be coerced to the declared type.
    IllegalType {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    /// NULL was given for a field that does not accept it.
    IllegalNull(String),
    /// The field has no value, no default and was not inherited.
    Missing(String),
}

impl Violation {
    /// Name of the field the violation is about.
    pub fn field(&self) -> &str {
        match self {
            Violation::UnknownField(f) | Violation::IllegalNull(f) | Violation::Missing(f) => f,
            Violation::IllegalType { field, .. } => field,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnknownField(field) => write!(f, "illegal field name \"{}\"", field),
            Violation::IllegalType {
                field,
                expected,
                found,
            } => write!(
                f,
                "field \"{}\" expects {} but got {}",
                field, expected, found
            ),
            Violation::IllegalNull(field) => write!(f, "field \"{}\" cannot be NULL", field),
            Violation::Missing(field) => write!(f, "missing field \"{}\"", field),
        }
    }
}

/// Declaration of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
    pub ty: FieldType,
    /// Value filled in when the field is absent. `None` means required.
    pub default: Option<FieldValue>,
    /// Generated by the tree code; never required from callers.
    pub generated: bool,
    /// Accepts NULL.
    pub nullable: bool,
}

impl FieldSpec {
    pub fn is_slave(&self) -> bool {
        self.role == FieldRole::Slave
    }
}

// Static declarations. Template and language defaults come from the config,
// so the tables describe them symbolically.
#[derive(Clone, Copy)]
enum DefaultSpec {
    Required,
    Generated,
    Int(i64),
    Bool(bool),
    Str(&'static str),
    Template,
    Language,
}

struct FieldDef(&'static str, FieldRole, FieldType, DefaultSpec, bool);

const fn m(name: &'static str, ty: FieldType, default: DefaultSpec) -> FieldDef {
    FieldDef(name, FieldRole::Master, ty, default, false)
}

const fn s(name: &'static str, ty: FieldType, default: DefaultSpec) -> FieldDef {
    FieldDef(name, FieldRole::Slave, ty, default, false)
}

const fn nullable(def: FieldDef) -> FieldDef {
    FieldDef(def.0, def.1, def.2, def.3, true)
}

use DefaultSpec::{Bool as B, Int as I, Str as S};
use FieldType::{Bool, Int, Path, String as Text};

const FOLDER_FIELDS: &[FieldDef] = &[
    nullable(m(FORUM_ID, Int, DefaultSpec::Required)),
    m(FOLDER_FLAG, Bool, B(true)),
    m(PARENT_ID, Int, I(0)),
    m(NAME, Text, DefaultSpec::Required),
    m(DESCRIPTION, Text, S("")),
    m(ACTIVE, Bool, B(true)),
    m(FORUM_PATH, Path, DefaultSpec::Generated),
    m(DISPLAY_ORDER, Int, I(0)),
    m(VROOT, Int, I(0)),
    m(CACHE_VERSION, Int, I(0)),
    nullable(m(INHERIT_ID, Int, I(0))),
    // Display settings.
    s(TEMPLATE, Text, DefaultSpec::Template),
    s(LANGUAGE, Text, DefaultSpec::Language),
];

const FORUM_FIELDS: &[FieldDef] = &[
    nullable(m(FORUM_ID, Int, DefaultSpec::Required)),
    m(FOLDER_FLAG, Bool, B(false)),
    m(PARENT_ID, Int, I(0)),
    m(NAME, Text, DefaultSpec::Required),
    m(DESCRIPTION, Text, S("")),
    m(ACTIVE, Bool, B(true)),
    m(FORUM_PATH, Path, DefaultSpec::Generated),
    m(DISPLAY_ORDER, Int, I(0)),
    m(VROOT, Int, I(0)),
    m(CACHE_VERSION, Int, I(0)),
    nullable(m(INHERIT_ID, Int, I(0))),
    // Display settings.
    s("display_fixed", Bool, B(false)),
    s(TEMPLATE, Text, DefaultSpec::Template),
    s(LANGUAGE, Text, DefaultSpec::Language),
    s("reverse_threading", Bool, B(false)),
    s("float_to_top", Bool, B(true)),
    s("threaded_list", Int, I(0)),
    s("list_length_flat", Int, I(30)),
    s("list_length_threaded", Int, I(15)),
    s("threaded_read", Int, I(0)),
    s("read_length", Int, I(10)),
    s("display_ip_address", Bool, B(false)),
    // Posting settings.
    s("check_duplicate", Bool, B(true)),
    // Statistics and statistics settings.
    m("message_count", Int, I(0)),
    m("thread_count", Int, I(0)),
    m("sticky_count", Int, I(0)),
    m("last_post_time", Int, I(0)),
    s("count_views", Bool, B(true)),
    s("count_views_per_thread", Bool, B(false)),
    // Permission settings.
    s("moderation", Int, I(0)),
    s("email_moderators", Bool, B(true)),
    s("allow_email_notify", Bool, B(true)),
    s("pub_perms", Int, I(USER_ALLOW_READ)),
    s(
        "reg_perms",
        Int,
        I(USER_ALLOW_READ | USER_ALLOW_REPLY | USER_ALLOW_EDIT | USER_ALLOW_NEW_TOPIC),
    ),
    // Attachment settings.
    s("allow_attachment_types", Text, S("")),
    s("max_attachment_size", Int, I(0)),
    s("max_totalattachment_size", Int, I(0)),
    s("max_attachments", Int, I(0)),
];

/// Materialized field registry for both node kinds.
#[derive(Debug, Clone)]
pub struct Schema {
    folder: Vec<FieldSpec>,
    forum: Vec<FieldSpec>,
}

impl Schema {
    /// Builds the registry, taking template and language defaults from the
    /// configuration.
    pub fn new(config: &ForumConfig) -> Self {
        let build = |defs: &[FieldDef]| -> Vec<FieldSpec> {
            defs.iter()
                .map(|FieldDef(name, role, ty, default, nullable)| {
                    let default_value = match default {
                        DefaultSpec::Required | DefaultSpec::Generated => None,
                        DefaultSpec::Int(v) => Some(FieldValue::Int(*v)),
                        DefaultSpec::Bool(b) => Some(FieldValue::Bool(*b)),
                        DefaultSpec::Str(s) => Some(FieldValue::Str(s.to_string())),
                        DefaultSpec::Template => Some(FieldValue::Str(config.default_template.clone())),
                        DefaultSpec::Language => Some(FieldValue::Str(config.default_language.clone())),
                    };
                    FieldSpec {
                        name: *name,
                        role: *role,
                        ty: *ty,
                        default: default_value,
                        generated: matches!(default, DefaultSpec::Generated),
                        nullable: *nullable,
                    }
                })
                .collect()
        };

        Self {
            folder: build(FOLDER_FIELDS),
            forum: build(FORUM_FIELDS),
        }
    }

    /// All fields for a node kind, in declaration order.
    pub fn fields(&self, kind: NodeKind) -> &[FieldSpec] {
        match kind {
            NodeKind::Folder => &self.folder,
            NodeKind::Forum => &self.forum,
        }
    }

    pub fn field(&self, kind: NodeKind, name: &str) -> Option<&FieldSpec> {
        self.fields(kind).iter().find(|spec| spec.name == name)
    }

    /// Returns true if `name` is a slave field for this kind.
    pub fn is_slave(&self, kind: NodeKind, name: &str) -> bool {
        self.field(kind, name).is_some_and(FieldSpec::is_slave)
    }

    pub fn slave_fields(&self, kind: NodeKind) -> impl Iterator<Item = &FieldSpec> {
        self.fields(kind).iter().filter(|spec| spec.is_slave())
    }

    /// Validation pass over incoming record data.
    ///
    /// Checks every field name against the schema, coerces each value to its
    /// declared type and collects all violations instead of stopping at the
    /// first one. Generated fields are dropped from the result.
    pub fn validate(&self, kind: NodeKind, data: Row) -> std::result::Result<Row, Vec<Violation>> {
        let mut coerced = Row::new();
        let mut violations = Vec::new();

        for (name, value) in data {
            let Some(spec) = self.field(kind, &name) else {
                violations.push(Violation::UnknownField(name));
                continue;
            };
            if spec.generated {
                continue;
            }

            if value.is_null() {
                if spec.nullable {
                    coerced.insert(name, FieldValue::Null);
                } else if spec.ty == FieldType::Bool {
                    coerced.insert(name, FieldValue::Bool(false));
                } else {
                    violations.push(Violation::IllegalNull(name));
                }
                continue;
            }

            match spec.ty.coerce(&value) {
                Some(v) => {
                    coerced.insert(name, v);
                }
                None => violations.push(Violation::IllegalType {
                    field: name,
                    expected: spec.ty,
                    found: value.type_name(),
                }),
            }
        }

        if violations.is_empty() {
            Ok(coerced)
        } else {
            Err(violations)
        }
    }

    /// Fills absent fields that have a schema default.
    pub fn fill_defaults(&self, kind: NodeKind, fields: &mut Row) {
        for spec in self.fields(kind) {
            if let Some(default) = &spec.default {
                fields
                    .entry(spec.name.to_string())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    /// Lists required fields that are still absent.
    pub fn missing(&self, kind: NodeKind, fields: &Row) -> Vec<Violation> {
        self.fields(kind)
            .iter()
            .filter(|spec| !spec.generated && !fields.contains_key(spec.name))
            .map(|spec| Violation::Missing(spec.name.to_string()))
            .collect()
    }

    /// Keeps only the slave fields of `fields`.
    pub fn slave_subset(&self, kind: NodeKind, fields: &Row) -> Row {
        fields
            .iter()
            .filter(|(name, _)| self.is_slave(kind, name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Coerces a raw stored row into typed record fields.
    ///
    /// The kind is taken from the row's `folder_flag`. Columns the kind does
    /// not declare are dropped; declared columns absent from the row are left
    /// out.
    pub fn coerce_row(&self, row: &Row) -> (NodeKind, Row) {
        let kind = NodeKind::from_flag(row.get(FOLDER_FLAG).is_some_and(FieldValue::truthy));

        let mut fields = Row::new();
        fields.insert(FOLDER_FLAG.to_string(), FieldValue::Bool(kind.is_folder()));

        for spec in self.fields(kind) {
            if spec.name == FOLDER_FLAG {
                continue;
            }
            if let Some(raw) = row.get(spec.name) {
                fields.insert(spec.name.to_string(), spec.ty.coerce_stored(spec.name, raw));
            }
        }

        (kind, fields)
    }

    /// Converts typed record fields into a storage row. Path values are
    /// serialized to strings.
    pub fn to_row(fields: &Row) -> Result<Row> {
        fields
            .iter()
            .map(|(name, value)| {
                let stored = match value {
                    FieldValue::Path(path) => FieldValue::Str(path.encode()?),
                    other => other.clone(),
                };
                Ok((name.clone(), stored))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(&ForumConfig::default())
    }

    fn row(pairs: &[(&str, FieldValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_folder_is_subset_of_forum() {
        let schema = schema();
        for spec in schema.fields(NodeKind::Folder) {
            if spec.name == FOLDER_FLAG {
                continue;
            }
            let forum_spec = schema.field(NodeKind::Forum, spec.name).unwrap();
            assert_eq!(forum_spec.role, spec.role, "{}", spec.name);
            assert_eq!(forum_spec.ty, spec.ty, "{}", spec.name);
        }
    }

    #[test]
    fn test_defaults_follow_config() {
        let config = ForumConfig {
            default_template: "lightweight".into(),
            ..ForumConfig::default()
        };
        let schema = Schema::new(&config);
        let spec = schema.field(NodeKind::Forum, TEMPLATE).unwrap();
        assert_eq!(spec.default, Some(FieldValue::from("lightweight")));
        assert!(spec.is_slave());
    }

    #[test]
    fn test_reg_perms_default() {
        let schema = schema();
        let spec = schema.field(NodeKind::Forum, "reg_perms").unwrap();
        assert_eq!(spec.default, Some(FieldValue::Int(15)));
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let schema = schema();
        let data = row(&[
            (NAME, FieldValue::Null),
            ("read_length", FieldValue::from("ten")),
            ("no_such_field", FieldValue::Int(1)),
        ]);

        let violations = schema.validate(NodeKind::Forum, data).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations.contains(&Violation::IllegalNull(NAME.into())));
        assert!(violations.contains(&Violation::UnknownField("no_such_field".into())));
        assert!(violations.iter().any(|v| v.field() == "read_length"));
    }

    #[test]
    fn test_validate_null_handling() {
        let schema = schema();
        let data = row(&[
            (INHERIT_ID, FieldValue::Null),
            ("display_fixed", FieldValue::Null),
            ("read_length", FieldValue::Null),
            (DESCRIPTION, FieldValue::Null),
        ]);

        let violations = schema.validate(NodeKind::Forum, data).unwrap_err();
        assert_eq!(
            violations,
            vec![
                Violation::IllegalNull(DESCRIPTION.into()),
                Violation::IllegalNull("read_length".into()),
            ]
        );

        let data = row(&[
            (INHERIT_ID, FieldValue::Null),
            ("display_fixed", FieldValue::Null),
        ]);
        let fields = schema.validate(NodeKind::Forum, data).unwrap();
        assert_eq!(fields[INHERIT_ID], FieldValue::Null);
        assert_eq!(fields["display_fixed"], FieldValue::Bool(false));
    }

    #[test]
    fn test_validate_rejects_forum_field_on_folder() {
        let schema = schema();
        let data = row(&[("read_length", FieldValue::Int(5))]);
        let violations = schema.validate(NodeKind::Folder, data).unwrap_err();
        assert_eq!(
            violations,
            vec![Violation::UnknownField("read_length".into())]
        );
    }

    #[test]
    fn test_validate_coerces() {
        let schema = schema();
        let data = row(&[
            (NAME, FieldValue::from("  General  ")),
            (ACTIVE, FieldValue::from("0")),
            (PARENT_ID, FieldValue::from("12")),
            (INHERIT_ID, FieldValue::Null),
            ("check_duplicate", FieldValue::Null),
            (FORUM_PATH, FieldValue::from("ignored")),
        ]);

        let fields = schema.validate(NodeKind::Forum, data).unwrap();
        assert_eq!(fields[NAME], FieldValue::from("General"));
        assert_eq!(fields[ACTIVE], FieldValue::Bool(false));
        assert_eq!(fields[PARENT_ID], FieldValue::Int(12));
        assert_eq!(fields[INHERIT_ID], FieldValue::Null);
        assert_eq!(fields["check_duplicate"], FieldValue::Bool(false));
        assert!(!fields.contains_key(FORUM_PATH));
    }

    #[test]
    fn test_missing_ignores_generated() {
        let schema = schema();
        let mut fields = row(&[(FORUM_ID, FieldValue::Null)]);
        schema.fill_defaults(NodeKind::Folder, &mut fields);
        let missing = schema.missing(NodeKind::Folder, &fields);
        assert_eq!(missing, vec![Violation::Missing(NAME.into())]);
    }

    #[test]
    fn test_coerce_row_uses_folder_flag() {
        let schema = schema();
        let raw = row(&[
            (FORUM_ID, FieldValue::from("4")),
            (FOLDER_FLAG, FieldValue::Int(1)),
            (NAME, FieldValue::from("Games")),
            (ACTIVE, FieldValue::Int(0)),
            ("read_length", FieldValue::Int(10)),
            (FORUM_PATH, FieldValue::from("[{\"id\":0,\"name\":\"Phorum\"}]")),
        ]);

        let (kind, fields) = schema.coerce_row(&raw);
        assert_eq!(kind, NodeKind::Folder);
        assert_eq!(fields[FORUM_ID], FieldValue::Int(4));
        assert_eq!(fields[ACTIVE], FieldValue::Bool(false));
        assert!(!fields.contains_key("read_length"));
        assert_eq!(fields[FORUM_PATH].as_path().unwrap().ids(), vec![0]);
    }

    #[test]
    fn test_to_row_encodes_paths() {
        let fields = row(&[(
            FORUM_PATH,
            FieldValue::Path(ForumPath::from_pairs([(0, "Phorum")])),
        )]);
        let stored = Schema::to_row(&fields).unwrap();
        assert!(matches!(stored[FORUM_PATH], FieldValue::Str(_)));
    }

    #[test]
    fn test_slave_subset() {
        let schema = schema();
        let fields = row(&[
            (NAME, FieldValue::from("x")),
            (TEMPLATE, FieldValue::from("t")),
            ("moderation", FieldValue::Int(1)),
        ]);
        let subset = schema.slave_subset(NodeKind::Forum, &fields);
        assert_eq!(subset.len(), 2);
        assert!(!subset.contains_key(NAME));
    }
}
