//! The forum tree service.
//!
//! `ForumTree` owns a storage backend, the schema registry and the global
//! default settings. Its operations are spread over the `reader`, `writer`,
//! `path` and `order` modules.

use super::constants::DEFAULT_FORUM_OPTIONS;
use super::schema::Schema;
use super::store::{ForumStore, Row, SettingsStore};
use super::types::{FieldValue, NodeKind};
use crate::config::ForumConfig;
use crate::error::Result;
use tracing::debug;

/// Global default settings: the slave fields every node with
/// `inherit_id == 0` takes its settings from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSettings {
    fields: Row,
}

impl DefaultSettings {
    pub fn from_fields(fields: Row) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Returns true when no defaults have been saved yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Forum and folder tree over a storage backend.
#[derive(Debug)]
pub struct ForumTree<S> {
    pub(crate) store: S,
    pub(crate) schema: Schema,
    pub(crate) root_name: String,
    defaults: Option<DefaultSettings>,
}

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Creates a tree service. Default settings are loaded on first use.
    pub fn new(store: S, config: &ForumConfig) -> Self {
        Self {
            store,
            schema: Schema::new(config),
            root_name: config.title.clone(),
            defaults: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Name of the synthetic root node (id 0).
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// The global default settings, loading them on first access.
    pub fn defaults(&mut self) -> Result<&DefaultSettings> {
        if self.defaults.is_none() {
            self.reload_defaults()?;
        }
        Ok(&*self.defaults.get_or_insert_with(DefaultSettings::default))
    }

    /// Re-reads the global default settings from the settings store.
    ///
    /// Stored values are coerced through the forum schema so they match what
    /// the writer would have produced.
    pub fn reload_defaults(&mut self) -> Result<()> {
        let fields = match self.store.load_setting(DEFAULT_FORUM_OPTIONS)? {
            Some(row) => {
                let mut fields = Row::new();
                for spec in self.schema.slave_fields(NodeKind::Forum) {
                    if let Some(raw) = row.get(spec.name) {
                        fields.insert(spec.name.to_string(), spec.ty.coerce_stored(spec.name, raw));
                    }
                }
                fields
            }
            None => Row::new(),
        };

        debug!(fields = fields.len(), "Loaded default forum settings");
        self.defaults = Some(DefaultSettings::from_fields(fields));
        Ok(())
    }

    /// Consumes the service and returns the backend.
    pub fn into_store(self) -> S {
        self.store
    }
}
