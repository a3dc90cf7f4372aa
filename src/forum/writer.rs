//! Write side of the forum tree.
//!
//! A save merges the incoming data over the stored record, runs the schema
//! pass, applies settings inheritance and then stores the result. Tree shape
//! changes trigger a path update; changed slave settings of an inheritance
//! source are pushed to every node inheriting from it.
//!
//! Cascades are not transactional. When a cascaded save fails, the saves
//! that ran before it stay committed.

use super::constants::*;
use super::record::{ForumData, ForumRecord};
use super::schema::Schema;
use super::store::{ForumStore, Row, SettingsStore};
use super::tree::ForumTree;
use super::types::{FieldValue, ForumId, Inheritance, NodeKind, ROOT_ID};
use crate::error::{ForumError, Result};
use tracing::{debug, info};

/// What a save is aimed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveTarget {
    /// A folder or forum row.
    #[default]
    Node,
    /// The global default settings.
    Defaults,
}

/// Options for [`ForumTree::save_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveMode {
    /// Assemble and return the record without storing anything.
    pub prepare: bool,
    pub target: SaveTarget,
}

impl SaveMode {
    pub const NODE: SaveMode = SaveMode {
        prepare: false,
        target: SaveTarget::Node,
    };
    pub const PREPARE: SaveMode = SaveMode {
        prepare: true,
        target: SaveTarget::Node,
    };
    pub const DEFAULTS: SaveMode = SaveMode {
        prepare: false,
        target: SaveTarget::Defaults,
    };
    pub const PREPARE_DEFAULTS: SaveMode = SaveMode {
        prepare: true,
        target: SaveTarget::Defaults,
    };
}

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Creates or updates a folder or forum.
    ///
    /// `data` must carry a `forum_id`: NULL creates a node with a new id, an
    /// id updates that node or creates it when it does not exist yet. New
    /// nodes also need `folder_flag` and `name`.
    pub fn save(&mut self, data: ForumData) -> Result<ForumRecord> {
        self.save_with(data, SaveMode::NODE)
    }

    /// Runs every check of [`ForumTree::save`] and returns the assembled
    /// record without storing it.
    pub fn prepare(&mut self, data: ForumData) -> Result<ForumRecord> {
        self.save_with(data, SaveMode::PREPARE)
    }

    /// Updates the global default settings and re-saves every node that
    /// inherits from them. Only slave fields are kept.
    pub fn save_defaults(&mut self, data: ForumData) -> Result<ForumRecord> {
        self.save_with(data, SaveMode::DEFAULTS)
    }

    pub fn prepare_defaults(&mut self, data: ForumData) -> Result<ForumRecord> {
        self.save_with(data, SaveMode::PREPARE_DEFAULTS)
    }

    pub fn save_with(&mut self, data: ForumData, mode: SaveMode) -> Result<ForumRecord> {
        let defaults_mode = mode.target == SaveTarget::Defaults;
        let mut incoming = data.into_fields();

        let existing: Option<ForumRecord> = if defaults_mode {
            incoming.insert(FORUM_ID.to_string(), FieldValue::Null);
            incoming.insert(PARENT_ID.to_string(), FieldValue::Int(ROOT_ID));
            incoming.insert(INHERIT_ID.to_string(), FieldValue::Null);
            incoming.insert(FOLDER_FLAG.to_string(), FieldValue::Bool(false));
            incoming.insert(NAME.to_string(), FieldValue::from(DEFAULTS_RECORD_NAME));

            let defaults = self.defaults()?;
            (!defaults.is_empty()).then(|| ForumRecord::from_fields(defaults.fields().clone()))
        } else {
            let forum_id = requested_id(&incoming)?;
            incoming.remove(FORUM_PATH);
            match forum_id {
                Some(id) => self.get_forum(id)?,
                None => None,
            }
        };

        let mut merged: Row = existing
            .as_ref()
            .map(|record| record.fields().clone())
            .unwrap_or_default();
        merged.extend(incoming);

        let folder_flag = merged
            .get(FOLDER_FLAG)
            .map(FieldValue::truthy)
            .ok_or_else(|| ForumError::validation("missing field \"folder_flag\" in the data"))?;
        if !defaults_mode {
            if let Some(old) = &existing {
                if old.is_folder() != folder_flag {
                    return Err(ForumError::validation("the folder_flag cannot change"));
                }
            }
        }
        let kind = NodeKind::from_flag(folder_flag);

        let mut fields = self.schema.validate(kind, merged).map_err(ForumError::Schema)?;
        self.schema.fill_defaults(kind, &mut fields);

        let forum_id = fields.get(FORUM_ID).and_then(FieldValue::as_int);
        self.apply_inheritance(kind, forum_id, &mut fields)?;

        let missing = self.schema.missing(kind, &fields);
        if !missing.is_empty() {
            return Err(ForumError::Schema(missing));
        }

        if defaults_mode {
            fields = self.schema.slave_subset(kind, &fields);
        }

        if mode.prepare {
            if !defaults_mode {
                let vroot = self.check_placement(kind, &fields, existing.is_some())?;
                fields.insert(VROOT.to_string(), FieldValue::Int(vroot));
            }
            debug!(kind = %kind, defaults = defaults_mode, "Prepared forum data");
            return Ok(ForumRecord::from_fields(fields));
        }

        if defaults_mode {
            return self.store_defaults(fields);
        }

        self.store_node(kind, fields, existing)
    }

    /// Overlays the slave fields of the inheritance source onto `fields`.
    fn apply_inheritance(
        &mut self,
        kind: NodeKind,
        forum_id: Option<ForumId>,
        fields: &mut Row,
    ) -> Result<()> {
        let inheritance = Inheritance::from_field(fields.get(INHERIT_ID));

        // Single level only: a node others inherit from may not inherit itself.
        if inheritance.is_inheriting() {
            if let Some(id) = forum_id {
                let inheritors = self.by_inheritance(id)?;
                if !inheritors.is_empty() {
                    return Err(ForumError::validation(format!(
                        "forum {} cannot inherit settings, {} node(s) inherit from it",
                        id,
                        inheritors.len()
                    )));
                }
            }
        }

        let source: Row = match inheritance {
            Inheritance::None => return Ok(()),
            Inheritance::Defaults => self.defaults()?.fields().clone(),
            Inheritance::Forum(source_id) => {
                if forum_id == Some(source_id) {
                    return Err(ForumError::validation(format!(
                        "forum {} cannot inherit settings from itself",
                        source_id
                    )));
                }
                let source = self.get_forum(source_id)?.ok_or_else(|| {
                    ForumError::validation(format!("no forum found for inherit_id {}", source_id))
                })?;
                if source.is_folder() {
                    return Err(ForumError::validation(format!(
                        "inherit_id {} points to a folder instead of a forum. \
                         You can only inherit from forums",
                        source_id
                    )));
                }
                if source.inheritance().is_inheriting() {
                    return Err(ForumError::validation(format!(
                        "inherit_id {} points to a forum that inherits settings itself. \
                         Inherited inheritance is not allowed",
                        source_id
                    )));
                }
                source.into_fields()
            }
        };

        for (name, value) in source {
            if self.schema.is_slave(kind, &name) {
                fields.insert(name, value);
            }
        }
        Ok(())
    }

    fn store_defaults(&mut self, fields: Row) -> Result<ForumRecord> {
        self.store
            .store_setting(DEFAULT_FORUM_OPTIONS, &Schema::to_row(&fields)?)?;
        self.reload_defaults()?;

        let inheritors = self.by_inheritance(ROOT_ID)?;
        info!(
            fields = fields.len(),
            inheritors = inheritors.len(),
            "Saved default forum settings"
        );

        for child in inheritors {
            if let Some(id) = child.forum_id() {
                self.save(ForumData::existing(id))?;
            }
        }

        Ok(ForumRecord::from_fields(fields))
    }

    fn store_node(
        &mut self,
        kind: NodeKind,
        mut fields: Row,
        existing: Option<ForumRecord>,
    ) -> Result<ForumRecord> {
        let requested = fields.get(FORUM_ID).and_then(FieldValue::as_int);

        // Placement is checked before anything is written.
        let vroot = self.check_placement(kind, &fields, existing.is_some())?;
        fields.insert(VROOT.to_string(), FieldValue::Int(vroot));

        let row = Schema::to_row(&fields)?;
        let forum_id = match (requested, &existing) {
            (Some(id), Some(_)) => {
                self.store.update(id, row)?;
                id
            }
            _ => self.store.insert(row)?,
        };
        fields.insert(FORUM_ID.to_string(), FieldValue::Int(forum_id));

        let mut record = ForumRecord::from_fields(fields);

        let shape_changed = match &existing {
            None => true,
            Some(old) => {
                old.parent_id() != record.parent_id()
                    || old.vroot() != record.vroot()
                    || old.name() != record.name()
            }
        };
        if shape_changed {
            record = self.update_path(&record, existing.is_some())?;
        } else if let Some(path) = existing.as_ref().and_then(ForumRecord::forum_path) {
            record.set(FORUM_PATH, path.clone());
        }

        info!(
            forum_id = forum_id,
            kind = %kind,
            created = existing.is_none(),
            "Saved {}",
            kind
        );

        if let Some(old) = &existing {
            if !old.is_folder() && !old.inheritance().is_inheriting() {
                let changed = self
                    .schema
                    .slave_fields(kind)
                    .any(|spec| old.get(spec.name) != record.get(spec.name));
                if changed {
                    let inheritors = self.by_inheritance(forum_id)?;
                    debug!(
                        forum_id = forum_id,
                        inheritors = inheritors.len(),
                        "Cascading inherited settings"
                    );
                    for child in inheritors {
                        if let Some(id) = child.forum_id() {
                            self.save(ForumData::existing(id))?;
                        }
                    }
                }
            }
        }

        Ok(record)
    }
}

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Validates the parent and vroot of a node and returns the vroot it
    /// will be stored with. Reads only.
    fn check_placement(&self, kind: NodeKind, fields: &Row, exists: bool) -> Result<ForumId> {
        let requested = fields.get(FORUM_ID).and_then(FieldValue::as_int);
        let parent_id = fields.get(PARENT_ID).and_then(FieldValue::as_int).unwrap_or(ROOT_ID);
        let declared_vroot = fields.get(VROOT).and_then(FieldValue::as_int).unwrap_or(ROOT_ID);

        if let (Some(id), true) = (requested, exists) {
            self.check_not_ancestor(id, parent_id)?;
        }
        self.resolve_vroot(requested, kind, parent_id, declared_vroot)
    }
}

/// Reads the mandatory `forum_id` column: `None` for NULL, the id otherwise.
fn requested_id(incoming: &Row) -> Result<Option<ForumId>> {
    let value = incoming
        .get(FORUM_ID)
        .ok_or_else(|| ForumError::validation("missing field \"forum_id\" in the data"))?;
    if value.is_null() {
        return Ok(None);
    }
    match value.as_int() {
        Some(id) if id > 0 => Ok(Some(id)),
        _ => Err(ForumError::invalid_input(format!(
            "field \"forum_id\" must be NULL or a positive number, got \"{}\"",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForumConfig;
    use crate::forum::memory::MemoryForumStore;
    use crate::forum::schema::Violation;

    fn tree() -> ForumTree<MemoryForumStore> {
        ForumTree::new(MemoryForumStore::new(), &ForumConfig::default())
    }

    fn own_settings_forum(tree: &mut ForumTree<MemoryForumStore>, name: &str) -> ForumId {
        tree.save(ForumData::create_forum(name).inherit(Inheritance::None))
            .unwrap()
            .forum_id()
            .unwrap()
    }

    #[test]
    fn test_create_assigns_id_and_path() {
        let mut tree = tree();
        let folder = tree.save(ForumData::create_folder("Games")).unwrap();
        let folder_id = folder.forum_id().unwrap();
        let forum = tree
            .save(ForumData::create_forum("Chess").parent(folder_id))
            .unwrap();

        assert_eq!(forum.forum_path().unwrap().ids(), vec![0, folder_id, forum.forum_id().unwrap()]);
        assert_eq!(forum.int("read_length"), Some(10));
        assert_eq!(forum.str(TEMPLATE), Some("emerald"));
    }

    #[test]
    fn test_missing_forum_id() {
        let mut tree = tree();
        let data = ForumData::new().set(NAME, "x").set(FOLDER_FLAG, false);
        assert!(matches!(tree.save(data), Err(ForumError::Validation(_))));
    }

    #[test]
    fn test_bad_forum_id() {
        let mut tree = tree();
        let data = ForumData::new().set(FORUM_ID, "abc");
        assert!(matches!(tree.save(data), Err(ForumError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_folder_flag() {
        let mut tree = tree();
        let data = ForumData::create().name("x");
        assert!(matches!(tree.save(data), Err(ForumError::Validation(_))));
    }

    #[test]
    fn test_folder_flag_cannot_change() {
        let mut tree = tree();
        let id = own_settings_forum(&mut tree, "General");
        let err = tree
            .save(ForumData::existing(id).set(FOLDER_FLAG, true))
            .unwrap_err();
        assert!(err.to_string().contains("folder_flag cannot change"));
    }

    #[test]
    fn test_validation_collects_violations() {
        let mut tree = tree();
        let data = ForumData::create_forum("x")
            .set("bogus", 1)
            .set("read_length", "many");
        let err = tree.save(data).unwrap_err();
        assert_eq!(err.violations().len(), 2);
        assert_eq!(tree.store().forum_count(), 0);
    }

    #[test]
    fn test_missing_name() {
        let mut tree = tree();
        let err = tree
            .save(ForumData::create().set(FOLDER_FLAG, false))
            .unwrap_err();
        assert_eq!(err.violations(), &[Violation::Missing(NAME.to_string())]);
    }

    #[test]
    fn test_prepare_does_not_store() {
        let mut tree = tree();
        let record = tree.prepare(ForumData::create_forum("Draft")).unwrap();
        assert_eq!(record.name(), "Draft");
        assert_eq!(record.get(FORUM_ID), Some(&FieldValue::Null));
        assert_eq!(tree.store().forum_count(), 0);
    }

    #[test]
    fn test_explicit_new_id() {
        let mut tree = tree();
        let record = tree
            .save(ForumData::existing(40).set(FOLDER_FLAG, false).name("Forty"))
            .unwrap();
        assert_eq!(record.forum_id(), Some(40));
        assert!(tree.get_forum(40).unwrap().is_some());
    }

    #[test]
    fn test_forum_path_input_ignored() {
        let mut tree = tree();
        let record = tree
            .save(ForumData::create_forum("Chess").set(FORUM_PATH, "garbage"))
            .unwrap();
        assert_eq!(record.forum_path().unwrap().len(), 2);
    }

    #[test]
    fn test_inherit_overlays_slave_fields_only() {
        let mut tree = tree();
        let source = own_settings_forum(&mut tree, "Source");
        tree.save(
            ForumData::existing(source)
                .set("read_length", 50)
                .set(DESCRIPTION, "source description"),
        )
        .unwrap();

        let child = tree
            .save(
                ForumData::create_forum("Child")
                    .set("read_length", 5)
                    .set(DESCRIPTION, "mine")
                    .inherit(Inheritance::Forum(source)),
            )
            .unwrap();

        assert_eq!(child.int("read_length"), Some(50));
        assert_eq!(child.description(), "mine");
        assert_eq!(child.name(), "Child");
    }

    #[test]
    fn test_inheritance_source_errors() {
        let mut tree = tree();
        let folder = tree.save(ForumData::create_folder("Folder")).unwrap();
        let folder_id = folder.forum_id().unwrap();
        let inheriting = tree.save(ForumData::create_forum("Inheriting")).unwrap();
        let inheriting_id = inheriting.forum_id().unwrap();

        for source in [folder_id, inheriting_id, 999] {
            let result = tree.save(ForumData::create_forum("x").inherit(Inheritance::Forum(source)));
            assert!(matches!(result, Err(ForumError::Validation(_))), "source {}", source);
        }
    }

    #[test]
    fn test_inherit_from_self() {
        let mut tree = tree();
        let id = own_settings_forum(&mut tree, "Self");
        let result = tree.save(ForumData::existing(id).inherit(Inheritance::Forum(id)));
        assert!(result.is_err());
    }

    #[test]
    fn test_source_with_inheritors_cannot_inherit() {
        let mut tree = tree();
        let source = own_settings_forum(&mut tree, "Source");
        tree.save(ForumData::create_forum("Child").inherit(Inheritance::Forum(source)))
            .unwrap();

        let result = tree.save(ForumData::existing(source).inherit(Inheritance::Defaults));
        assert!(matches!(result, Err(ForumError::Validation(_))));
    }

    #[test]
    fn test_source_change_cascades() {
        let mut tree = tree();
        let source = own_settings_forum(&mut tree, "Source");
        let child = tree
            .save(ForumData::create_forum("Child").inherit(Inheritance::Forum(source)))
            .unwrap()
            .forum_id()
            .unwrap();

        tree.save(ForumData::existing(source).set(LANGUAGE, "dutch"))
            .unwrap();

        let child = tree.get_forum(child).unwrap().unwrap();
        assert_eq!(child.str(LANGUAGE), Some("dutch"));
    }

    #[test]
    fn test_defaults_cascade() {
        let mut tree = tree();
        let follower = tree.save(ForumData::create_forum("Follower")).unwrap();
        let follower_id = follower.forum_id().unwrap();
        let own = own_settings_forum(&mut tree, "Own");
        tree.save(ForumData::existing(own).set(LANGUAGE, "dutch"))
            .unwrap();

        let saved = tree
            .save_defaults(ForumData::new().set(LANGUAGE, "french"))
            .unwrap();
        assert!(saved.get(NAME).is_none());
        assert_eq!(saved.str(LANGUAGE), Some("french"));

        let follower = tree.get_forum(follower_id).unwrap().unwrap();
        assert_eq!(follower.str(LANGUAGE), Some("french"));
        let own = tree.get_forum(own).unwrap().unwrap();
        assert_eq!(own.str(LANGUAGE), Some("dutch"));
        assert_eq!(
            tree.defaults().unwrap().get(LANGUAGE),
            Some(&FieldValue::from("french"))
        );
    }

    #[test]
    fn test_defaults_merge_with_previous() {
        let mut tree = tree();
        tree.save_defaults(ForumData::new().set(LANGUAGE, "french"))
            .unwrap();
        tree.save_defaults(ForumData::new().set("read_length", 42))
            .unwrap();

        let defaults = tree.defaults().unwrap();
        assert_eq!(defaults.get(LANGUAGE), Some(&FieldValue::from("french")));
        assert_eq!(defaults.get("read_length"), Some(&FieldValue::Int(42)));
    }

    #[test]
    fn test_prepare_defaults_slave_only() {
        let mut tree = tree();
        let prepared = tree
            .prepare_defaults(ForumData::new().set("moderation", 1))
            .unwrap();
        assert!(prepared.fields().keys().all(|name| tree.schema().is_slave(NodeKind::Forum, name)));
        assert!(tree.store().load_setting(DEFAULT_FORUM_OPTIONS).unwrap().is_none());
    }

    #[test]
    fn test_parent_must_be_folder() {
        let mut tree = tree();
        let forum = own_settings_forum(&mut tree, "Leaf");
        let result = tree.save(ForumData::create_forum("Nested").parent(forum));
        assert!(matches!(result, Err(ForumError::Validation(_))));
        assert_eq!(tree.store().forum_count(), 1);
    }

    #[test]
    fn test_move_into_descendant_rejected() {
        let mut tree = tree();
        let outer = tree.save(ForumData::create_folder("Outer")).unwrap();
        let outer_id = outer.forum_id().unwrap();
        let inner = tree
            .save(ForumData::create_folder("Inner").parent(outer_id))
            .unwrap();
        let inner_id = inner.forum_id().unwrap();

        let result = tree.save(ForumData::existing(outer_id).parent(inner_id));
        assert!(matches!(result, Err(ForumError::Validation(_))));
        assert_eq!(tree.get_forum(outer_id).unwrap().unwrap().parent_id(), 0);
    }

    #[test]
    fn test_rename_updates_descendant_paths() {
        let mut tree = tree();
        let folder = tree.save(ForumData::create_folder("Games")).unwrap();
        let folder_id = folder.forum_id().unwrap();
        let forum = tree
            .save(ForumData::create_forum("Chess").parent(folder_id))
            .unwrap();

        tree.save(ForumData::existing(folder_id).name("Board games"))
            .unwrap();

        let forum = tree.get_forum(forum.forum_id().unwrap()).unwrap().unwrap();
        let names: Vec<_> = forum
            .forum_path()
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["Phorum", "Board games", "Chess"]);
    }

    #[test]
    fn test_vroot_folder() {
        let mut tree = tree();
        let folder = tree.save(ForumData::create_folder("Site")).unwrap();
        let site = folder.forum_id().unwrap();
        let folder = tree.save(ForumData::existing(site).vroot(site)).unwrap();
        assert!(folder.is_vroot());

        let forum = tree
            .save(ForumData::create_forum("Local").parent(site))
            .unwrap();
        assert_eq!(forum.vroot(), site);
        assert_eq!(forum.forum_path().unwrap().ids(), vec![site, forum.forum_id().unwrap()]);
    }

    #[test]
    fn test_prepare_resolves_vroot() {
        let mut tree = tree();
        let site = tree
            .save(ForumData::create_folder("Site"))
            .unwrap()
            .forum_id()
            .unwrap();
        tree.save(ForumData::existing(site).vroot(site)).unwrap();

        let data = ForumData::create_forum("Local").parent(site);
        let prepared = tree.prepare(data.clone()).unwrap();
        let saved = tree.save(data).unwrap();
        let read = tree.get_forum(saved.forum_id().unwrap()).unwrap().unwrap();

        assert_eq!(prepared.vroot(), site);
        assert_eq!(prepared.vroot(), read.vroot());
    }

    #[test]
    fn test_prepare_checks_placement() {
        let mut tree = tree();
        let forum = own_settings_forum(&mut tree, "General");
        let err = tree
            .prepare(ForumData::create_forum("Nested").parent(forum))
            .unwrap_err();
        assert!(matches!(err, ForumError::Validation(_)));
        assert_eq!(tree.store().forum_count(), 1);
    }

    #[test]
    fn test_failed_cascade_keeps_earlier_saves() {
        let mut tree = tree();
        let first = tree.save(ForumData::create_forum("First")).unwrap();
        let second = tree.save(ForumData::create_forum("Second")).unwrap();

        // A stored row whose parent no longer exists.
        let mut broken = Row::new();
        broken.insert(FORUM_ID.into(), FieldValue::Int(3));
        broken.insert(FOLDER_FLAG.into(), FieldValue::Bool(false));
        broken.insert(PARENT_ID.into(), FieldValue::Int(99));
        broken.insert(NAME.into(), FieldValue::from("Orphan"));
        broken.insert(INHERIT_ID.into(), FieldValue::Int(0));
        tree.store().insert(broken).unwrap();

        let result = tree.save_defaults(ForumData::new().set(LANGUAGE, "dutch"));
        assert!(matches!(result, Err(ForumError::Validation(_))));

        assert_eq!(
            tree.defaults().unwrap().get(LANGUAGE),
            Some(&FieldValue::from("dutch"))
        );
        for id in [first.forum_id().unwrap(), second.forum_id().unwrap()] {
            let record = tree.get_forum(id).unwrap().unwrap();
            assert_eq!(record.str(LANGUAGE), Some("dutch"));
        }
        assert_eq!(tree.get_forum(3).unwrap().unwrap().get(LANGUAGE), None);
    }

    #[test]
    fn test_unchanged_shape_keeps_path() {
        let mut tree = tree();
        let forum = tree.save(ForumData::create_forum("Chess")).unwrap();
        let id = forum.forum_id().unwrap();
        let updated = tree
            .save(ForumData::existing(id).set(DESCRIPTION, "64 squares"))
            .unwrap();
        assert_eq!(updated.forum_path(), forum.forum_path());
    }
}
