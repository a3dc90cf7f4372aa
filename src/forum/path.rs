//! Vroot resolution and materialized path maintenance.
//!
//! Every node caches the chain of ancestors that leads to it in its
//! `forum_path` column. The chain starts at the synthetic root (id 0) or at
//! the vroot folder the node lives in, and ends at the node itself.

use super::constants::{FORUM_PATH, MAX_TREE_DEPTH, VROOT};
use super::record::ForumRecord;
use super::store::{ForumStore, Row, SettingsStore};
use super::tree::ForumTree;
use super::types::{FieldValue, ForumId, ForumPath, NodeKind, ROOT_ID};
use crate::error::{ForumError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// The columns a path walk needs from each node.
#[derive(Debug, Clone)]
struct PathNode {
    id: ForumId,
    name: String,
    parent_id: ForumId,
    vroot: ForumId,
}

impl PathNode {
    fn root(name: &str) -> Self {
        Self {
            id: ROOT_ID,
            name: name.to_string(),
            parent_id: ROOT_ID,
            vroot: ROOT_ID,
        }
    }

    fn from_record(record: &ForumRecord, id: ForumId) -> Self {
        Self {
            id,
            name: record.name().to_string(),
            parent_id: record.parent_id(),
            vroot: record.vroot(),
        }
    }
}

/// Walks parent links upward from `start` until the root or a vroot is
/// reached, and returns the path root first.
fn walk_path<F>(start: PathNode, root_name: &str, mut lookup: F) -> Result<ForumPath>
where
    F: FnMut(ForumId) -> Result<Option<PathNode>>,
{
    let mut path = ForumPath::new();
    let mut visited = HashSet::new();
    let mut node = start;

    loop {
        if !visited.insert(node.id) {
            return Err(ForumError::validation(format!(
                "Parent cycle detected at forum {}",
                node.id
            )));
        }
        if visited.len() > MAX_TREE_DEPTH {
            return Err(ForumError::validation(format!(
                "Path for forum {} exceeds {} levels",
                path.first().map_or(node.id, |e| e.id),
                MAX_TREE_DEPTH
            )));
        }

        path.push(node.id, node.name.clone());

        if node.id == ROOT_ID || node.vroot == node.id {
            break;
        }

        node = if node.parent_id == ROOT_ID {
            PathNode::root(root_name)
        } else {
            let child = node.id;
            lookup(node.parent_id)?.ok_or_else(|| {
                ForumError::validation(format!(
                    "Forum {} has parent_id {} which does not exist",
                    child, node.parent_id
                ))
            })?
        };
    }

    path.reverse();
    Ok(path)
}

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Checks the placement of a node and returns the vroot it belongs in.
    ///
    /// The parent must be the root or an existing folder. A folder whose
    /// declared vroot equals its own id is a vroot; every other node takes
    /// the vroot of its parent. A non-zero vroot must be an existing folder
    /// set up as a vroot.
    pub(crate) fn resolve_vroot(
        &self,
        forum_id: Option<ForumId>,
        kind: NodeKind,
        parent_id: ForumId,
        declared_vroot: ForumId,
    ) -> Result<ForumId> {
        if forum_id == Some(parent_id) && parent_id != ROOT_ID {
            return Err(ForumError::validation(format!(
                "Forum {} cannot be its own parent",
                parent_id
            )));
        }

        let parent_vroot = if parent_id == ROOT_ID {
            ROOT_ID
        } else {
            let parent = self.get_forum(parent_id)?.ok_or_else(|| {
                ForumError::validation(format!(
                    "parent_id {} points to a folder that does not exist",
                    parent_id
                ))
            })?;
            if !parent.is_folder() {
                return Err(ForumError::validation(format!(
                    "parent_id {} does not point to a folder. \
                     You can only put forums/folders inside folders",
                    parent_id
                )));
            }
            parent.vroot()
        };

        let self_vroot = kind.is_folder() && forum_id.is_some_and(|id| id == declared_vroot);
        if self_vroot {
            return Ok(declared_vroot);
        }

        if parent_vroot != ROOT_ID {
            let vroot = self.get_forum(parent_vroot)?.ok_or_else(|| {
                ForumError::validation(format!(
                    "vroot {} points to a folder that does not exist",
                    parent_vroot
                ))
            })?;
            if !vroot.is_folder() {
                return Err(ForumError::validation(format!(
                    "vroot {} does not point to a folder. Only folders can be vroots",
                    parent_vroot
                )));
            }
            if !vroot.is_vroot() {
                return Err(ForumError::validation(format!(
                    "vroot {} points to a folder that is not setup as a vroot folder",
                    parent_vroot
                )));
            }
        }

        Ok(parent_vroot)
    }

    /// Fails if moving `forum_id` below `parent_id` would make the node its
    /// own ancestor.
    pub(crate) fn check_not_ancestor(&self, forum_id: ForumId, parent_id: ForumId) -> Result<()> {
        let mut current = parent_id;
        let mut steps = 0;

        while current != ROOT_ID {
            if current == forum_id {
                return Err(ForumError::validation(format!(
                    "Moving forum {} into {} would create a parent cycle",
                    forum_id, parent_id
                )));
            }
            steps += 1;
            if steps > MAX_TREE_DEPTH {
                return Err(ForumError::validation(format!(
                    "Ancestors of forum {} exceed {} levels",
                    parent_id, MAX_TREE_DEPTH
                )));
            }
            current = match self.get_forum(current)? {
                Some(node) => node.parent_id(),
                None => break,
            };
        }
        Ok(())
    }

    /// Recomputes and stores the vroot and path of a node.
    ///
    /// With `recurse` set, a folder also updates everything below it. The
    /// returned record carries the new vroot and path.
    pub fn update_path(&self, record: &ForumRecord, recurse: bool) -> Result<ForumRecord> {
        let mut updated = 0;
        self.update_path_at(record, recurse, 0, &mut updated)
    }

    fn update_path_at(
        &self,
        record: &ForumRecord,
        recurse: bool,
        depth: usize,
        updated: &mut usize,
    ) -> Result<ForumRecord> {
        let forum_id = record.forum_id().ok_or_else(|| {
            ForumError::validation("Cannot update the path of a node without a forum_id")
        })?;
        if depth > MAX_TREE_DEPTH {
            return Err(ForumError::validation(format!(
                "Folder nesting below forum {} exceeds {} levels",
                forum_id, MAX_TREE_DEPTH
            )));
        }

        let vroot = self.resolve_vroot(Some(forum_id), record.kind(), record.parent_id(), record.vroot())?;

        let mut start = PathNode::from_record(record, forum_id);
        start.vroot = vroot;
        let path = walk_path(start, &self.root_name, |id| {
            Ok(self
                .get_forum(id)?
                .map(|node| PathNode::from_record(&node, id)))
        })?;

        let mut changes = Row::new();
        changes.insert(VROOT.to_string(), FieldValue::Int(vroot));
        changes.insert(FORUM_PATH.to_string(), FieldValue::Str(path.encode()?));
        self.store.update(forum_id, changes)?;
        *updated += 1;

        debug!(forum_id = forum_id, vroot = vroot, path = %path, "Updated forum path");

        let mut result = record.clone();
        result.set(VROOT, vroot);
        result.set(FORUM_PATH, path);

        if result.is_folder() && recurse {
            for child in self.by_parent(forum_id)? {
                self.update_path_at(&child, true, depth + 1, updated)?;
            }
        }

        Ok(result)
    }

    /// Builds the path of a single node from the stored tree.
    ///
    /// Returns the root-only path for id 0 and `None` for unknown ids.
    pub fn build_path(&self, forum_id: ForumId) -> Result<Option<ForumPath>> {
        let start = if forum_id == ROOT_ID {
            PathNode::root(&self.root_name)
        } else {
            match self.get_forum(forum_id)? {
                Some(record) => PathNode::from_record(&record, forum_id),
                None => return Ok(None),
            }
        };

        let path = walk_path(start, &self.root_name, |id| {
            Ok(self
                .get_forum(id)?
                .map(|node| PathNode::from_record(&node, id)))
        })?;
        Ok(Some(path))
    }

    /// Builds the paths of every node, including the synthetic root, from a
    /// single fetch of the tree.
    pub fn build_all_paths(&self) -> Result<BTreeMap<ForumId, ForumPath>> {
        let nodes: HashMap<ForumId, PathNode> = self
            .all()?
            .iter()
            .filter_map(|record| {
                record
                    .forum_id()
                    .map(|id| (id, PathNode::from_record(record, id)))
            })
            .collect();

        let mut paths = BTreeMap::new();
        paths.insert(
            ROOT_ID,
            walk_path(PathNode::root(&self.root_name), &self.root_name, |_| Ok(None))?,
        );
        for (id, node) in &nodes {
            let path = walk_path(node.clone(), &self.root_name, |parent| {
                Ok(nodes.get(&parent).cloned())
            })?;
            paths.insert(*id, path);
        }
        Ok(paths)
    }

    /// Recomputes and stores the vroot and path of every node reachable from
    /// the root. Returns the number of nodes updated.
    pub fn rebuild_all_paths(&self) -> Result<usize> {
        let mut updated = 0;
        for top in self.by_parent(ROOT_ID)? {
            self.update_path_at(&top, true, 0, &mut updated)?;
        }
        info!(updated = updated, "Rebuilt forum paths");
        Ok(updated)
    }
}
