//! Read side of the forum tree.

use super::record::{ForumMap, ForumRecord};
use super::store::{ForumQuery, ForumStore, SettingsStore};
use super::tree::ForumTree;
use super::types::ForumId;
use crate::error::Result;
use tracing::trace;

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Fetches the selected rows and coerces them into typed records, in
    /// display order.
    pub fn get(&self, query: &ForumQuery) -> Result<ForumMap> {
        let rows = self.store.fetch(query)?;
        trace!(query = ?query, rows = rows.len(), "Fetched forum rows");

        let mut map = ForumMap::new();
        for row in &rows {
            let (_, fields) = self.schema.coerce_row(row);
            map.push(ForumRecord::from_fields(fields));
        }
        Ok(map)
    }

    /// A single folder or forum.
    pub fn get_forum(&self, forum_id: ForumId) -> Result<Option<ForumRecord>> {
        Ok(self
            .get(&ForumQuery::Ids(vec![forum_id]))?
            .into_iter()
            .next())
    }

    /// Several nodes at once. Unknown ids are left out.
    pub fn get_forums(&self, forum_ids: &[ForumId]) -> Result<ForumMap> {
        self.get(&ForumQuery::Ids(forum_ids.to_vec()))
    }

    /// Direct children of a folder (0 for the top level).
    pub fn by_parent(&self, parent_id: ForumId) -> Result<ForumMap> {
        self.get(&ForumQuery::Parent(parent_id))
    }

    /// Alias for [`ForumTree::by_parent`].
    pub fn by_folder(&self, folder_id: ForumId) -> Result<ForumMap> {
        self.by_parent(folder_id)
    }

    /// Every node inside a vroot (0 for the main tree).
    pub fn by_vroot(&self, vroot: ForumId) -> Result<ForumMap> {
        self.get(&ForumQuery::Vroot(vroot))
    }

    /// Nodes that inherit their settings from `inherit_id` (0 for the
    /// global defaults).
    pub fn by_inheritance(&self, inherit_id: ForumId) -> Result<ForumMap> {
        self.get(&ForumQuery::InheritFrom(inherit_id))
    }

    pub fn all(&self) -> Result<ForumMap> {
        self.get(&ForumQuery::All)
    }
}
