//! Display order of the nodes inside a folder.

use super::constants::DISPLAY_ORDER;
use super::store::{ForumStore, Row, SettingsStore};
use super::tree::ForumTree;
use super::types::{FieldValue, ForumId};
use crate::error::{ForumError, Result};
use std::fmt;
use tracing::debug;

/// How to move a node among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Move n positions towards the start.
    Up(i64),
    /// Move n positions towards the end.
    Down(i64),
    /// Move to an absolute position.
    Position(i64),
    Start,
    End,
}

impl Movement {
    /// Parses an operator movement: `up`, `down` and `pos` take a value,
    /// `start` and `end` ignore it.
    pub fn parse(name: &str, value: Option<i64>) -> Result<Self> {
        let needs_value = || {
            value.ok_or_else(|| {
                ForumError::invalid_input(format!("movement \"{}\" needs a value", name))
            })
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Movement::Up(needs_value()?)),
            "down" => Ok(Movement::Down(needs_value()?)),
            "pos" => Ok(Movement::Position(needs_value()?)),
            "start" => Ok(Movement::Start),
            "end" => Ok(Movement::End),
            _ => Err(ForumError::invalid_input(format!(
                "Illegal movement \"{}\" used",
                name
            ))),
        }
    }

    /// Target index for a node at `current` among `len` siblings, before
    /// clamping.
    fn target(&self, current: usize, len: usize) -> i64 {
        let current = current as i64;
        match *self {
            Movement::Up(n) => current.saturating_sub(n),
            Movement::Down(n) => current.saturating_add(n),
            Movement::Position(n) => n,
            Movement::Start => 0,
            Movement::End => len as i64 - 1,
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Movement::Up(n) => write!(f, "up {}", n),
            Movement::Down(n) => write!(f, "down {}", n),
            Movement::Position(n) => write!(f, "pos {}", n),
            Movement::Start => write!(f, "start"),
            Movement::End => write!(f, "end"),
        }
    }
}

impl<S: ForumStore + SettingsStore> ForumTree<S> {
    /// Moves a node among the direct children of `folder_id`.
    ///
    /// The new position is clamped to the sibling list. Siblings whose
    /// stored `display_order` no longer matches their index are rewritten.
    /// Returns false when nothing changed, which includes a node that is not
    /// a child of the folder.
    pub fn change_order(&self, folder_id: ForumId, forum_id: ForumId, movement: Movement) -> Result<bool> {
        let siblings = self.by_folder(folder_id)?;
        let Some(current) = siblings.position(forum_id) else {
            debug!(folder_id = folder_id, forum_id = forum_id, "Node is not in folder, order unchanged");
            return Ok(false);
        };

        let last = siblings.len() - 1;
        let new_pos = movement.target(current, siblings.len()).clamp(0, last as i64) as usize;
        if new_pos == current {
            return Ok(false);
        }

        let mut order: Vec<_> = siblings.iter().collect();
        let moved = order.remove(current);
        order.insert(new_pos, moved);

        let mut rewritten = 0;
        for (index, record) in order.iter().enumerate() {
            let Some(id) = record.forum_id() else {
                continue;
            };
            if record.display_order() != index as i64 {
                let mut changes = Row::new();
                changes.insert(DISPLAY_ORDER.to_string(), FieldValue::Int(index as i64));
                self.store.update(id, changes)?;
                rewritten += 1;
            }
        }

        debug!(
            folder_id = folder_id,
            forum_id = forum_id,
            movement = %movement,
            from = current,
            to = new_pos,
            rewritten = rewritten,
            "Changed display order"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForumConfig;
    use crate::forum::constants::*;
    use crate::forum::memory::MemoryForumStore;

    fn tree(count: i64) -> ForumTree<MemoryForumStore> {
        let store = MemoryForumStore::new();
        for id in 1..=count {
            let mut row = Row::new();
            row.insert(FORUM_ID.into(), FieldValue::Int(id));
            row.insert(PARENT_ID.into(), FieldValue::Int(0));
            row.insert(NAME.into(), FieldValue::from(format!("f{}", id)));
            row.insert(DISPLAY_ORDER.into(), FieldValue::Int(0));
            store.insert(row).unwrap();
        }
        ForumTree::new(store, &ForumConfig::default())
    }

    fn order(tree: &ForumTree<MemoryForumStore>) -> Vec<ForumId> {
        tree.by_folder(0).unwrap().ids()
    }

    #[test]
    fn test_parse() {
        assert_eq!(Movement::parse("up", Some(2)).unwrap(), Movement::Up(2));
        assert_eq!(Movement::parse("END", None).unwrap(), Movement::End);
        assert_eq!(Movement::parse("start", Some(9)).unwrap(), Movement::Start);
        assert!(matches!(
            Movement::parse("sideways", None),
            Err(ForumError::InvalidInput(_))
        ));
        assert!(Movement::parse("pos", None).is_err());
    }

    #[test]
    fn test_move_to_start() {
        let tree = tree(4);
        assert!(tree.change_order(0, 3, Movement::Start).unwrap());
        assert_eq!(order(&tree), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_move_down_clamps() {
        let tree = tree(3);
        assert!(tree.change_order(0, 1, Movement::Down(10)).unwrap());
        assert_eq!(order(&tree), vec![2, 3, 1]);
    }

    #[test]
    fn test_move_up_and_position() {
        let tree = tree(4);
        tree.change_order(0, 4, Movement::Up(2)).unwrap();
        assert_eq!(order(&tree), vec![1, 4, 2, 3]);
        tree.change_order(0, 1, Movement::Position(2)).unwrap();
        assert_eq!(order(&tree), vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_noop_cases() {
        let tree = tree(3);
        assert!(!tree.change_order(0, 1, Movement::Start).unwrap());
        assert!(!tree.change_order(0, 1, Movement::Up(3)).unwrap());
        assert!(!tree.change_order(0, 42, Movement::End).unwrap());
        assert!(!tree.change_order(7, 1, Movement::End).unwrap());
    }

    #[test]
    fn test_only_differing_orders_written() {
        let tree = tree(3);
        tree.change_order(0, 1, Movement::End).unwrap();
        let records = tree.by_folder(0).unwrap();
        let orders: Vec<i64> = records.iter().map(|r| r.display_order()).collect();
        assert_eq!(records.ids(), vec![2, 3, 1]);
        assert_eq!(orders, vec![0, 1, 2]);
    }
}
