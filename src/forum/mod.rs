//! Forum and folder tree management.
//!
//! The board is a tree of folders and forums. Folders contain other folders
//! and forums; forums hold message threads. The synthetic root (id 0) is
//! never stored.
//!
//! ## Hierarchy
//!
//! ```text
//! Root (0, site title)
//!     └── Folder
//!             ├── Forum
//!             └── Folder (vroot)
//!                     └── Forum
//! ```
//!
//! A folder can be set up as a virtual root ("vroot"): paths of everything
//! below it start at that folder instead of the real root.
//!
//! ## Settings inheritance
//!
//! Fields are either *master* (the node's own configuration) or *slave*
//! (display and behaviour settings). A node with `inherit_id` set takes all
//! its slave fields from the global defaults (`0`) or from another forum.
//! Inheritance is single level: a source may not inherit itself.
//!
//! All operations live on [`ForumTree`], which works over any backend that
//! implements [`ForumStore`] and [`SettingsStore`].

pub mod constants;
pub mod memory;
mod order;
mod path;
mod reader;
mod record;
pub mod schema;
pub mod storage;
mod store;
mod tree;
pub mod types;
mod writer;

pub use memory::MemoryForumStore;
pub use order::Movement;
pub use record::{ForumData, ForumMap, ForumRecord};
pub use schema::{FieldRole, FieldSpec, FieldType, Schema, Violation};
pub use storage::RocksForumStore;
pub use store::{display_cmp, ForumQuery, ForumStore, Row, SettingsStore};
pub use tree::{DefaultSettings, ForumTree};
pub use types::{FieldValue, ForumId, ForumPath, Inheritance, NodeKind, PathEntry, ROOT_ID};
pub use writer::{SaveMode, SaveTarget};
