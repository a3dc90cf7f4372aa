//! # forum-tree
//!
//! Management of a forum board's folder/forum tree.
//!
//! ## Features
//!
//! - **Field schema**: every folder and forum column is declared with its
//!   type, default and inheritance role
//! - **Reader**: typed records by id, parent, vroot or inheritance source
//! - **Writer**: validated saves with settings inheritance and cascades
//! - **Paths**: cached ancestor paths with virtual root support
//! - **Ordering**: display order changes within a folder
//! - **Thread info rebuild**: maintenance pass over every thread
//!
//! ## Example
//!
//! ```rust
//! use forum_tree::config::ForumConfig;
//! use forum_tree::forum::{ForumData, ForumTree, MemoryForumStore};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = ForumTree::new(MemoryForumStore::new(), &ForumConfig::default());
//! let games = tree.save(ForumData::create_folder("Games"))?;
//! let chess = tree.save(ForumData::create_forum("Chess").parent(games.forum_id().unwrap_or(0)))?;
//! assert_eq!(chess.forum_path().map(|p| p.to_string()).as_deref(), Some("Phorum / Games / Chess"));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod forum;
pub mod rebuild;
pub mod storage;

pub use error::{ForumError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
