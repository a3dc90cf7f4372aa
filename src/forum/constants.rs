//! Shared constants for the forum tree: column names, permission bits and
//! limits.

// =============================================================================
// Column Names
// =============================================================================

pub const FORUM_ID: &str = "forum_id";
pub const FOLDER_FLAG: &str = "folder_flag";
pub const PARENT_ID: &str = "parent_id";
pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const ACTIVE: &str = "active";
pub const FORUM_PATH: &str = "forum_path";
pub const DISPLAY_ORDER: &str = "display_order";
pub const VROOT: &str = "vroot";
pub const CACHE_VERSION: &str = "cache_version";
pub const INHERIT_ID: &str = "inherit_id";
pub const TEMPLATE: &str = "template";
pub const LANGUAGE: &str = "language";

// =============================================================================
// Permission Bits
// =============================================================================

/// Users may read messages.
pub const USER_ALLOW_READ: i64 = 1;

/// Users may reply to messages.
pub const USER_ALLOW_REPLY: i64 = 2;

/// Users may edit their own messages.
pub const USER_ALLOW_EDIT: i64 = 4;

/// Users may start new topics.
pub const USER_ALLOW_NEW_TOPIC: i64 = 8;

// =============================================================================
// Settings
// =============================================================================

/// Name of the settings record that holds the global default forum options.
pub const DEFAULT_FORUM_OPTIONS: &str = "default_forum_options";

/// Name given to the record while the global defaults are being prepared.
pub const DEFAULTS_RECORD_NAME: &str = "Default settings";

// =============================================================================
// Limits
// =============================================================================

/// Maximum number of ancestors walked while building a path. Deeper chains
/// can only come from corrupt parent links.
pub const MAX_TREE_DEPTH: usize = 256;
