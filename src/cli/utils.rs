//! Utility functions for CLI operations.

use crate::config::ForumConfig;
use crate::error::{ForumError, Result};
use crate::forum::{FieldValue, ForumId, ForumRecord, ForumTree, RocksForumStore};
use crate::rebuild::RebuildProgress;
use std::io::Write;

/// Open the RocksDB-backed tree in the configured data directory
pub fn open_tree(config: &ForumConfig) -> Result<ForumTree<RocksForumStore>> {
    let store = RocksForumStore::open_with_config(config)?;
    Ok(ForumTree::new(store, config))
}

/// Parse a forum id argument
pub fn parse_id(raw: &str, what: &str) -> Result<ForumId> {
    raw.trim()
        .parse()
        .map_err(|_| ForumError::invalid_input(format!("Invalid {} '{}'", what, raw)))
}

/// Parse a field value argument. `null` maps to NULL; anything else is passed
/// as a string and coerced by the schema.
pub fn parse_field_value(raw: &str) -> FieldValue {
    if raw.eq_ignore_ascii_case("null") {
        FieldValue::Null
    } else {
        FieldValue::from(raw)
    }
}

/// One line summary of a record for listings
pub fn format_record(record: &ForumRecord) -> String {
    format!(
        "{:>6}  {:<6}  {:>4}  {}{}",
        record.forum_id().unwrap_or_default(),
        record.kind(),
        record.display_order(),
        record.name(),
        if record.active() { "" } else { " (inactive)" }
    )
}

/// Rewrite the progress line in place
pub fn print_progress(progress: &RebuildProgress) -> Result<()> {
    write_progress(&mut std::io::stdout(), progress)
}

/// Write a progress line followed by a carriage return and flush it
pub fn write_progress<W: Write>(out: &mut W, progress: &RebuildProgress) -> Result<()> {
    write!(out, "{}\r", progress)?;
    out.flush()?;
    Ok(())
}
