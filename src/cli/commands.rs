//! Command implementations for the forum-tree CLI.

use crate::{
    cli::utils::{format_record, open_tree, print_progress},
    config::ForumConfig,
    error::ForumError,
    forum::{FieldValue, ForumData, ForumId, Movement},
    rebuild::{is_web_request, rebuild_thread_info, MessageCountUpdater, WEB_REQUEST_MESSAGE},
    Result,
};
use std::env;
use tracing::info;

/// Execute rebuild-thread-info command
pub fn rebuild_threads(config: &ForumConfig) -> Result<()> {
    if is_web_request(|name| env::var(name).ok()) {
        println!("{}", WEB_REQUEST_MESSAGE);
        return Ok(());
    }

    let tree = open_tree(config)?;
    let store = tree.store();

    println!();
    println!("Rebuilding thread info meta data ...");

    let mut updater = MessageCountUpdater::new(store);
    let report = rebuild_thread_info(store, &mut updater, print_progress)?;

    println!();
    println!();
    info!(
        total = report.total,
        updated = report.updated,
        "✅ Thread info rebuilt"
    );
    Ok(())
}

/// Execute rebuild-paths command
pub fn rebuild_paths(config: &ForumConfig) -> Result<()> {
    let tree = open_tree(config)?;
    let updated = tree.rebuild_all_paths()?;
    println!("Updated the paths of {} node(s)", updated);
    Ok(())
}

/// Execute list command
pub fn list(config: &ForumConfig, parent_id: ForumId) -> Result<()> {
    let tree = open_tree(config)?;

    let heading = match tree.build_path(parent_id)? {
        Some(path) => path.to_string(),
        None => {
            return Err(ForumError::invalid_input(format!(
                "Folder {} does not exist",
                parent_id
            )))
        }
    };

    println!("{}", heading);
    let children = tree.by_parent(parent_id)?;
    if children.is_empty() {
        println!("  (empty)");
    }
    for record in &children {
        println!("{}", format_record(record));
    }
    Ok(())
}

/// Execute show command
pub fn show(config: &ForumConfig, forum_id: ForumId) -> Result<()> {
    let tree = open_tree(config)?;
    let record = tree
        .get_forum(forum_id)?
        .ok_or_else(|| ForumError::invalid_input(format!("Forum {} does not exist", forum_id)))?;

    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| ForumError::serialization(format!("Failed to render record: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Execute create-folder and create-forum commands
pub fn create(config: &ForumConfig, parent_id: ForumId, name: &str, folder: bool) -> Result<()> {
    let mut tree = open_tree(config)?;
    let data = if folder {
        ForumData::create_folder(name)
    } else {
        ForumData::create_forum(name)
    };

    let record = tree.save(data.parent(parent_id))?;
    info!(
        forum_id = ?record.forum_id(),
        kind = %record.kind(),
        "✅ Created"
    );
    println!("{}", format_record(&record));
    Ok(())
}

/// Execute set command
pub fn set(config: &ForumConfig, forum_id: ForumId, field: &str, value: FieldValue) -> Result<()> {
    let mut tree = open_tree(config)?;
    if tree.get_forum(forum_id)?.is_none() {
        return Err(ForumError::invalid_input(format!(
            "Forum {} does not exist",
            forum_id
        )));
    }

    let record = tree.save(ForumData::existing(forum_id).set(field, value))?;
    let stored = record.get(field).cloned().unwrap_or(FieldValue::Null);
    println!("{} {} = {}", forum_id, field, stored);
    Ok(())
}

/// Execute move command
pub fn move_node(
    config: &ForumConfig,
    folder_id: ForumId,
    forum_id: ForumId,
    movement: Movement,
) -> Result<()> {
    let tree = open_tree(config)?;
    if tree.change_order(folder_id, forum_id, movement)? {
        println!("Moved {} ({})", forum_id, movement);
    } else {
        println!("Order unchanged");
    }
    Ok(())
}

/// Execute defaults command
pub fn defaults(config: &ForumConfig, field: &str, value: FieldValue) -> Result<()> {
    let mut tree = open_tree(config)?;
    let saved = tree.save_defaults(ForumData::new().set(field, value))?;
    let stored = saved.get(field).cloned().unwrap_or(FieldValue::Null);
    println!("default {} = {}", field, stored);
    Ok(())
}
