//! Command-line interface for the forum tree.
//!
//! Maintenance commands for browsing and editing the folder/forum tree,
//! rebuilding paths and rebuilding thread meta data.

pub mod args;
pub mod commands;
pub mod utils;

use crate::config::ForumConfig;
use crate::Result;
use std::process;

pub use args::Command;
pub use commands::*;
pub use utils::*;

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    // Parse command line arguments
    let command = match args::parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            args::print_usage();
            process::exit(1);
        }
    };

    if command == Command::Help {
        args::print_usage();
        return Ok(());
    }

    let config = ForumConfig::from_env()?;

    // Execute command
    match command {
        Command::RebuildThreadInfo => commands::rebuild_threads(&config),
        Command::RebuildPaths => commands::rebuild_paths(&config),
        Command::List { parent_id } => commands::list(&config, parent_id),
        Command::Show { forum_id } => commands::show(&config, forum_id),
        Command::CreateFolder { parent_id, name } => {
            commands::create(&config, parent_id, &name, true)
        }
        Command::CreateForum { parent_id, name } => {
            commands::create(&config, parent_id, &name, false)
        }
        Command::Set {
            forum_id,
            field,
            value,
        } => commands::set(&config, forum_id, &field, value),
        Command::Move {
            folder_id,
            forum_id,
            movement,
        } => commands::move_node(&config, folder_id, forum_id, movement),
        Command::Defaults { field, value } => commands::defaults(&config, &field, value),
        Command::Help => Ok(()),
    }
}
