//! Command-line argument parsing for the forum-tree maintenance tool.

use crate::cli::utils::{parse_field_value, parse_id};
use crate::error::{ForumError, Result};
use crate::forum::{FieldValue, ForumId, Movement};
use std::env;

/// Command-line interface commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RebuildThreadInfo,
    RebuildPaths,
    List {
        parent_id: ForumId,
    },
    Show {
        forum_id: ForumId,
    },
    CreateFolder {
        parent_id: ForumId,
        name: String,
    },
    CreateForum {
        parent_id: ForumId,
        name: String,
    },
    Set {
        forum_id: ForumId,
        field: String,
        value: FieldValue,
    },
    Move {
        folder_id: ForumId,
        forum_id: ForumId,
        movement: Movement,
    },
    Defaults {
        field: String,
        value: FieldValue,
    },
    Help,
}

/// Parse the process arguments into a Command
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();
    parse_args_from(&args)
}

fn require(args: &[String], count: usize, usage: &str) -> Result<()> {
    if args.len() < count {
        return Err(ForumError::invalid_input(format!("Usage: forum-tree {}", usage)));
    }
    Ok(())
}

/// Parse an argument vector (program name first) into a Command
pub fn parse_args_from(args: &[String]) -> Result<Command> {
    let Some(command) = args.get(1) else {
        return Ok(Command::Help);
    };

    match command.as_str() {
        "rebuild-thread-info" => Ok(Command::RebuildThreadInfo),

        "rebuild-paths" => Ok(Command::RebuildPaths),

        "list" => Ok(Command::List {
            parent_id: match args.get(2) {
                Some(raw) => parse_id(raw, "parent id")?,
                None => 0,
            },
        }),

        "show" => {
            require(args, 3, "show <forum_id>")?;
            Ok(Command::Show {
                forum_id: parse_id(&args[2], "forum id")?,
            })
        }

        "create-folder" | "create-forum" => {
            require(args, 4, &format!("{} <parent_id> <name>", command))?;
            let parent_id = parse_id(&args[2], "parent id")?;
            let name = args[3..].join(" ");
            if command == "create-folder" {
                Ok(Command::CreateFolder { parent_id, name })
            } else {
                Ok(Command::CreateForum { parent_id, name })
            }
        }

        "set" => {
            require(args, 5, "set <forum_id> <field> <value>")?;
            Ok(Command::Set {
                forum_id: parse_id(&args[2], "forum id")?,
                field: args[3].clone(),
                value: parse_field_value(&args[4]),
            })
        }

        "move" => {
            require(args, 5, "move <folder_id> <forum_id> <up|down|pos|start|end> [value]")?;
            let value = match args.get(5) {
                Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                    ForumError::invalid_input(format!("Movement value '{}' is not a number", raw))
                })?),
                None => None,
            };
            Ok(Command::Move {
                folder_id: parse_id(&args[2], "folder id")?,
                forum_id: parse_id(&args[3], "forum id")?,
                movement: Movement::parse(&args[4], value)?,
            })
        }

        "defaults" => {
            require(args, 4, "defaults <field> <value>")?;
            Ok(Command::Defaults {
                field: args[2].clone(),
                value: parse_field_value(&args[3]),
            })
        }

        "help" | "--help" | "-h" => Ok(Command::Help),

        other => Err(ForumError::invalid_input(format!(
            "Unknown command '{}'",
            other
        ))),
    }
}

/// Print usage information
pub fn print_usage() {
    println!("forum-tree - forum and folder tree maintenance");
    println!("==============================================");
    println!();
    println!("Usage: forum-tree <command> [args...]");
    println!();
    println!("Commands:");
    println!("  list [parent_id]                          List the children of a folder");
    println!("  show <forum_id>                           Show a folder or forum as JSON");
    println!("  create-folder <parent_id> <name>          Create a folder");
    println!("  create-forum <parent_id> <name>           Create a forum");
    println!("  set <forum_id> <field> <value>            Change a field (\"null\" for NULL)");
    println!("  move <folder_id> <forum_id> <movement> [n]  Change the display order");
    println!("  defaults <field> <value>                  Change a default forum setting");
    println!("  rebuild-paths                             Recompute all forum paths");
    println!("  rebuild-thread-info                       Rebuild thread meta data");
    println!();
    println!("Movements: up <n>, down <n>, pos <n>, start, end");
    println!();
    println!("Environment:");
    println!("  FORUM_TREE_DATA               Data directory (default: forum_tree_data)");
    println!("  FORUM_TREE_TITLE              Name of the root node (default: Phorum)");
    println!("  FORUM_TREE_DEFAULT_TEMPLATE   Default template (default: emerald)");
    println!("  FORUM_TREE_DEFAULT_LANGUAGE   Default language (default: english)");
    println!("  RUST_LOG                      Log filter (default: forum_tree=info)");
    println!();
    println!("Examples:");
    println!("  forum-tree create-folder 0 Games");
    println!("  forum-tree set 4 read_length 25");
    println!("  forum-tree move 0 4 up 1");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("forum-tree")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_no_args_is_help() {
        assert_eq!(parse_args_from(&args(&[])).unwrap(), Command::Help);
    }

    #[test]
    fn test_list_defaults_to_root() {
        assert_eq!(
            parse_args_from(&args(&["list"])).unwrap(),
            Command::List { parent_id: 0 }
        );
        assert_eq!(
            parse_args_from(&args(&["list", "7"])).unwrap(),
            Command::List { parent_id: 7 }
        );
    }

    #[test]
    fn test_create_joins_name() {
        assert_eq!(
            parse_args_from(&args(&["create-forum", "3", "Board", "games"])).unwrap(),
            Command::CreateForum {
                parent_id: 3,
                name: "Board games".to_string()
            }
        );
    }

    #[test]
    fn test_set_null() {
        assert_eq!(
            parse_args_from(&args(&["set", "4", "inherit_id", "null"])).unwrap(),
            Command::Set {
                forum_id: 4,
                field: "inherit_id".to_string(),
                value: FieldValue::Null
            }
        );
    }

    #[test]
    fn test_move() {
        assert_eq!(
            parse_args_from(&args(&["move", "0", "4", "up", "2"])).unwrap(),
            Command::Move {
                folder_id: 0,
                forum_id: 4,
                movement: Movement::Up(2)
            }
        );
        assert!(parse_args_from(&args(&["move", "0", "4", "up"])).is_err());
        assert!(parse_args_from(&args(&["move", "0", "4", "left", "1"])).is_err());
    }

    #[test]
    fn test_errors() {
        assert!(parse_args_from(&args(&["show"])).is_err());
        assert!(parse_args_from(&args(&["show", "x"])).is_err());
        assert!(matches!(
            parse_args_from(&args(&["frobnicate"])),
            Err(ForumError::InvalidInput(_))
        ));
    }
}
