//! Command-line interface of the `todo` binary.

use crate::types::TodoAction;
use clap::{Parser, Subcommand};

/// Keep a to-do list that survives restarts
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "todo")]
#[command(about = "Keep a to-do list that survives restarts")]
#[command(version)]
pub struct Cli {
    /// What to do; prints the list when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The command to run, defaulting to [`Command::List`]
    #[must_use]
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::List)
    }
}

/// One invocation of the CLI
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the list
    #[command(visible_alias = "ls")]
    List,

    /// Add a todo
    Add {
        /// Text of the todo; words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Toggle a todo between open and done
    Toggle {
        /// Id of the todo
        id: String,
    },

    /// Remove a todo
    #[command(visible_alias = "rm")]
    Remove {
        /// Id of the todo
        id: String,
    },
}

impl Command {
    /// The action this command dispatches, if any
    #[must_use]
    pub fn into_action(self) -> Option<TodoAction> {
        match self {
            Self::List => None,
            Self::Add { text } => Some(TodoAction::add_todo(text.join(" "))),
            Self::Toggle { id } => Some(TodoAction::toggle_todo(id)),
            Self::Remove { id } => Some(TodoAction::remove_todo(id)),
        }
    }
}
