//! `todo` command-line demo.
//!
//! Each run builds a store, rehydrates it from the state directory, applies
//! one command, waits for the write-back and prints the list:
//!
//! ```text
//! todo                 # list
//! todo add buy milk
//! todo toggle <id>
//! todo remove <id>
//! ```
//!
//! Configured through `TODO_STATE_DIR`, `TODO_STORAGE_KEY`, `TODO_PERSIST`
//! and `RUST_LOG`, read from the environment or a `.env` file.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use todo_list::{
    Cli, FileByteStore, TodoConfig, TodoEnvironment, TodoListState, TodoReducer, TodoStore,
    seed_state,
};
use todo_store_core::state::Snapshot;
use todo_store_runtime::Persistor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let command = Cli::parse().into_command();

    // Logs go to stderr so the list on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo=info,todo_store_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    todo_store_runtime::metrics::register_metrics();

    let config = TodoConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let env = TodoEnvironment::production();
    let store = Arc::new(TodoStore::new(seed_state(&env), TodoReducer::new(), env));

    let persistence = if config.persist {
        let bytes = Arc::new(FileByteStore::new(&config.state_dir));
        let config = config.persist_config().on_failure(|error| {
            eprintln!("warning: {error}");
        });
        let handle = Persistor::attach(&store, bytes, config);
        handle.ready().await;
        Some(handle)
    } else {
        tracing::info!("Persistence disabled");
        None
    };

    if let Some(action) = command.into_action() {
        let before = store.state();
        store
            .dispatch(action.clone())
            .context("Failed to apply command")?;
        if store.state().same_snapshot(&before) {
            println!("Nothing changed: {action:?}");
        }
    }

    if let Some(persistence) = &persistence {
        persistence.flush().await;
        tracing::debug!(saves = persistence.saves_completed(), "State written");
    }

    print_list(&store.state());
    Ok(())
}

fn print_list(state: &TodoListState) {
    if state.is_empty() {
        println!("Nothing to do.");
        return;
    }

    for todo in state.iter() {
        let mark = if todo.done { "x" } else { " " };
        println!("[{mark}] {}  {}", todo.id, todo.text);
    }
    println!(
        "\n{} done, {} remaining",
        state.completed_count(),
        state.remaining_count()
    );
}
