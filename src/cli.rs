//! CLI module
//!
//! This module provides the command-line interface functionality for the
//! sprig tool: serving the API, and driving task intents against a running
//! server.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::sync::Arc;

use crate::{
    api::{serve, Client, ClientConfig, ServerConfig, TreeClient},
    models::{Core, Task, TaskId, Tree},
    store::{JsonFileStore, MemoryStore, TreeStore},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API server URL
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sprig API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Path of the JSON slot the tree is persisted to
        #[arg(long, env = "SPRIG_STORE", default_value = "tasks.json")]
        store: String,

        /// Keep the tree in memory only; nothing is written to disk
        #[arg(long)]
        ephemeral: bool,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Move a task under a new parent (or to the root level)
    Move {
        /// Id of the task to move
        id: TaskId,

        /// Destination parent id; omit to move to the root level
        #[arg(short = 'P', long)]
        parent: Option<TaskId>,

        /// Position among the destination's children; appends when omitted
        #[arg(short, long)]
        position: Option<usize>,
    },

    /// Print the task tree
    Tree {
        /// Also show completed tasks
        #[arg(short, long)]
        all: bool,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a new root task
    Add {
        /// Task label
        label: String,
    },

    /// Add a child task under an existing task
    #[command(name = "add-child")]
    AddChild {
        /// Parent task id
        parent: TaskId,

        /// Task label
        label: String,
    },

    /// Toggle completion of a task
    Toggle {
        /// Task id
        id: TaskId,
    },

    /// Replace the markdown document attached to a task (empty clears it)
    Doc {
        /// Task id
        id: TaskId,

        /// Document text
        text: String,
    },

    /// Remove a task and its whole subtree
    #[command(name = "rm")]
    Remove {
        /// Task id
        id: TaskId,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            port,
            store,
            ephemeral,
        } => {
            println!("Starting sprig API server on port {}...", port);

            let store: Arc<dyn TreeStore> = if *ephemeral {
                Arc::new(MemoryStore::new())
            } else {
                println!("Persisting tasks to {}", store);
                Arc::new(JsonFileStore::new(store))
            };
            let core = Core::load(store);

            // Create a server configuration with the specified port
            let config = ServerConfig {
                address: ([127, 0, 0, 1], *port).into(),
            };

            // Start the API server
            serve(core, config).await?;
            Ok(())
        }

        Commands::Task { command } => {
            let client = create_client(&cli.server);
            match command {
                TaskCommands::Add { label } => {
                    let created = client.add_task(label.clone()).await?;
                    println!("Added task \"{}\" with id {}", label, created.id);
                    Ok(())
                }

                TaskCommands::AddChild { parent, label } => {
                    let created = client.add_child(*parent, label.clone()).await?;
                    println!(
                        "Added task \"{}\" with id {} under {}",
                        label, created.id, parent
                    );
                    Ok(())
                }

                TaskCommands::Toggle { id } => {
                    let tree = client.toggle_task(*id).await?;
                    match tree.get(*id) {
                        Some(task) if task.is_completed() => {
                            println!("Completed \"{}\"", task.label())
                        }
                        Some(task) => println!("Reopened \"{}\"", task.label()),
                        None => {}
                    }
                    Ok(())
                }

                TaskCommands::Doc { id, text } => {
                    client.set_document(*id, text.clone()).await?;
                    if text.is_empty() {
                        println!("Cleared document on {}", id);
                    } else {
                        println!("Updated document on {}", id);
                    }
                    Ok(())
                }

                TaskCommands::Remove { id } => {
                    client.remove_task(*id).await?;
                    println!("Removed task {} and its subtree", id);
                    Ok(())
                }
            }
        }

        Commands::Move {
            id,
            parent,
            position,
        } => {
            let client = create_client(&cli.server);

            // Appending is the drag-and-drop default; the engine clamps
            let position = position.unwrap_or(usize::MAX);
            client.move_task(*id, *parent, position).await?;

            match parent {
                Some(parent) => println!("Moved task {} under {}", id, parent),
                None => println!("Moved task {} to the root level", id),
            }
            Ok(())
        }

        Commands::Tree { all } => {
            let client = create_client(&cli.server);

            let tree = client.get_visible_tree(*all).await?;
            print_tree(&tree);
            Ok(())
        }

        Commands::Completions { shell } => {
            // Generate completions for the specified shell
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn create_client(server_url: &str) -> Client {
    let config = ClientConfig {
        base_url: server_url.to_string(),
    };

    Client::with_config(config)
}

fn print_tree(tree: &Tree) {
    if tree.is_empty() {
        println!("No tasks yet. Add some with 'sprig task add'");
        return;
    }
    for task in tree.roots() {
        print_task(task, 0);
    }
}

/// Recursively prints a task and its children with proper indentation
fn print_task(task: &Task, depth: usize) {
    // Calculate indentation (2 spaces per level)
    let indent = "  ".repeat(depth);

    let checkbox = if task.is_completed() {
        "[✓]".green().to_string()
    } else {
        "[ ]".to_string()
    };

    let label = if task.is_completed() {
        task.label().strikethrough().dimmed().to_string()
    } else {
        task.label().to_string()
    };

    let stamp = task
        .completed_at()
        .map(|at| at.format("  %Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let id = format!("({})", task.id());

    println!(
        "{}{} {} {}{}",
        indent,
        checkbox,
        label,
        id.as_str().dimmed(),
        stamp.as_str().dimmed()
    );

    // Recursively print children with increased indentation
    for child in task.children() {
        print_task(child, depth + 1);
    }
}
