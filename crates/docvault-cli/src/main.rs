//! Docvault CLI: command-line surface over the document controller.
//!
//! Vault settings come from the environment (see `VaultConfig`); the caller identity
//! from `--user`/`--role` or DOCVAULT_USER/DOCVAULT_ROLE.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use docvault_cli::{caller_from, init_tracing, parse_timestamp};
use docvault_core::{
    ApprovalStatus, CollectionRef, Config, CreateCollectionRequest, DuplicatePolicy, FileEdit,
    FileFilters, UploadRequest,
};
use docvault_lifecycle::{CommandOutcome, DocumentController};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "docvault", about = "Document vault CLI")]
struct Cli {
    /// User issuing the command
    #[arg(long, env = "DOCVAULT_USER", global = true, default_value = "")]
    user: String,
    /// Role of the user, optionally with sub-roles (`student-org_officer`)
    #[arg(long, env = "DOCVAULT_ROLE", global = true, default_value = "")]
    role: String,
    #[command(subcommand)]
    command: Commands,
}

/// Selects one record among same-named ones
#[derive(Args)]
struct At {
    /// Record timestamp (YYYY-MM-DD HH:MM:SS): upload time for active files,
    /// deletion time for deleted ones
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<DateTime<Utc>>,
}

impl At {
    fn get(&self) -> Option<&DateTime<Utc>> {
        self.at.as_ref()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Name to store under; defaults to the file stem
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Collection id or name
        #[arg(long)]
        collection: Option<CollectionRef>,
        /// What to do when the name is taken: cancel, override or rename
        #[arg(long, default_value = "cancel")]
        on_duplicate: DuplicatePolicy,
    },
    /// List active files visible to the caller
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        extension: Option<String>,
        /// Case-insensitive substring of the filename
        #[arg(long)]
        search: Option<String>,
    },
    /// List files in the recycle bin
    Deleted,
    /// Show one file; with --deleted, its recycle bin entry and retention countdown
    Details {
        filename: String,
        #[arg(long)]
        deleted: bool,
        #[command(flatten)]
        at: At,
    },
    /// Move a file to the recycle bin
    Delete {
        filename: String,
        #[command(flatten)]
        at: At,
    },
    /// Restore a file from the recycle bin
    Restore {
        filename: String,
        #[command(flatten)]
        at: At,
    },
    /// Permanently delete a file from the recycle bin
    Purge {
        filename: String,
        #[command(flatten)]
        at: At,
    },
    /// Remove recycle bin entries older than the retention period
    Cleanup {
        /// Age threshold in days; defaults to the configured retention
        #[arg(long)]
        days: Option<u32>,
    },
    /// Edit a file's description
    Edit {
        filename: String,
        #[arg(long)]
        description: String,
        #[command(flatten)]
        at: At,
    },
    /// Set the review status of an upload (administrators only)
    Approve {
        filename: String,
        /// pending, accepted or rejected
        status: ApprovalStatus,
    },
    /// Storage usage summary
    Storage,
    /// Collection operations
    Collection {
        #[command(subcommand)]
        sub: CollectionCommands,
    },
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// Create a new collection
    Create {
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a collection; its files stay in the vault
    Delete { collection: CollectionRef },
    /// List collections with their files
    List,
    /// Show one collection
    Show { collection: CollectionRef },
    /// Add an active file to a collection
    Add {
        collection: CollectionRef,
        filename: String,
    },
    /// Remove a file from a collection
    Remove {
        collection: CollectionRef,
        filename: String,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Print an outcome; returns whether it succeeded.
fn report<T: Serialize>(outcome: CommandOutcome<T>) -> anyhow::Result<bool> {
    print_json(&outcome)?;
    Ok(outcome.is_success())
}

fn found<T: Serialize>(value: Option<T>, what: impl FnOnce() -> String) -> anyhow::Result<bool> {
    match value {
        Some(value) => {
            print_json(&value)?;
            Ok(true)
        }
        None => anyhow::bail!("{} not found", what()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load vault configuration")?;
    init_tracing(config.is_production());
    let retention_days = config.retention_days();
    let controller = DocumentController::start(config)
        .await
        .context("Failed to open vault")?;

    let caller = || caller_from(&cli.user, &cli.role).map_err(anyhow::Error::msg);

    let succeeded = match &cli.command {
        Commands::Upload {
            file,
            name,
            category,
            description,
            collection,
            on_duplicate,
        } => {
            let request = UploadRequest {
                source_path: file.clone(),
                desired_name: name.clone(),
                category: category.clone(),
                description: description.clone(),
                collection: collection.clone(),
                policy: *on_duplicate,
            };
            report(controller.upload(&caller()?, request).await)?
        }
        Commands::List {
            category,
            extension,
            search,
        } => {
            let filters = FileFilters {
                category: category.clone(),
                extension: extension.clone(),
                search: search.clone(),
            };
            print_json(&controller.list_files(&caller()?, &filters).await)?;
            true
        }
        Commands::Deleted => {
            print_json(&controller.list_deleted_files(&caller()?).await)?;
            true
        }
        Commands::Details {
            filename,
            deleted,
            at,
        } => {
            let caller = caller()?;
            if *deleted {
                let info = controller
                    .get_recycle_bin_file_info(&caller, filename, at.get())
                    .await;
                found(info, || format!("Deleted file '{}'", filename))?
            } else {
                let record = controller
                    .get_file_details(&caller, filename, at.get())
                    .await;
                found(record, || format!("File '{}'", filename))?
            }
        }
        Commands::Delete { filename, at } => {
            report(controller.delete_file(&caller()?, filename, at.get()).await)?
        }
        Commands::Restore { filename, at } => {
            report(controller.restore_file(&caller()?, filename, at.get()).await)?
        }
        Commands::Purge { filename, at } => report(
            controller
                .permanently_delete_file(&caller()?, filename, at.get())
                .await,
        )?,
        Commands::Cleanup { days } => {
            let days = days.unwrap_or(retention_days);
            tracing::info!(days, "Running recycle bin cleanup");
            report(controller.cleanup_recycle_bin(days).await)?
        }
        Commands::Edit {
            filename,
            description,
            at,
        } => {
            let edit = FileEdit {
                description: Some(description.clone()),
            };
            report(
                controller
                    .edit_file(&caller()?, filename, at.get(), edit)
                    .await,
            )?
        }
        Commands::Approve { filename, status } => report(
            controller
                .set_approval_status(&caller()?, filename, *status)
                .await,
        )?,
        Commands::Storage => {
            let summary = controller
                .storage_summary()
                .await
                .context("Failed to compute storage summary")?;
            print_json(&summary)?;
            true
        }
        Commands::Collection { sub } => match sub {
            CollectionCommands::Create { name, icon } => {
                let request = CreateCollectionRequest {
                    name: name.clone(),
                    icon: icon.clone(),
                };
                report(controller.create_collection(&caller()?, request).await)?
            }
            CollectionCommands::Delete { collection } => {
                report(controller.delete_collection(collection).await)?
            }
            CollectionCommands::List => {
                print_json(&controller.list_collections().await)?;
                true
            }
            CollectionCommands::Show { collection } => found(
                controller.get_collection(collection).await,
                || format!("Collection {}", collection),
            )?,
            CollectionCommands::Add {
                collection,
                filename,
            } => {
                let record = controller
                    .get_file_details(&caller()?, filename, None)
                    .await
                    .with_context(|| format!("File '{}' not found", filename))?;
                report(controller.add_file_to_collection(collection, &record).await)?
            }
            CollectionCommands::Remove {
                collection,
                filename,
            } => report(
                controller
                    .remove_file_from_collection(collection, filename)
                    .await,
            )?,
        },
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
