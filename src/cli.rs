/// The cli module wires the `alternatives` subcommand family to the sync engine.
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::common::initialize_logging;
use crate::config::Config;
use crate::errors::Result;
use crate::library::Library;
use crate::media::TagWriter;
use crate::sync::{self, UpdateOptions};

#[derive(Parser)]
#[command(name = "reprise", version = crate::common::VERSION, about = "Maintain alternative copies of a music library")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage alternative collections.
    #[command(visible_alias = "alt")]
    Alternatives {
        #[command(subcommand)]
        command: AlternativesCommand,
    },
}

#[derive(Subcommand)]
pub enum AlternativesCommand {
    /// Bring one collection into agreement with the library.
    Update {
        /// Name of the collection to update.
        name: String,
        /// Create the collection directory without asking.
        #[arg(long, conflicts_with = "no_create")]
        create: bool,
        /// Never create the collection directory.
        #[arg(long = "no-create")]
        no_create: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging();

    let config = Config::parse(cli.config.as_deref())?;
    let library = Library::open(&config.database_path)?;

    match cli.command {
        Command::Alternatives { command } => match command {
            AlternativesCommand::Update { name, create, no_create } => {
                let options = UpdateOptions {
                    create: match (create, no_create) {
                        (true, _) => Some(true),
                        (_, true) => Some(false),
                        _ => None,
                    },
                };
                sync::update(&config, &library, &name, &options, Arc::new(TagWriter))?;
                Ok(())
            }
        },
    }
}
