// src/cli/mod.rs
// Command line entry points

pub mod console;
pub mod meals;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::client::SessionError;
use crate::meals::import::ImportError;
use crate::meals::store::StoreError;
use crate::server::StartupError;
use crate::settings::io::SettingsError;

#[derive(Parser)]
#[command(name = "mealtracker")]
#[command(about = "MealTracker - household meal stock endpoint and console client", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP endpoint
    Serve,

    /// Print the meal list from the local store
    List,

    /// Import one order confirmation email file into the local store
    Import {
        /// Path to the message file (RFC 822 text)
        path: PathBuf,
    },

    /// Report whether the inbox holds a new order confirmation
    CheckEmail,

    /// Interactive client against a running endpoint
    Console {
        /// Endpoint URL (defaults to the configured server URL)
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
