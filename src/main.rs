// src/main.rs

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mealtracker::cli::{self, Cli, CliError, Commands};
use mealtracker::settings::io::load_settings;

const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::List => cli::meals::list(&settings),
        Commands::Import { path } => cli::meals::import_file(&settings, &path),
        Commands::CheckEmail => cli::meals::check_email(&settings),
        Commands::Serve => {
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(cli::serve::run(&settings));
            info!("Shutdown complete");
            result
        }
        Commands::Console { url } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(cli::console::run(&settings, url))
        }
    }
}
