// src/cli/serve.rs

use crate::server::start_server;
use crate::settings::AppSettings;

use super::CliError;

pub async fn run(settings: &AppSettings) -> Result<(), CliError> {
    start_server(settings).await?;
    Ok(())
}
