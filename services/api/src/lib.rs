mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use metro2_audit::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
