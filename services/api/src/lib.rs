mod cli;
mod demo;
mod infra;
mod permits;
mod routes;
mod server;

use ptw::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
