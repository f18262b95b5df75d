mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use bio_conformity::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
