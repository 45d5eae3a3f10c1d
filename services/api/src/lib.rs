mod cli;
mod demo;
mod infra;
mod model;
mod routes;
mod server;

use mortgage_ai::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
