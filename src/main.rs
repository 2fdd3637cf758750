/// Sparkify ETL
///
/// Loads song catalog files and user activity logs into a star-schema
/// warehouse: one songplays fact table and users, songs, artists and time
/// dimensions.
mod cli;
mod db;
mod error;
mod etl;
mod models;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use db::{statements::StatementCatalog, Database};
use etl::{
    discover::FileDiscovery,
    extract::{LogFileExtractor, SongFileExtractor},
};
use pipeline::BatchLoader;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    println!("🚀 Starting Sparkify ETL...");

    println!("\n💾 Connecting to PostgreSQL database...");
    let database = Database::new(&cli.database_url).await?;

    let result = run(&cli, &database).await;

    // Close on every exit path; a failed file has already been rolled back
    database.close().await;

    if let Err(e) = &result {
        tracing::error!("ETL run aborted: {:#}", e);
    }
    result
}

/// Song pipeline first so the log pipeline can resolve song/artist keys
async fn run(cli: &Cli, database: &Database) -> Result<()> {
    database.test_connection().await?;
    println!("✅ Database connected successfully!");

    if cli.create_schema {
        println!("📋 Creating warehouse schema...");
        database.migrate().await?;
    }

    let catalog = StatementCatalog::postgres();
    let mut warehouse = database.warehouse();

    let song_stats = BatchLoader::new(&mut warehouse, &catalog, FileDiscovery::new(&cli.suffix))
        .run(&cli.song_data, &SongFileExtractor)
        .await
        .context("Song pipeline failed")?;
    pipeline::print_stats(&song_stats);

    let log_stats = BatchLoader::new(&mut warehouse, &catalog, FileDiscovery::new(&cli.suffix))
        .run(&cli.log_data, &LogFileExtractor)
        .await
        .context("Log pipeline failed")?;
    pipeline::print_stats(&log_stats);

    println!("\n✨ ETL run complete!");
    Ok(())
}
