use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use advocacy_etl::config::EtlConfig;
use advocacy_etl::idgen::ClockIdGenerator;
use advocacy_etl::loader::Loader;
use advocacy_etl::logging;
use advocacy_etl::pipeline::PipelineRunner;
use advocacy_etl::stats::LogStatsSink;
use advocacy_etl::storage::{InMemoryStorage, Storage};

#[derive(Parser)]
#[command(name = "advocacy_etl")]
#[command(about = "Advocacy program participant data ETL pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full ETL pipeline over a directory of JSON record files
    Run {
        /// Directory of *.json record files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Records per in-memory batch and per bulk write chunk
        #[arg(long)]
        batch_size: Option<usize>,
        /// Wipe persisted users and aggregates before running
        #[arg(long)]
        clean: bool,
        /// Cap on the number of files processed
        #[arg(long)]
        max_files: Option<usize>,
        /// Only process files whose name contains this substring
        #[arg(long)]
        pattern: Option<String>,
    },
    /// Remove all persisted users and program aggregates
    Clean,
    /// Print the persisted program aggregates
    Stats,
}

fn storage() -> Arc<dyn Storage> {
    Arc::new(InMemoryStorage::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data_dir,
            batch_size,
            clean,
            max_files,
            pattern,
        } => {
            println!("🔄 Running ETL pipeline...");

            let mut config = EtlConfig::load()?.into_run_config();
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if clean {
                config.clean_before_run = true;
            }
            if max_files.is_some() {
                config.max_files = max_files;
            }
            if pattern.is_some() {
                config.file_pattern = pattern;
            }

            let runner = PipelineRunner::new(
                storage(),
                Arc::new(ClockIdGenerator),
                Arc::new(LogStatsSink),
            );
            match runner.run(&config).await {
                Ok(stats) => {
                    println!("\n📊 Run results:");
                    println!("   Files matched: {}", stats.total_files);
                    println!("   Files processed: {}", stats.files_processed);
                    println!("   Records loaded: {}", stats.successful_records);
                    println!("   Records failed: {}", stats.failed_records);
                    println!("   Validation errors: {}", stats.validation_errors);
                    println!(
                        "   Clean / messy: {} / {}",
                        stats.clean_records, stats.messy_records
                    );
                    if let Some(duration_ms) = stats.duration_ms {
                        println!("   Duration: {}ms", duration_ms);
                    }
                    println!("✅ Pipeline run completed");
                }
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    println!("❌ Pipeline run failed: {}", e);
                }
            }
        }
        Commands::Clean => {
            println!("🧹 Cleaning database...");
            let loader = Loader::new(storage());
            match loader.clean_database().await {
                Ok(()) => println!("✅ Database cleaned"),
                Err(e) => {
                    error!("Clean failed: {}", e);
                    println!("❌ Clean failed: {}", e);
                }
            }
        }
        Commands::Stats => {
            let storage = storage();
            let mut stats = storage.fetch_program_stats().await?;
            stats.sort_by(|a, b| a.program_id.cmp(&b.program_id));
            println!("📊 Program aggregates ({}):", stats.len());
            for row in stats {
                println!(
                    "   {} ({}): {} users, {} engagement, {:.2} sales",
                    row.program_name,
                    row.program_id,
                    row.user_count,
                    row.total_engagement,
                    row.total_sales
                );
            }
        }
    }
    Ok(())
}
