use anyhow::Result;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use advocacy_etl::config::RunConfig;
use advocacy_etl::error::EtlError;
use advocacy_etl::idgen::SequenceIdGenerator;
use advocacy_etl::loader::{LoadOptions, Loader};
use advocacy_etl::pipeline::PipelineRunner;
use advocacy_etl::stats::{LogStatsSink, RunStats, StatsSink};
use advocacy_etl::storage::{InMemoryStorage, Storage};

fn write_json(dir: &Path, name: &str, value: serde_json::Value) {
    std::fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn runner_with(storage: Arc<dyn Storage>) -> PipelineRunner {
    PipelineRunner::new(
        storage,
        Arc::new(SequenceIdGenerator::new()),
        Arc::new(LogStatsSink),
    )
}

fn run_config(dir: &Path) -> RunConfig {
    RunConfig {
        data_dir: dir.to_path_buf(),
        ..RunConfig::default()
    }
}

/// Stats sink that keeps the reported run for assertions.
struct CaptureSink {
    captured: Mutex<Option<RunStats>>,
}

impl StatsSink for CaptureSink {
    fn record_run(&self, stats: &RunStats) {
        *self.captured.lock().unwrap() = Some(stats.clone());
    }
}

#[tokio::test]
async fn end_to_end_run_over_a_mixed_directory() -> Result<()> {
    let dir = tempdir()?;
    write_json(
        dir.path(),
        "clean.json",
        json!({
            "user_id": "u1",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "instagram_handle": "@Ada",
            "join_date": "2024-03-01",
            "advocacy_programs": [{
                "program_id": "p1",
                "brand": "Acme",
                "tasks_completed": [{
                    "task_id": "t1",
                    "platform": "Instagram",
                    "likes": 10,
                    "comments": 2,
                    "shares": 1
                }],
                "total_sales_attributed": 50
            }]
        }),
    );
    write_json(
        dir.path(),
        "messy.json",
        json!({
            "name": "No Id",
            "advocacy_programs": [{"program_id": "p1", "brand": "Acme"}]
        }),
    );
    // Truncated object, repairable by appending the missing brace
    std::fs::write(
        dir.path().join("repairable.json"),
        r#"{"user_id": "u2", "email": "u2@example.com", "advocacy_programs": []"#,
    )?;
    std::fs::write(dir.path().join("hopeless.json"), "{]{]{] not json")?;
    std::fs::write(dir.path().join("ignored.txt"), "not a record")?;

    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());
    let sink = Arc::new(CaptureSink {
        captured: Mutex::new(None),
    });
    let runner = PipelineRunner::new(
        storage.clone(),
        Arc::new(SequenceIdGenerator::new()),
        sink.clone(),
    );

    let stats = runner.run(&run_config(dir.path())).await?;

    // Four json files matched; the hopeless one is skipped, not fatal
    assert_eq!(stats.total_files, 4);
    assert_eq!(stats.files_processed, 3);
    assert_eq!(stats.successful_records, 3);
    assert_eq!(stats.failed_records, 0);
    assert_eq!(stats.validation_errors, 0);
    assert_eq!(stats.clean_records, 1);
    assert_eq!(stats.messy_records, 2);
    assert!(stats.finished_at.is_some());

    let users = storage.fetch_all_users().await?;
    assert_eq!(users.len(), 3);

    let ada = users.iter().find(|u| u.id == "u1").expect("u1 persisted");
    assert_eq!(ada.total_engagement, 13);
    assert_eq!(ada.total_sales, 50.0);
    assert_eq!(ada.social_handles[0].handle, "ada");
    assert!(ada.join_date.is_some());

    // The record without a user_id got a synthetic one
    assert!(users.iter().any(|u| u.id.starts_with("user_gen_")));

    // Aggregates were recomputed: p1 has two members, only one with sales
    let program_stats = storage.fetch_program_stats().await?;
    assert_eq!(program_stats.len(), 1);
    assert_eq!(program_stats[0].program_id, "p1");
    assert_eq!(program_stats[0].user_count, 2);
    assert_eq!(program_stats[0].total_engagement, 13);
    assert_eq!(program_stats[0].total_sales, 50.0);

    // The injected sink saw the same run
    let captured = sink.captured.lock().unwrap();
    let captured = captured.as_ref().expect("sink should capture the run");
    assert_eq!(captured.run_id, stats.run_id);
    assert_eq!(captured.successful_records, 3);
    Ok(())
}

#[tokio::test]
async fn missing_data_directory_is_fatal() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let runner = runner_with(storage);

    let config = RunConfig {
        data_dir: "/definitely/not/here".into(),
        ..RunConfig::default()
    };
    let result = runner.run(&config).await;
    assert!(matches!(result, Err(EtlError::DataDirMissing(_))));
}

#[tokio::test]
async fn structurally_broken_records_count_as_validation_errors() -> Result<()> {
    let dir = tempdir()?;
    write_json(
        dir.path(),
        "bad_shape.json",
        json!({"user_id": "u1", "advocacy_programs": "not a list"}),
    );
    write_json(dir.path(), "fine.json", json!({"user_id": "u2"}));

    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());
    let runner = runner_with(storage.clone());
    let stats = runner.run(&run_config(dir.path())).await?;

    assert_eq!(stats.validation_errors, 1);
    assert_eq!(stats.failed_records, 1);
    assert_eq!(stats.successful_records, 1);

    let users = storage.fetch_all_users().await?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "u2");
    Ok(())
}

#[tokio::test]
async fn duplicate_ids_in_one_batch_are_merged() -> Result<()> {
    let dir = tempdir()?;
    // Equal completeness scores: one attribution each, same amounts
    write_json(
        dir.path(),
        "first.json",
        json!({
            "user_id": "dup",
            "advocacy_programs": [{
                "program_id": "p1",
                "brand": "Acme",
                "total_sales_attributed": 30
            }]
        }),
    );
    write_json(
        dir.path(),
        "second.json",
        json!({
            "user_id": "dup",
            "advocacy_programs": [{
                "program_id": "p2",
                "brand": "Globex",
                "total_sales_attributed": 30
            }]
        }),
    );

    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());
    let runner = runner_with(storage.clone());
    let stats = runner.run(&run_config(dir.path())).await?;

    assert_eq!(stats.successful_records, 1);
    let users = storage.fetch_all_users().await?;
    assert_eq!(users.len(), 1);
    let merged = &users[0];
    assert_eq!(merged.programs.len(), 2);
    assert_eq!(merged.sales_attributions.len(), 2);
    assert_eq!(merged.total_sales, 60.0);
    Ok(())
}

#[tokio::test]
async fn first_batch_wins_across_batches() -> Result<()> {
    let dir = tempdir()?;
    write_json(
        dir.path(),
        "one.json",
        json!({
            "user_id": "dup",
            "advocacy_programs": [{
                "program_id": "p1",
                "brand": "Acme",
                "tasks_completed": [{"task_id": "a", "platform": "instagram", "likes": 10}]
            }]
        }),
    );
    write_json(
        dir.path(),
        "two.json",
        json!({
            "user_id": "dup",
            "advocacy_programs": [{
                "program_id": "p2",
                "brand": "Globex",
                "tasks_completed": [{"task_id": "b", "platform": "tiktok", "likes": 20}]
            }]
        }),
    );

    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());
    let runner = runner_with(storage.clone());

    // batch_size 1: each file flushes alone, so the duplicate id lands in a
    // later batch and must be excluded rather than merged
    let config = RunConfig {
        data_dir: dir.path().to_path_buf(),
        batch_size: 1,
        ..RunConfig::default()
    };
    let stats = runner.run(&config).await?;

    assert_eq!(stats.successful_records, 1);
    let users = storage.fetch_all_users().await?;
    assert_eq!(users.len(), 1);
    // Whichever file was enumerated first won outright; a merge would have
    // produced two posts
    assert_eq!(users[0].posts.len(), 1);
    assert_eq!(users[0].programs.len(), 1);
    Ok(())
}

#[tokio::test]
async fn clean_before_run_resets_previous_state() -> Result<()> {
    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());

    // Seed a leftover user from a previous run
    let loader = Loader::new(storage.clone());
    let stale = advocacy_etl::domain::User::new("stale".to_string());
    loader.load_batch(&[stale], &LoadOptions::default()).await;
    assert_eq!(storage.fetch_all_users().await?.len(), 1);

    let dir = tempdir()?;
    write_json(dir.path(), "fresh.json", json!({"user_id": "fresh"}));

    let runner = runner_with(storage.clone());
    let config = RunConfig {
        data_dir: dir.path().to_path_buf(),
        clean_before_run: true,
        ..RunConfig::default()
    };
    runner.run(&config).await?;

    let users = storage.fetch_all_users().await?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "fresh");
    Ok(())
}

#[tokio::test]
async fn empty_directory_completes_with_zero_counts() -> Result<()> {
    let dir = tempdir()?;
    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());
    let runner = runner_with(storage.clone());

    let stats = runner.run(&run_config(dir.path())).await?;
    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.successful_records, 0);
    assert!(storage.fetch_all_users().await?.is_empty());
    assert!(storage.fetch_program_stats().await?.is_empty());
    Ok(())
}
