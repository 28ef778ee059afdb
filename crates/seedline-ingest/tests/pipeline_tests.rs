//! End-to-end pipeline tests over a temporary data directory

use regex::Regex;
use seedline_ingest::metadata::RunMetadata;
use seedline_ingest::transform::RecordRejection;
use seedline_ingest::{PipelineConfig, PipelineOrchestrator};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Lay out `config/` and `schema/` under a fresh data directory
fn setup_data_dir(dir: &TempDir, base_url: &str) -> PipelineConfig {
    let config = PipelineConfig::from_data_dir(dir.path());

    fs::create_dir_all(config.config_path.parent().unwrap()).unwrap();
    fs::write(
        &config.config_path,
        serde_json::to_string_pretty(&json!({
            "sources": [
                {
                    "id": "users",
                    "name": "Users API",
                    "type": "REST_API",
                    "enabled": true,
                    "config": {
                        "baseUrl": base_url,
                        "endpoints": [{
                            "name": "list",
                            "path": "/users",
                            "pagination": { "defaultLimit": 2, "maxPages": 5 }
                        }],
                        "rateLimit": { "requestsPerSecond": 100, "retryAttempts": 2, "retryDelay": 10 }
                    },
                    "schemaValidation": { "enabled": true, "schemaFile": "users.schema.json" },
                    "anonymization": { "enabled": true, "fields": ["email", "phone"] }
                },
                {
                    "id": "archive",
                    "name": "Archive drop",
                    "type": "FILE",
                    "enabled": true,
                    "config": { "path": "/incoming/archive.csv" }
                },
                {
                    "id": "legacy",
                    "name": "Legacy API",
                    "type": "REST_API",
                    "enabled": false,
                    "config": { "baseUrl": base_url, "endpoints": [{ "name": "all", "path": "/legacy" }] }
                }
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    fs::create_dir_all(&config.schema_dir).unwrap();
    fs::write(
        config.schema_dir.join("users.schema.json"),
        serde_json::to_string_pretty(&json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "required": ["id", "status"],
            "properties": {
                "id": { "type": "string" },
                "email": { "type": "string" },
                "status": { "type": "string", "enum": ["active", "pending"] }
            }
        }))
        .unwrap(),
    )
    .unwrap();

    config
}

async fn mount_users(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "1", "email": "a@x.com", "phone": "555-0100", "status": "active" },
                { "id": "2", "status": "bogus" }
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "3", "email": "c@x.com", "status": "pending" }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|n| n.starts_with(prefix))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_run_produces_linked_artifacts() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    let dir = TempDir::new().unwrap();
    let config = setup_data_dir(&dir, &server.uri());

    let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();
    let summary = orchestrator.run().await.unwrap();

    // Fetch: one enabled REST source, one placeholder, one disabled
    assert_eq!(summary.fetched.len(), 3);
    assert_eq!(summary.fetched[0].record_count(), 3);

    let ts = r"\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z";
    let raw_re = Regex::new(&format!(r"^source-users-list-{}\.json$", ts)).unwrap();
    let processed_re = Regex::new(&format!(r"^processed-users-{}\.json$", ts)).unwrap();
    let seed_re = Regex::new(&format!(r"^seed-users-{}\.json$", ts)).unwrap();

    let raw_files = files_with_prefix(&config.raw_dir, "source-");
    assert_eq!(raw_files.len(), 1);
    assert!(raw_re.is_match(&raw_files[0]), "{}", raw_files[0]);

    let raw_meta: RunMetadata =
        serde_json::from_value(read_json(&config.metadata_dir.join(raw_files[0].replacen("source-", "metadata-", 1))))
            .unwrap();
    assert_eq!(raw_meta.pages_processed, Some(2));
    assert_eq!(raw_meta.record_count, 3);
    assert_eq!(raw_meta.raw_data_file.as_deref(), Some(raw_files[0].as_str()));
    assert_eq!(raw_meta.run_id, Some(summary.run_id));

    // Process: record 2 rejected, the rest anonymized
    assert_eq!(summary.processed.len(), 1);
    let processed = &summary.processed[0];
    assert!(processed_re.is_match(&processed.processed_file));
    assert_eq!(processed.original_count, 3);
    assert_eq!(processed.processed_count, 2);
    assert_eq!(processed.error_count, 1);

    let records = read_json(&config.processed_dir.join(&processed.processed_file));
    let email_re = Regex::new(r"^anon-[0-9a-f]{16}@anonymized\.local$").unwrap();
    let phone_re = Regex::new(r"^\+1-XXX-XXX-[0-9a-f]{4}$").unwrap();
    assert!(email_re.is_match(records[0]["email"].as_str().unwrap()));
    assert!(phone_re.is_match(records[0]["phone"].as_str().unwrap()));
    assert!(records[1].get("phone").is_none());

    let report: Vec<RecordRejection> = serde_json::from_value(read_json(
        &config.metadata_dir.join(processed.report_file.as_deref().unwrap()),
    ))
    .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].record_index, 1);
    assert_eq!(
        report[0].errors,
        vec!["Field 'status' value 'bogus' not in allowed values: active, pending"]
    );

    // Seed: lineage names the processed artifact from this run
    assert_eq!(summary.seeds.len(), 1);
    let seed = &summary.seeds[0];
    assert!(seed_re.is_match(&seed.seed_file));
    assert_eq!(seed.record_count, 2);

    let seeds = read_json(&config.seeds_dir.join(&seed.seed_file));
    assert_eq!(seeds[0]["seedId"], json!("users-1"));
    assert_eq!(seeds[1]["seedId"], json!("users-2"));

    let seed_meta: RunMetadata = serde_json::from_value(read_json(
        &config.metadata_dir.join(seed.seed_file.replacen("seed-", "seed-metadata-", 1)),
    ))
    .unwrap();
    let lineage = seed_meta.lineage.unwrap();
    let processed_file = lineage.processed_file.unwrap();
    assert_eq!(processed_file, processed.processed_file);
    assert!(config.processed_dir.join(&processed_file).exists());
    assert_eq!(seed_meta.run_id, Some(summary.run_id));

    let processed_meta: RunMetadata = serde_json::from_value(read_json(
        &config
            .metadata_dir
            .join(processed_file.replacen("processed-", "processed-metadata-", 1)),
    ))
    .unwrap();
    assert_eq!(processed_meta.lineage.unwrap().raw_file.as_deref(), Some(raw_files[0].as_str()));
    assert_eq!(lineage.processed_at.as_deref(), Some(processed_meta.timestamp.as_str()));
}

#[tokio::test]
async fn test_standalone_stages_rediscover_inputs() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    let dir = TempDir::new().unwrap();
    let config = setup_data_dir(&dir, &server.uri());

    let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();

    let fetched = orchestrator.fetch().await.unwrap();
    assert_eq!(fetched.fetched[0].raw_files().len(), 1);
    assert!(fetched.processed.is_empty());

    let processed = orchestrator.process().await.unwrap();
    assert_eq!(processed.processed.len(), 1);
    assert_eq!(processed.processed[0].raw_file, fetched.fetched[0].raw_files()[0]);

    let seeded = orchestrator.seed().await.unwrap();
    assert_eq!(seeded.seeds.len(), 1);
    assert_eq!(seeded.seeds[0].source_id, "users");
    assert_eq!(seeded.seeds[0].processed_file, processed.processed[0].processed_file);
}

#[tokio::test]
async fn test_rerun_never_overwrites_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1", "status": "active" }])))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = setup_data_dir(&dir, &server.uri());

    for _ in 0..2 {
        let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();
        orchestrator.run().await.unwrap();
    }

    assert_eq!(files_with_prefix(&config.raw_dir, "source-users-").len(), 2);
    assert_eq!(files_with_prefix(&config.processed_dir, "processed-users-").len(), 2);
    assert_eq!(files_with_prefix(&config.seeds_dir, "seed-users-").len(), 2);
    assert_eq!(files_with_prefix(&config.metadata_dir, "seed-metadata-users-").len(), 2);
    // no rejected records, so no reports
    assert!(files_with_prefix(&config.metadata_dir, "validation-errors-").is_empty());
}

#[tokio::test]
async fn test_failing_source_still_writes_empty_artifacts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = setup_data_dir(&dir, &server.uri());

    let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.fetched[0].record_count(), 0);
    assert_eq!(summary.processed[0].processed_count, 0);
    assert_eq!(summary.seeds[0].record_count, 0);

    let raw_files = files_with_prefix(&config.raw_dir, "source-users-");
    assert_eq!(read_json(&config.raw_dir.join(&raw_files[0])), json!([]));
}

#[tokio::test]
async fn test_endpoint_name_overlapping_another_source_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api-users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "1", "email": "alice@real.com" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "9" }])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::from_data_dir(dir.path());
    fs::create_dir_all(config.config_path.parent().unwrap()).unwrap();
    fs::write(
        &config.config_path,
        json!({
            "sources": [
                {
                    "id": "api",
                    "name": "API",
                    "type": "REST_API",
                    "enabled": true,
                    "config": {
                        "baseUrl": server.uri(),
                        "endpoints": [{ "name": "v2-users", "path": "/api-users" }],
                        "rateLimit": { "requestsPerSecond": 100 }
                    },
                    "anonymization": { "enabled": true, "fields": ["email"] }
                },
                {
                    "id": "api-v2",
                    "name": "API v2",
                    "type": "REST_API",
                    "enabled": true,
                    "config": {
                        "baseUrl": server.uri(),
                        "endpoints": [{ "name": "x", "path": "/x" }],
                        "rateLimit": { "requestsPerSecond": 100 }
                    }
                }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();
    orchestrator.fetch().await.unwrap();
    let summary = orchestrator.process().await.unwrap();

    assert_eq!(summary.processed.len(), 2);
    let api = summary.processed.iter().find(|p| p.source_id == "api").unwrap();
    assert!(api.raw_file.starts_with("source-api-v2-users-"), "{}", api.raw_file);
    assert_eq!(api.anonymized_count, 1);

    let api_v2 = summary.processed.iter().find(|p| p.source_id == "api-v2").unwrap();
    assert!(api_v2.raw_file.starts_with("source-api-v2-x-"), "{}", api_v2.raw_file);

    let records = read_json(&config.processed_dir.join(&api.processed_file));
    assert_ne!(records[0]["email"], json!("alice@real.com"));
    for file in files_with_prefix(&config.processed_dir, "processed-") {
        let body = fs::read_to_string(config.processed_dir.join(file)).unwrap();
        assert!(!body.contains("alice@real.com"));
    }

    // seeding resolves both through processed metadata
    let seeded = orchestrator.seed().await.unwrap();
    let mut seed_sources: Vec<_> = seeded.seeds.iter().map(|s| s.source_id.as_str()).collect();
    seed_sources.sort();
    assert_eq!(seed_sources, vec!["api", "api-v2"]);
}

#[tokio::test]
async fn test_failed_metadata_write_leaves_no_raw_artifact() {
    let server = MockServer::start().await;
    mount_users(&server).await;
    let dir = TempDir::new().unwrap();
    let config = setup_data_dir(&dir, &server.uri());
    // metadata/ cannot be created
    fs::write(&config.metadata_dir, "").unwrap();

    let orchestrator = PipelineOrchestrator::load(config.clone()).await.unwrap();
    assert!(orchestrator.fetch().await.is_err());

    assert!(files_with_prefix(&config.raw_dir, "source-").is_empty());
}
