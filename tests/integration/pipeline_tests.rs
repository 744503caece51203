use geocrawl::config::{
    load_config, BatchConfig, Config, LookupConfig, StorageBackend, StorageConfig,
};
use geocrawl::pipeline::run_batches;
use geocrawl::BatchState;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "geo-results";

/// Creates a test configuration against a mock lookup service
fn create_test_config(base_url: &str, workdir: &Path, max_workers: u32, timeout: u64) -> Config {
    Config {
        lookup: LookupConfig {
            base_url: base_url.to_string(),
            max_workers,
            request_timeout_secs: timeout,
            connect_timeout_secs: 1,
            user_agent: Some("geocrawl-test/1.0".to_string()),
        },
        batches: BatchConfig {
            batch_name_template: "Sheet{}".to_string(),
            input_object_name_template: "input/sheet_{}.csv".to_string(),
            output_file_name_template: "{}.jsonl".to_string(),
            output_object_name_template: "output/{}.jsonl".to_string(),
            staging_dir: workdir.join("staging"),
            batch_parallelism: 1,
            skip_header: true,
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            bucket: BUCKET.to_string(),
            root: Some(workdir.join("buckets")),
            region: None,
        },
    }
}

/// Writes an input object with an `ip` header into the test bucket
fn write_input(workdir: &Path, index: usize, ips: &[&str]) {
    let dir = workdir.join("buckets").join(BUCKET).join("input");
    std::fs::create_dir_all(&dir).unwrap();

    let mut content = String::from("ip\n");
    for ip in ips {
        content.push_str(ip);
        content.push('\n');
    }
    std::fs::write(dir.join(format!("sheet_{}.csv", index)), content).unwrap();
}

/// Reads an uploaded artifact back as parsed records
fn read_output(workdir: &Path, name: &str) -> Vec<Value> {
    let path = workdir
        .join("buckets")
        .join(BUCKET)
        .join("output")
        .join(format!("{}.jsonl", name));
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing output {}: {}", path.display(), e));

    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON object"))
        .collect()
}

fn record_for<'a>(records: &'a [Value], ip: &str) -> &'a Value {
    records
        .iter()
        .find(|r| r["ip"] == ip)
        .unwrap_or_else(|| panic!("no record for {}", ip))
}

fn staging_is_empty(workdir: &Path) -> bool {
    match std::fs::read_dir(workdir.join("staging")) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn test_slow_lookup_becomes_error_record() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/1.1.1.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "country": "AU"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/8.8.8.8"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "country": "US" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    write_input(workdir.path(), 1, &["1.1.1.1", "8.8.8.8"]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 1, 1);

    let report = run_batches(&config, 1..2).await.expect("run should start");

    assert!(report.all_succeeded(), "{:?}", report.outcomes);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].name, "Sheet1");
    assert_eq!(report.outcomes[0].records_written, 2);
    assert_eq!(report.outcomes[0].lookup_errors, 1);

    let records = read_output(workdir.path(), "Sheet1");
    assert_eq!(records.len(), 2);

    let ok = record_for(&records, "1.1.1.1");
    assert_eq!(ok["country"], "AU");
    assert_eq!(ok["url"], format!("{}/1.1.1.1", mock_server.uri()));
    assert!(ok.get("error").is_none());

    let slow = record_for(&records, "8.8.8.8");
    assert_eq!(slow["url"], format!("{}/8.8.8.8", mock_server.uri()));
    assert!(slow["error"].as_str().unwrap().contains("8.8.8.8"));
    assert!(slow.get("country").is_none());

    assert!(staging_is_empty(workdir.path()));
}

#[tokio::test]
async fn test_every_identifier_gets_exactly_one_record() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/10.0.0.13"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success"
        })))
        .mount(&mock_server)
        .await;

    let owned: Vec<String> = (0..40).map(|i| format!("10.0.0.{}", i)).collect();
    let mut ips: Vec<&str> = owned.iter().map(String::as_str).collect();
    // Duplicates are looked up and recorded once per occurrence
    ips.push("10.0.0.1");
    ips.push("10.0.0.1");
    write_input(workdir.path(), 1, &ips);

    let config = create_test_config(&mock_server.uri(), workdir.path(), 4, 5);
    let report = run_batches(&config, 1..2).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.outcomes[0].identifiers, 42);
    assert_eq!(report.total_records(), 42);
    assert_eq!(report.total_lookup_errors(), 1);

    let records = read_output(workdir.path(), "Sheet1");
    assert_eq!(records.len(), 42);
    assert_eq!(records.iter().filter(|r| r["ip"] == "10.0.0.1").count(), 3);

    let failed = record_for(&records, "10.0.0.13");
    assert!(failed["error"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn test_ip_and_url_win_over_remote_fields() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/9.9.9.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ip": "spoofed",
            "url": "spoofed",
            "city": "Zurich"
        })))
        .mount(&mock_server)
        .await;

    write_input(workdir.path(), 1, &["9.9.9.9"]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 2, 5);
    run_batches(&config, 1..2).await.unwrap();

    let records = read_output(workdir.path(), "Sheet1");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["ip"], "9.9.9.9");
    assert_eq!(records[0]["url"], format!("{}/9.9.9.9", mock_server.uri()));
    assert_eq!(records[0]["city"], "Zurich");
}

#[tokio::test]
async fn test_empty_batch_uploads_empty_artifact() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    write_input(workdir.path(), 1, &[]);
    let config = create_test_config(&mock_server.uri(), workdir.path(), 2, 5);

    let report = run_batches(&config, 1..2).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.total_records(), 0);
    assert!(read_output(workdir.path(), "Sheet1").is_empty());
    assert!(staging_is_empty(workdir.path()));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_missing_input_fails_only_that_batch() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "country": "NZ"
        })))
        .mount(&mock_server)
        .await;

    write_input(workdir.path(), 1, &["1.2.3.4"]);
    // Sheet2 has no input object
    write_input(workdir.path(), 3, &["5.6.7.8", "9.10.11.12"]);

    let config = create_test_config(&mock_server.uri(), workdir.path(), 2, 5);
    let report = run_batches(&config, 1..4).await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "Sheet2");
    assert_eq!(failed[0].failed_in, Some(BatchState::Enumerating));

    assert_eq!(read_output(workdir.path(), "Sheet1").len(), 1);
    assert_eq!(read_output(workdir.path(), "Sheet3").len(), 2);
    assert!(staging_is_empty(workdir.path()));
}

#[tokio::test]
async fn test_run_from_config_file() {
    let mock_server = MockServer::start().await;
    let workdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/4.4.4.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "country": "US"
        })))
        .mount(&mock_server)
        .await;

    write_input(workdir.path(), 7, &["4.4.4.4"]);

    let toml = format!(
        r#"
[lookup]
base-url = "{base}"
max-workers = 3
request-timeout-secs = 5

[batches]
batch-name-template = "Sheet{{}}"
input-object-name-template = "input/sheet_{{}}.csv"
output-file-name-template = "{{}}.jsonl"
output-object-name-template = "output/{{}}.jsonl"
staging-dir = "{staging}"

[storage]
backend = "local"
bucket = "{bucket}"
root = "{root}"
"#,
        base = mock_server.uri(),
        staging = workdir.path().join("staging").display(),
        bucket = BUCKET,
        root = workdir.path().join("buckets").display(),
    );
    let config_path = workdir.path().join("geocrawl.toml");
    std::fs::write(&config_path, toml).unwrap();

    let config = load_config(&config_path).expect("config should load");
    let report = run_batches(&config, 7..8).await.unwrap();

    assert!(report.all_succeeded());
    let records = read_output(workdir.path(), "Sheet7");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["country"], "US");
}
