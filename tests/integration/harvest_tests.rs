//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the code search API and run
//! crawls and enrichment end-to-end against a temporary data directory.

use gh_harvest::config::{parse_config, Config};
use gh_harvest::crawler::{
    Coordinator, Credential, CredentialRotator, Enricher, GitHubClient,
};
use gh_harvest::storage::{
    Ledger, ParquetStore, RecordStore, RunStatus, ITEM_KEY_COLUMN, REPO_KEY_COLUMN,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches search requests whose `q` ends with `filename:<prefix>`
struct FilenamePrefix(&'static str);

impl Match for FilenamePrefix {
    fn matches(&self, request: &Request) -> bool {
        let suffix = format!("filename:{}", self.0);
        request
            .url
            .query_pairs()
            .any(|(key, value)| key == "q" && value.ends_with(&suffix))
    }
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, data_dir: &Path, inner: &str, budget: u32) -> Config {
    let toml = format!(
        r#"
[api]
base-url = "{base_url}"
language = "YAML"
timeout-secs = 5

[crawler]
failure-budget = {budget}
politeness-delay-ms = 0
max-rate-limit-retries = 3
rate-limit-margin-secs = 0
outer-alphabet = "a"
inner-alphabet = "{inner}"

[enrichment]
politeness-delay-ms = 0

[output]
data-dir = "{data_dir}"

[[query]]
name = "mtls_strict_v1"
text = '"kind: PeerAuthentication" "mode: STRICT"'
"#,
        base_url = base_url,
        budget = budget,
        inner = inner,
        data_dir = data_dir.display()
    );
    parse_config(&toml).expect("Failed to parse test config")
}

fn rotator() -> CredentialRotator {
    CredentialRotator::new(vec![Credential::new("one"), Credential::new("two")])
        .expect("Failed to build rotator")
}

fn search_page(names: &[&str]) -> ResponseTemplate {
    let items: Vec<_> = names
        .iter()
        .map(|name| {
            json!({
                "name": "peer-authentication.yaml",
                "path": "mesh/peer-authentication.yaml",
                "repository": {
                    "full_name": name,
                    "owner": {"login": name.split('/').next().unwrap()},
                    "fork": false
                }
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({"total_count": items.len(), "items": items}))
}

/// Every search nobody scripted comes back empty
async fn mount_empty_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(search_page(&[]))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, prefix: &'static str, page: u32, names: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(FilenamePrefix(prefix))
        .and(query_param("page", page.to_string()))
        .respond_with(search_page(names))
        .mount(server)
        .await;
}

fn output_file(data_dir: &Path) -> PathBuf {
    data_dir.join("mtls/v1/mtls_strict_v1_a.parquet")
}

fn stored_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = ParquetStore::new(ITEM_KEY_COLUMN)
        .keys(path)
        .expect("Failed to read partition")
        .into_iter()
        .collect();
    names.sort();
    names
}

async fn search_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/search/code")
        .collect()
}

async fn run_crawl(config: Config, fresh: bool) -> gh_harvest::crawler::CrawlReport {
    let client = GitHubClient::new(&config.api).expect("Failed to build client");
    let mut coordinator =
        Coordinator::new(config, client, rotator(), fresh).expect("Failed to create coordinator");
    coordinator.run().await.expect("Crawl failed")
}

#[tokio::test]
async fn test_crawl_stops_at_empty_page() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    mount_page(&mock_server, "aa", 1, &["octo/one", "octo/two"]).await;
    mount_page(&mock_server, "aa", 2, &["octo/three"]).await;
    mount_empty_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "a", 10);
    let report = run_crawl(config, false).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.records_saved, 3);
    assert_eq!(
        stored_names(&output_file(data_dir.path())),
        vec!["octo/one", "octo/three", "octo/two"]
    );

    let requests = search_requests(&mock_server).await;
    assert_eq!(requests.len(), 3, "pages 1-3 only, never page 4");
    let q = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(
        q,
        "\"kind: PeerAuthentication\" \"mode: STRICT\" language:YAML filename:aa"
    );
}

#[tokio::test]
async fn test_rerun_produces_identical_store() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    mount_page(&mock_server, "aa", 1, &["octo/one", "octo/two"]).await;
    mount_page(&mock_server, "ab", 1, &["octo/two", "octo/three"]).await;
    mount_empty_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "ab", 10);
    run_crawl(config.clone(), false).await;
    let path = output_file(data_dir.path());
    let first = ParquetStore::new(ITEM_KEY_COLUMN).read_all(&path).unwrap();

    // Resume skips the completed partition without any request
    let before = search_requests(&mock_server).await.len();
    let resumed = run_crawl(config.clone(), false).await;
    assert_eq!(resumed.partitions_skipped, 1);
    assert_eq!(search_requests(&mock_server).await.len(), before);

    // A fresh walk re-fetches everything but writes nothing new
    let fresh = run_crawl(config, true).await;
    assert_eq!(fresh.records_saved, 0);
    let second = ParquetStore::new(ITEM_KEY_COLUMN).read_all(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn test_failure_budget_stops_requests_and_flushes() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    mount_page(&mock_server, "aa", 1, &["octo/kept"]).await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
        )
        .with_priority(10)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "abcdefgh", 6);
    let ledger_path = config.ledger_path();
    let report = run_crawl(config, false).await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.failures, 6);
    // aa pages 1-2, then ab..af page 1; ag and ah are never requested
    assert_eq!(search_requests(&mock_server).await.len(), 7);
    assert_eq!(
        stored_names(&output_file(data_dir.path())),
        vec!["octo/kept"]
    );

    let ledger = gh_harvest::storage::SqliteLedger::new(&ledger_path).unwrap();
    assert_eq!(ledger.count_failures(report.run_id).unwrap(), 6);
    assert!(!ledger.is_partition_complete("mtls_strict_v1", "a").unwrap());
    assert_eq!(
        ledger.get_run(report.run_id).unwrap().status,
        RunStatus::Aborted
    );
}

#[tokio::test]
async fn test_rate_limit_retries_with_same_credential() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(FilenamePrefix("aa"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({"message": "API rate limit exceeded for user ID 1."})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/code"))
        .and(FilenamePrefix("aa"))
        .and(query_param("page", "1"))
        .and(header("Authorization", "token one"))
        .respond_with(search_page(&["octo/patient"]))
        .with_priority(2)
        .mount(&mock_server)
        .await;
    mount_empty_fallback(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "a", 10);
    let report = run_crawl(config, false).await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.failures, 0);
    assert_eq!(report.requests, 3);
    assert_eq!(
        stored_names(&output_file(data_dir.path())),
        vec!["octo/patient"]
    );
}

#[tokio::test]
async fn test_persistent_rate_limit_charges_budget() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search/code"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_string("rate limit exceeded"),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "a", 1);
    let report = run_crawl(config, false).await;

    assert_eq!(report.status, RunStatus::Aborted);
    // One initial attempt plus three retries
    assert_eq!(search_requests(&mock_server).await.len(), 4);
}

#[tokio::test]
async fn test_enrichment_end_to_end() {
    let mock_server = MockServer::start().await;
    let data_dir = TempDir::new().unwrap();

    mount_page(&mock_server, "aa", 1, &["octo/one", "octo/gone"]).await;
    mount_empty_fallback(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/one"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "octo/one",
            "stargazers_count": 42,
            "topics": ["istio", "mesh"],
            "license": {"key": "apache-2.0"},
            "owner": {"login": "octo"}
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), data_dir.path(), "a", 10);
    run_crawl(config.clone(), false).await;

    let client = GitHubClient::new(&config.api).unwrap();
    let mut enricher = Enricher::new(config.clone(), client, rotator()).unwrap();
    let report = enricher.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.repositories_saved, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.failures, 0);

    let repos = data_dir.path().join("v1_repos.parquet");
    let rows = ParquetStore::new(REPO_KEY_COLUMN).read_all(&repos).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["full_name"], "octo/one");
    assert_eq!(rows[0]["stargazers_count"], 42);
    assert_eq!(rows[0]["license_key"], "apache-2.0");
    assert_eq!(rows[0]["topics"], r#"["istio","mesh"]"#);

    // A second pass only retries the repository that was not found
    let client = GitHubClient::new(&config.api).unwrap();
    let again = Enricher::new(config, client, rotator())
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(again.repositories_saved, 0);
    assert_eq!(again.repositories_skipped, 1);
    assert_eq!(again.not_found, 1);
}
