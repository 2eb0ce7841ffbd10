//! Pagination and stop conditions of the run scanner against a mock provider.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ci_miner_lib::RepoSpec;
use ci_miner_lib::ci::{Client, EventCategory, FetchPolicy, PageProgress, ScanRequest, Scanner, StopReason};
use core::time::Duration;
use serde_json::{Value, json};
use std::collections::HashSet;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RUNS_PATH: &str = "/repos/owner/repo/actions/runs";

fn policy() -> FetchPolicy {
    FetchPolicy {
        max_retries: 2,
        base_backoff: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        preemptive_quota_threshold: 0,
        max_rate_limit_wait: Duration::from_secs(10),
    }
}

fn run(id: u64, sha: &str, head_repo: &str, updated: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "name": "CI",
        "head_sha": sha,
        "head_repository": { "full_name": head_repo },
        "event": "push",
        "status": "completed",
        "conclusion": "success",
        "created_at": updated.to_rfc3339(),
        "updated_at": updated.to_rfc3339(),
    })
}

fn page(runs: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "total_count": runs.len(), "workflow_runs": runs }))
}

async fn mount_page(server: &MockServer, number: u32, runs: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(RUNS_PATH))
        .and(query_param("page", number.to_string()))
        .and(query_param("event", "push"))
        .respond_with(page(runs))
        .mount(server)
        .await;
}

fn targets(shas: &[&str]) -> HashSet<String> {
    shas.iter().map(ToString::to_string).collect()
}

struct Fixture {
    server: MockServer,
    repo: RepoSpec,
    now: DateTime<Utc>,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            repo: RepoSpec::parse_str("https://github.com/owner/repo").unwrap(),
            now: Utc::now(),
        }
    }

    async fn scan(&self, targets: &HashSet<String>, page_cap: u32) -> (ci_miner_lib::ci::ScanOutcome, Vec<PageProgress>) {
        let scanner = Scanner::new(Client::new(None, self.server.uri(), policy()).unwrap());
        let request = ScanRequest {
            repo: &self.repo,
            event: EventCategory::Push,
            branch: None,
            cutoff: self.now - ChronoDuration::days(7),
            targets,
            page_cap,
        };

        let mut pages = Vec::new();
        let mut on_page = |p: PageProgress| pages.push(p);
        let outcome = scanner.scan(&request, &mut on_page).await.unwrap();
        (outcome, pages)
    }
}

#[tokio::test]
async fn test_stops_once_every_target_is_covered() {
    let f = Fixture::new().await;
    mount_page(&f.server, 1, vec![run(1, "a", "owner/repo", f.now), run(2, "b", "owner/repo", f.now)]).await;
    mount_page(&f.server, 2, vec![run(3, "c", "owner/repo", f.now)]).await;

    let (outcome, pages) = f.scan(&targets(&["a", "c"]), 10).await;

    assert_eq!(outcome.stop_reason, StopReason::FullCoverage);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.runs.len(), 3);
    assert_eq!(outcome.covered, targets(&["a", "c"]));
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].total_runs, 3);
    assert_eq!(pages[1].covered, 2);
}

#[tokio::test]
async fn test_stops_when_runs_predate_cutoff() {
    let f = Fixture::new().await;
    let old = f.now - ChronoDuration::days(30);
    mount_page(&f.server, 1, vec![run(1, "x", "owner/repo", f.now), run(2, "y", "owner/repo", old)]).await;
    mount_page(&f.server, 2, vec![run(3, "a", "owner/repo", f.now)]).await;

    let (outcome, _) = f.scan(&targets(&["a"]), 10).await;

    assert_eq!(outcome.stop_reason, StopReason::PastCutoff);
    assert_eq!(outcome.pages, 1);
    assert!(outcome.covered.is_empty());
}

#[tokio::test]
async fn test_page_cap_bounds_the_scan() {
    let f = Fixture::new().await;
    for n in 1..=3 {
        mount_page(&f.server, n, vec![run(u64::from(n), &format!("s{n}"), "owner/repo", f.now)]).await;
    }

    let (outcome, pages) = f.scan(&targets(&["never"]), 2).await;

    assert_eq!(outcome.stop_reason, StopReason::PageCap);
    assert_eq!(outcome.pages, 2);
    assert_eq!(outcome.runs.len(), 2);
    assert_eq!(pages.len(), 2);
}

#[tokio::test]
async fn test_empty_page_ends_the_scan_and_is_reported() {
    let f = Fixture::new().await;
    mount_page(&f.server, 1, vec![run(1, "x", "owner/repo", f.now)]).await;
    mount_page(&f.server, 2, vec![]).await;

    let (outcome, pages) = f.scan(&targets(&["a"]), 10).await;

    assert_eq!(outcome.stop_reason, StopReason::EmptyPage);
    assert_eq!(outcome.pages, 2);
    assert_eq!(pages.last().unwrap().page_runs, 0);
    assert_eq!(pages.last().unwrap().total_runs, 1);
}

#[tokio::test]
async fn test_runs_from_forks_are_discarded() {
    let f = Fixture::new().await;
    mount_page(
        &f.server,
        1,
        vec![run(1, "a", "someone-else/repo", f.now), run(2, "b", "Owner/Repo", f.now)],
    )
    .await;
    mount_page(&f.server, 2, vec![]).await;

    let (outcome, _) = f.scan(&targets(&["a", "b", "c"]), 10).await;

    assert_eq!(outcome.runs.len(), 1);
    assert_eq!(outcome.runs[0].id, 2);
    assert_eq!(outcome.covered, targets(&["b"]));
}

#[tokio::test]
async fn test_covered_is_limited_to_targets() {
    let f = Fixture::new().await;
    mount_page(&f.server, 1, vec![run(1, "a", "owner/repo", f.now), run(2, "stranger", "owner/repo", f.now)]).await;
    mount_page(&f.server, 2, vec![]).await;

    let wanted = targets(&["a", "b"]);
    let (outcome, _) = f.scan(&wanted, 10).await;

    assert!(outcome.covered.is_subset(&wanted));
    assert_eq!(outcome.covered, targets(&["a"]));
    assert_eq!(outcome.runs.len(), 2);
}

#[tokio::test]
async fn test_failed_page_propagates_error() {
    let f = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path(RUNS_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&f.server)
        .await;

    let scanner = Scanner::new(Client::new(None, f.server.uri(), policy()).unwrap());
    let wanted = targets(&["a"]);
    let request = ScanRequest {
        repo: &f.repo,
        event: EventCategory::Push,
        branch: Some("main"),
        cutoff: f.now,
        targets: &wanted,
        page_cap: 3,
    };

    let mut on_page = |_: PageProgress| {};
    let _ = scanner.scan(&request, &mut on_page).await.unwrap_err();
}
