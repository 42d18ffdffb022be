//! Scheduler scenarios against mock servers
//!
//! Each test races real HTTP candidates through the retry engine and checks
//! the group result plus how many requests the server actually saw.

use crate::common::{create_test_config, scheduler_for, titled_page};
use harvest_relay::crawler::BatchRunner;
use harvest_relay::state::{CandidateGroup, FailureReason, GroupStatus};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_transient_errors_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/p1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Third Time")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 3, 0.01));
    let url = format!("{}/p1", mock_server.uri());

    let result = scheduler
        .resolve(CandidateGroup::single("p1", url.clone()))
        .await;

    match result.status {
        GroupStatus::Resolved {
            url: winner,
            fields,
            attempts,
        } => {
            assert_eq!(winner, url);
            assert_eq!(attempts, 3);
            assert_eq!(fields["title"], "Third Time");
        }
        other => panic!("Expected resolved group, got {:?}", other),
    }
}

#[tokio::test]
async fn test_terminal_status_falls_through_to_next_candidate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Found")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 2, 0.01));
    let gone = format!("{}/gone", mock_server.uri());
    let ok = format!("{}/ok", mock_server.uri());

    let result = scheduler
        .resolve(CandidateGroup::new("g", vec![gone, ok.clone()]))
        .await;

    assert!(result.is_resolved());
    let (winner, fields, attempts) = result.winner().expect("resolved");
    assert_eq!(winner, ok);
    assert_eq!(fields["title"], "Found");
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_all_candidates_exhaust_retries() {
    let mock_server = MockServer::start().await;

    // max_retries = 2 allows three attempts per candidate
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 2, 0.01));
    let a = format!("{}/a", mock_server.uri());
    let b = format!("{}/b", mock_server.uri());

    let result = scheduler.resolve(CandidateGroup::new("g", vec![a, b])).await;

    let failures = result.failures().expect("group should fail");
    assert_eq!(failures.len(), 2);
    for failure in failures {
        assert_eq!(failure.reason.to_string(), "max retries exceeded");
        assert_eq!(failure.reason.detail(), Some("status 503"));
        assert_eq!(failure.attempts, 3);
    }
    assert!(!result.was_cancelled());
}

#[tokio::test]
async fn test_concurrency_limit_respected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(titled_page("Slow"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(5)
        .mount(&mock_server)
        .await;

    let config = create_test_config(2, 0, 0.01);
    let runner = BatchRunner::from_config(&config).expect("Failed to build runner");

    let groups = (0..5)
        .map(|i| CandidateGroup::single(format!("g{}", i), format!("{}/item/{}", mock_server.uri(), i)))
        .collect();

    let start = Instant::now();
    let batch = runner.run(groups).await;

    assert_eq!(batch.successes.len(), 5);
    assert!(batch.failures.is_empty());
    assert_eq!(runner.limiter().peak(), 2);
    assert_eq!(runner.limiter().in_flight(), 0);
    // Five 200ms responses through two slots need at least three waves
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_extraction_failure_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blank"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><p>no heading</p></body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 3, 0.01));
    let url = format!("{}/blank", mock_server.uri());

    let result = scheduler.resolve(CandidateGroup::single("g", url)).await;

    let failures = result.failures().expect("group should fail");
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].reason, FailureReason::ExtractionFailed(_)));
    assert_eq!(failures[0].reason.to_string(), "extraction failed");
    assert_eq!(failures[0].attempts, 1);
}

#[tokio::test]
async fn test_success_cancels_sibling_before_retry() {
    let mock_server = MockServer::start().await;

    // The sibling backs off for at least 250ms after its first 503 and must
    // observe the group signal before trying again
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(titled_page("Winner"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 3, 0.5));
    let flaky = format!("{}/flaky", mock_server.uri());
    let fast = format!("{}/fast", mock_server.uri());

    let result = scheduler
        .resolve(CandidateGroup::new("g", vec![flaky, fast.clone()]))
        .await;

    let (winner, _, _) = result.winner().expect("resolved");
    assert_eq!(winner, fast);

    // Outlast the sibling's longest possible backoff (1.5 * 0.5s)
    tokio::time::sleep(Duration::from_millis(1000)).await;
    mock_server.verify().await;
}

#[tokio::test]
async fn test_header_template_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(header("dnt", "1"))
        .and(header("upgrade-insecure-requests", "1"))
        .and(header_exists("user-agent"))
        .and(header_exists("referer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Headers")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 0, 0.01));
    let url = format!("{}/headers", mock_server.uri());

    let result = scheduler.resolve(CandidateGroup::single("g", url)).await;

    assert!(result.is_resolved(), "Template headers missing: {:?}", result.status);
}

#[tokio::test]
async fn test_user_agent_rotates_between_attempts() {
    let mock_server = MockServer::start().await;

    // Each agent is throttled once; only a repeated agent reaches the 200
    Mock::given(method("GET"))
        .and(header("user-agent", "AgentA"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(header("user-agent", "AgentB"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Rotated")))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(4, 2, 0.01);
    config.http.user_agent_pool = vec!["AgentA".to_string(), "AgentB".to_string()];
    let scheduler = scheduler_for(&config);
    let url = format!("{}/rotate", mock_server.uri());

    let result = scheduler.resolve(CandidateGroup::single("g", url)).await;

    let (_, _, attempts) = result.winner().expect("resolved");
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_batch_deadline_cancels_groups() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = create_test_config(4, 10, 0.5);
    let runner = BatchRunner::from_config(&config)
        .expect("Failed to build runner")
        .with_deadline(Some(Duration::from_millis(300)));

    let groups = vec![
        CandidateGroup::single("a", format!("{}/a", mock_server.uri())),
        CandidateGroup::new(
            "b",
            vec![
                format!("{}/b1", mock_server.uri()),
                format!("{}/b2", mock_server.uri()),
            ],
        ),
    ];

    let start = Instant::now();
    let batch = runner.run(groups).await;

    assert!(batch.successes.is_empty());
    assert_eq!(batch.failures.len(), 2);
    assert_eq!(batch.failed_candidates(), 3);
    for group in &batch.failures {
        assert!(group.was_cancelled());
        for failure in group.failures().expect("failed") {
            assert_eq!(failure.reason, FailureReason::Cancelled);
            assert!(failure.attempts >= 1);
        }
    }
    // Ten retries at this backoff would take far longer than the deadline
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_batch_preserves_submission_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(titled_page("Slow"))
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/quick"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Quick")))
        .mount(&mock_server)
        .await;

    let runner = BatchRunner::from_config(&create_test_config(4, 0, 0.01))
        .expect("Failed to build runner");

    let batch = runner
        .run(vec![
            CandidateGroup::single("first", format!("{}/slow", mock_server.uri())),
            CandidateGroup::single("second", format!("{}/quick", mock_server.uri())),
        ])
        .await;

    let ids: Vec<_> = batch.successes.iter().map(|g| g.group_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
}

#[tokio::test]
async fn test_empty_group_fails_without_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let scheduler = scheduler_for(&create_test_config(4, 0, 0.01));
    let result = scheduler.resolve(CandidateGroup::new("empty", Vec::new())).await;

    assert_eq!(result.failures().map(|f| f.len()), Some(0));
}

#[tokio::test]
async fn test_connection_errors_are_retried_until_exhausted() {
    // Bind then drop a listener so the port is known to refuse connections
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
        listener.local_addr().expect("Failed to read addr").port()
    };
    let url = format!("http://127.0.0.1:{}/refused", closed_port);

    let scheduler = scheduler_for(&create_test_config(4, 2, 0.01));
    let result = scheduler.resolve(CandidateGroup::single("g", url)).await;

    let failures = result.failures().expect("group should fail");
    assert_eq!(failures.len(), 1);
    match &failures[0].reason {
        FailureReason::RetriesExhausted { last_error } => {
            assert!(last_error.starts_with("transport error"), "{}", last_error);
        }
        other => panic!("Expected retries exhausted, got {:?}", other),
    }
    assert_eq!(failures[0].attempts, 3);
}

#[tokio::test]
async fn test_timeouts_are_retried_until_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stall"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(titled_page("Too Late"))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(4, 1, 0.01);
    config.http.request_timeout_seconds = 0.2;
    let scheduler = scheduler_for(&config);
    let url = format!("{}/stall", mock_server.uri());

    let result = scheduler.resolve(CandidateGroup::single("g", url)).await;

    let failures = result.failures().expect("group should fail");
    assert!(matches!(failures[0].reason, FailureReason::RetriesExhausted { .. }));
    assert_eq!(failures[0].attempts, 2);
}

#[tokio::test]
async fn test_only_fastest_of_several_successes_is_recorded() {
    let mock_server = MockServer::start().await;

    for (route, delay_ms) in [("/fast", 50), ("/medium", 500), ("/slow", 900)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(titled_page(route))
                    .set_delay(Duration::from_millis(delay_ms)),
            )
            .mount(&mock_server)
            .await;
    }

    let urls: Vec<String> = ["/slow", "/medium", "/fast"]
        .iter()
        .map(|route| format!("{}{}", mock_server.uri(), route))
        .collect();
    let fast = urls[2].clone();

    let scheduler = scheduler_for(&create_test_config(4, 0, 0.01));
    let result = scheduler
        .resolve(CandidateGroup::new("g", urls.clone()))
        .await;

    let (winner, fields, _) = result.winner().expect("resolved");
    assert_eq!(winner, fast);
    assert_eq!(fields["title"], "/fast");

    let runner = BatchRunner::from_config(&create_test_config(4, 0, 0.01))
        .expect("Failed to build runner");
    let batch = runner.run(vec![CandidateGroup::new("g", urls)]).await;

    assert_eq!(batch.successes.len(), 1);
    assert!(batch.failures.is_empty());
    assert_eq!(batch.successes[0].winner().map(|(url, _, _)| url), Some(fast.as_str()));
    // The group resolves on the first success without waiting for the slower candidates
    assert!(batch.elapsed < Duration::from_millis(450), "{:?}", batch.elapsed);
}

#[tokio::test]
async fn test_shutdown_cancels_waiting_candidates() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(titled_page("Slow"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let runner = BatchRunner::from_config(&create_test_config(1, 2, 0.01))
        .expect("Failed to build runner");

    let groups = (0..3)
        .map(|i| CandidateGroup::single(format!("g{}", i), format!("{}/item/{}", mock_server.uri(), i)))
        .collect();

    let stopper = runner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.shutdown();
    });

    let batch = runner.run(groups).await;

    assert!(runner.is_shut_down());
    assert_eq!(batch.successes.len(), 1);
    assert_eq!(batch.failures.len(), 2);
    for group in &batch.failures {
        let failures = group.failures().expect("failed");
        assert_eq!(failures[0].reason, FailureReason::Cancelled);
        assert_eq!(failures[0].attempts, 0);
    }
}
