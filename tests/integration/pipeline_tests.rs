//! End-to-end harvest runs: source, scheduler and sink together

use crate::common::{create_test_config, titled_page};
use harvest_relay::config::ExtractorConfig;
use harvest_relay::crawler::{harvest, run_batches, BatchRunner};
use harvest_relay::output::JsonFileSink;
use harvest_relay::source::{JsonFileSource, MemorySource};
use harvest_relay::state::CandidateGroup;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_catalog(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ring"))
        .respond_with(ResponseTemplate::new(200).set_body_string(titled_page("Ring")))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/necklace"))
        .respond_with(ResponseTemplate::new(201).set_body_string(titled_page("Necklace")))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(mock_server)
        .await;
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("Failed to read artifact");
    serde_json::from_str(&content).expect("Artifact is not valid JSON")
}

#[tokio::test]
async fn test_harvest_writes_numbered_artifacts() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;
    let base = mock_server.uri();

    let groups = vec![
        CandidateGroup::new("ring", vec![format!("{}/missing", base), format!("{}/ring", base)]),
        CandidateGroup::single("lost", format!("{}/missing", base)),
        CandidateGroup::single("necklace", format!("{}/necklace", base)),
    ];
    let mut source = MemorySource::from_groups(groups, 2);

    let out = TempDir::new().expect("Failed to create temp dir");
    let mut sink = JsonFileSink::new(out.path()).expect("Failed to create sink");

    let config = create_test_config(4, 1, 0.01);
    let stats = harvest(&config, &mut source, &mut sink)
        .await
        .expect("Harvest failed");

    assert_eq!(stats.batches, 2);
    assert_eq!(stats.groups_resolved, 2);
    assert_eq!(stats.groups_failed, 1);
    assert_eq!(stats.failed_candidates, 1);

    // Batch 1 holds "ring" (resolved) and "lost" (failed)
    let results = read_json(&out.path().join("result_1.json"));
    assert_eq!(results.as_array().map(Vec::len), Some(1));
    assert_eq!(results[0]["group_id"], "ring");
    assert_eq!(results[0]["fields"]["title"], "Ring");
    assert_eq!(results[0]["url"], format!("{}/ring", base));

    let faulty = read_json(&out.path().join("faulty_1.json"));
    assert_eq!(faulty[0]["group_id"], "lost");
    assert_eq!(faulty[0]["reason"], "status 404");
    assert_eq!(faulty[0]["attempts"], 1);

    // Batch 2 only has a success, so no failure artifact is written
    let results = read_json(&out.path().join("result_2.json"));
    assert_eq!(results[0]["fields"]["title"], "Necklace");
    assert!(!out.path().join("faulty_2.json").exists());
}

#[tokio::test]
async fn test_harvest_from_json_lines_input() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server).await;
    let base = mock_server.uri();

    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("urls.jsonl");
    let lines = [
        format!(r#"{{"id": 101, "url": "{}/missing"}}"#, base),
        format!(r#"{{"id": 101, "url": "{}/ring"}}"#, base),
        format!(r#"{{"id": "102", "url": "{}/missing"}}"#, base),
        r#"{"url": "no id here"}"#.to_string(),
    ];
    std::fs::write(&input, lines.join("\n")).expect("Failed to write input");

    let mut source = JsonFileSource::new(vec![input], 10, 5).expect("Failed to open input");
    let mut sink = JsonFileSink::new(dir.path().join("out")).expect("Failed to create sink");

    let stats = harvest(&create_test_config(4, 0, 0.01), &mut source, &mut sink)
        .await
        .expect("Harvest failed");

    assert_eq!(stats.batches, 1);
    assert_eq!(stats.groups_resolved, 1);
    assert_eq!(stats.groups_failed, 1);
    assert_eq!(source.skipped_records(), 1);

    let results = read_json(&dir.path().join("out").join("result_1.json"));
    assert_eq!(results[0]["group_id"], "101");
    assert_eq!(results[0]["fields"]["title"], "Ring");
}

#[tokio::test]
async fn test_harvest_embedded_data_extractor() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/product"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><script>
            var react_data = {'product_id': 42, 'name': 'Solitaire', 'internal': true,};
            </script></html>"#,
        ))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(2, 0, 0.01);
    config.extractor = ExtractorConfig::EmbeddedData {
        keys: vec!["product_id".to_string(), "name".to_string()],
    };

    let mut source = MemorySource::new(vec![vec![CandidateGroup::single(
        "sku-42",
        format!("{}/product", mock_server.uri()),
    )]]);
    let out = TempDir::new().expect("Failed to create temp dir");
    let mut sink = JsonFileSink::new(out.path()).expect("Failed to create sink");

    let stats = harvest(&config, &mut source, &mut sink)
        .await
        .expect("Harvest failed");
    assert_eq!(stats.groups_resolved, 1);

    let results = read_json(&out.path().join("result_1.json"));
    assert_eq!(results[0]["fields"]["product_id"], 42);
    assert_eq!(results[0]["fields"]["name"], "Solitaire");
    assert!(results[0]["fields"].get("internal").is_none());
}

#[tokio::test]
async fn test_harvest_empty_source() {
    let out = TempDir::new().expect("Failed to create temp dir");
    let mut sink = JsonFileSink::new(out.path()).expect("Failed to create sink");
    let mut source = MemorySource::default();

    let stats = harvest(&create_test_config(2, 0, 0.01), &mut source, &mut sink)
        .await
        .expect("Harvest failed");

    assert_eq!(stats.batches, 0);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_shutdown_stops_after_current_batch() {
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

    let mut source = MemorySource::new(vec![
        vec![CandidateGroup::single("first", format!("{}/1", mock_server.uri()))],
        vec![CandidateGroup::single("second", format!("{}/2", mock_server.uri()))],
    ]);
    let out = TempDir::new().expect("Failed to create temp dir");
    let mut sink = JsonFileSink::new(out.path()).expect("Failed to create sink");

    let runner = BatchRunner::from_config(&create_test_config(2, 0, 0.01))
        .expect("Failed to build runner");
    let stopper = runner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.shutdown();
    });

    let stats = run_batches(&runner, &mut source, &mut sink)
        .await
        .expect("Harvest failed");

    assert_eq!(stats.batches, 1);
    assert_eq!(stats.groups_resolved, 1);
    assert!(out.path().join("result_1.json").exists());
    assert!(!out.path().join("result_2.json").exists());
}
