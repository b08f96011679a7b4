// Tests for batch lookups against a mocked WebDriver endpoint

use serde_json::json;
use squatwatch_core::search::{SearchOptions, SearchProgressCallback, execute_search};
use squatwatch_scanner::{DriverBackend, RadarSearcher, RetryPolicy, SearchTimings};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const RESULTS_PAGE: &str = r#"<html><body>
<div id="search-block1"><div class="new-alert__description">No phishing websites found</div></div>
<table id="results4">
  <tr class="mutator_true row_score row_score_">
    <td><span class="pull-left label label-part-of-url http full-width-mutator status_active mutation-malicious">examp1e.com</span></td>
    <td><div class="vcenter"><i class="fa fa-globe"></i></div></td>
  </tr>
</table>
<table id="results2"></table>
</body></html>"#;

fn searcher(server: &MockServer, attempts: usize) -> RadarSearcher {
    let endpoint = Url::parse(&server.uri()).unwrap();
    RadarSearcher::new(DriverBackend::Remote(endpoint))
        .with_timings(SearchTimings {
            search_box: Duration::from_millis(100),
            result_sections: Duration::from_millis(100),
            expand_buttons: Duration::from_millis(50),
            list_settle: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
        })
        .with_retry_policy(RetryPolicy::immediate(attempts))
        .with_base_url("https://radar.test/radar/")
}

fn options(domains: &[&str]) -> SearchOptions {
    SearchOptions {
        domains: domains.iter().map(|d| d.to_string()).collect(),
        threads: 2,
        show_progress_bars: false,
    }
}

async fn mount_ok(server: &MockServer, http_method: &str, route: &str, value: serde_json::Value) {
    Mock::given(method(http_method))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": value })))
        .mount(server)
        .await;
}

async fn mount_session(server: &MockServer) {
    mount_ok(server, "POST", "/session", json!({ "sessionId": "s-1", "capabilities": {} })).await;
    mount_ok(server, "POST", "/session/s-1/url", json!(null)).await;
    mount_ok(server, "DELETE", "/session/s-1", json!(null)).await;
}

async fn mount_working_page(server: &MockServer) {
    mount_session(server).await;
    mount_ok(server, "POST", "/session/s-1/element", json!({ ELEMENT_KEY: "el-1" })).await;
    mount_ok(server, "GET", "/session/s-1/element/el-1/displayed", json!(true)).await;
    mount_ok(server, "GET", "/session/s-1/element/el-1/enabled", json!(true)).await;
    mount_ok(server, "POST", "/session/s-1/element/el-1/click", json!(null)).await;
    mount_ok(server, "POST", "/session/s-1/element/el-1/value", json!(null)).await;
    mount_ok(server, "GET", "/session/s-1/url", json!("https://radar.test/radar/?id=abc")).await;
    mount_ok(server, "GET", "/session/s-1/source", json!(RESULTS_PAGE)).await;
}

#[tokio::test]
async fn test_batch_collects_every_domain() {
    let server = MockServer::start().await;
    mount_working_page(&server).await;

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let callback: SearchProgressCallback = Arc::new(move |msg: String| sink.lock().unwrap().push(msg));

    let outcome = execute_search(
        &searcher(&server, 1),
        options(&["example.com", "example.org", "example.net"]),
        Some(callback),
    )
    .await
    .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.total_records(), 3);

    let mut searched: Vec<&str> = outcome.results.iter().map(|r| r.domain.as_str()).collect();
    searched.sort();
    assert_eq!(searched, vec!["example.com", "example.net", "example.org"]);
    assert!(outcome.results.iter().all(|r| r.search_id.as_deref() == Some("abc")));

    assert_eq!(messages.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_timed_out_domains_are_skipped() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "Unable to locate element" }
        })))
        .mount(&server)
        .await;

    let outcome = execute_search(&searcher(&server, 1), options(&["example.com"]), None)
        .await
        .unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].domain, "example.com");
    assert!(outcome.failures[0].reason.contains("Gave up after 1 attempts"));
}

#[tokio::test]
async fn test_proxy_failure_aborts_batch() {
    let server = MockServer::start().await;
    mount_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "unexpected alert open", "message": "Proxy refused connection" }
        })))
        .mount(&server)
        .await;

    let err = execute_search(&searcher(&server, 3), options(&["example.com", "example.org"]), None)
        .await
        .unwrap_err();

    assert!(err.contains("Failed to connect to proxy"));
}

#[tokio::test]
async fn test_fatal_abort_closes_running_sessions() {
    let server = MockServer::start().await;

    // First session hits the proxy alert, the second is mid-lookup when that happens.
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-1", "capabilities": {} }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-2", "capabilities": {} }
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_ok(&server, "POST", "/session/s-1/url", json!(null)).await;
    mount_ok(&server, "DELETE", "/session/s-1", json!(null)).await;
    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "unexpected alert open", "message": "Proxy refused connection" }
        })))
        .mount(&server)
        .await;

    mount_ok(&server, "POST", "/session/s-2/url", json!(null)).await;
    Mock::given(method("POST"))
        .and(path("/session/s-2/element"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "value": { ELEMENT_KEY: "el-2" } }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    mount_ok(&server, "GET", "/session/s-2/element/el-2/displayed", json!(true)).await;
    mount_ok(&server, "GET", "/session/s-2/element/el-2/enabled", json!(true)).await;
    mount_ok(&server, "POST", "/session/s-2/element/el-2/click", json!(null)).await;
    mount_ok(&server, "POST", "/session/s-2/element/el-2/value", json!(null)).await;
    mount_ok(&server, "GET", "/session/s-2/url", json!("https://radar.test/radar/?id=abc")).await;
    mount_ok(&server, "GET", "/session/s-2/source", json!(RESULTS_PAGE)).await;
    Mock::given(method("DELETE"))
        .and(path("/session/s-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    let err = execute_search(
        &searcher(&server, 1),
        options(&["example.com", "example.org", "example.net"]),
        None,
    )
    .await
    .unwrap_err();

    assert!(err.contains("Failed to connect to proxy"));
    // The third domain never opens a session once the batch is aborting.
    assert_eq!(
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/session")
            .count(),
        2
    );
}

#[tokio::test]
async fn test_empty_domain_list_is_rejected() {
    let server = MockServer::start().await;
    let err = execute_search(&searcher(&server, 1), options(&[]), None)
        .await
        .unwrap_err();

    assert_eq!(err, "No domains to search");
}
