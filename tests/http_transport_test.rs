mod common;

use common::click;
use pixel_relay::buffer::{Batch, BatchTrigger};
use pixel_relay::domain::PageContext;
use pixel_relay::scheduler::FlushOutcome;
use pixel_relay::sender::{ClientConfig, HttpTransport, TransmissionError, Transport};
use pixel_relay::{PixelClient, RelaySettings};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(ClientConfig {
        endpoint: format!("{}/track", server.uri()),
        timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    })
    .unwrap()
}

fn batch_of(request: &Request) -> Vec<Value> {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    body["batch"].as_array().cloned().unwrap_or_default()
}

#[tokio::test]
async fn batch_is_posted_as_json_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/track"))
        .and(header("content-type", "application/json"))
        .and(header("x-batch-trigger", "scheduled"))
        .and(header_exists("x-batch-id"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let batch = Batch::new(vec![click("a"), click("b")], BatchTrigger::Scheduled);
    let result = transport.send(&batch).await.unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(result.batch_id, batch.id());
    assert!(!result.compressed);

    let requests = server.received_requests().await.unwrap();
    let events = batch_of(&requests[0]);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "click");
    assert_eq!(events[0]["data"]["label"], "a");
    assert!(events[0]["sessionId"].is_string());
    assert!(events[0]["userAgent"].is_string());
    assert!(events[0]["timestamp"].is_string());
    assert_eq!(requests[0].headers["x-batch-size"], "2");

    let stats = transport.client.connection_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 1);
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let batch = Batch::new(vec![click("a")], BatchTrigger::Scheduled);

    assert!(matches!(
        transport.send(&batch).await,
        Err(TransmissionError::HttpError { status: 500 })
    ));
    assert_eq!(transport.client.connection_stats().failed_requests, 1);
}

#[tokio::test]
async fn slow_collector_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(ClientConfig {
        endpoint: format!("{}/track", server.uri()),
        timeout: Duration::from_millis(200),
        ..ClientConfig::default()
    })
    .unwrap();
    let batch = Batch::new(vec![click("a")], BatchTrigger::Scheduled);

    assert!(matches!(
        transport.send(&batch).await,
        Err(TransmissionError::Timeout)
    ));
}

#[tokio::test]
async fn large_batches_are_gzipped_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-encoding", "gzip"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(ClientConfig {
        endpoint: format!("{}/track", server.uri()),
        enable_compression: true,
        compression_threshold: 2,
        ..ClientConfig::default()
    })
    .unwrap();
    let events = (0..3).map(|n| click(&n.to_string())).collect();
    let result = transport
        .send(&Batch::new(events, BatchTrigger::Manual))
        .await
        .unwrap();

    assert!(result.compressed);
}

#[tokio::test]
async fn beacon_returns_immediately_and_settles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-batch-trigger", "termination"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server);
    let batch = Batch::new(vec![click("last")], BatchTrigger::Termination);

    transport.beacon(batch).unwrap();
    assert_eq!(transport.pending_beacons(), 1);
    assert!(transport.settle(Duration::from_secs(2)).await);
    assert_eq!(transport.pending_beacons(), 0);
    assert_eq!(transport.client.connection_stats().beacons_sent, 1);
}

#[tokio::test]
async fn failed_delivery_is_requeued_then_delivered_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = PixelClient::builder(RelaySettings::default())
        .page(PageContext::new("https://shop.example/", "", "agent"))
        .transport(Arc::new(transport_for(&server)))
        .build()
        .unwrap();

    client.track_click("one", "a", "One");
    assert!(matches!(client.flush().await, FlushOutcome::Requeued { events: 1, .. }));
    assert_eq!(client.queue().len(), 1);

    client.track_click("two", "a", "Two");
    assert!(matches!(client.flush().await, FlushOutcome::Delivered { events: 2, .. }));
    assert!(client.queue().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let labels: Vec<Value> = batch_of(&requests[1])
        .iter()
        .map(|event| event["data"]["label"].clone())
        .collect();
    assert_eq!(labels, ["one", "two"]);
}

#[tokio::test]
async fn terminate_delivers_session_end_through_beacon() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = PixelClient::builder(RelaySettings::default())
        .page(PageContext::new("https://shop.example/checkout", "", "agent"))
        .transport(Arc::new(transport_for(&server)))
        .build()
        .unwrap();
    client.start().unwrap();
    client.track_click("pay", "button", "Pay");

    let outcome = client.terminate().await;
    assert_eq!(outcome, pixel_relay::scheduler::TerminationOutcome::Beacon { events: 2 });

    let requests = server.received_requests().await.unwrap();
    let events = batch_of(&requests[0]);
    assert_eq!(events[1]["type"], "session_end");
    assert_eq!(events[1]["data"]["final_url"], "https://shop.example/checkout");
}
