//! Integration tests driving the HTTP operator surface and the in-process
//! broker together, covering the end-to-end scenarios this system is
//! built around: happy path, defer-then-take, cancellation while queued,
//! cancellation while in-flight, overload, and timeout on take.

use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use broker_core::{
    Broker, CancelSignal, DataBlock, InFlightRegistry, Input, OutputOption, OutputSchema,
    Visualization, WorkQueue,
};
use broker_server::http::{router, HttpState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn grid_request(options: Vec<(&str, &str)>) -> broker_core::Request {
    broker_core::Request {
        inputs: vec![Input {
            visualization: Some(Visualization::Grid { rows: 2, cols: 2 }),
            data: Some(DataBlock::Ints {
                values: vec![0, 1, 1, 0],
            }),
        }],
        output: Some(OutputSchema::OptionList {
            options: options
                .into_iter()
                .map(|(label, hotkey)| OutputOption {
                    label: label.into(),
                    hotkey: hotkey.into(),
                })
                .collect(),
        }),
    }
}

struct Harness {
    broker: Arc<Broker>,
    queue: Arc<WorkQueue>,
    app: axum::Router,
}

fn harness(max_inflight: usize) -> Harness {
    let queue = Arc::new(WorkQueue::new(max_inflight));
    let registry = Arc::new(InFlightRegistry::new());
    let broker = Arc::new(Broker::new(queue.clone(), registry.clone()));
    let gateway = Arc::new(broker_core::OperatorGateway::new(
        queue.clone(),
        registry.clone(),
    ));
    let app = router(HttpState {
        gateway,
        take_poll_window: Duration::from_millis(200),
    });
    Harness { broker, queue, app }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn post(app: axum::Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            HttpRequest::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn scenario_1_happy_path() {
    let h = harness(10);
    let (_cancel_handle, cancel) = CancelSignal::without_deadline();

    let request = grid_request(vec![("A", "a"), ("B", "b")]);
    let collect_fut = h.broker.collect(request, cancel);
    tokio::pin!(collect_fut);

    tokio::time::sleep(Duration::from_millis(10)).await;

    let (status, body) = get(h.app.clone(), "/data.json").await;
    assert_eq!(status, StatusCode::OK);
    let uuid = body["uuid"].as_str().unwrap().to_string();
    assert_eq!(body["queue"]["total"], 0);

    let (status, ack) = post(
        h.app.clone(),
        &format!("/submit/{uuid}"),
        r#"{"index":1}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ok");

    let response = collect_fut.await.unwrap();
    assert_eq!(response.index, 1);

    let (_status, status_body) = get(h.app.clone(), "/queue/status").await;
    assert_eq!(status_body["total"], 0);
    assert_eq!(status_body["active"], 0);
    assert_eq!(status_body["deferred"], 0);
}

#[tokio::test]
async fn scenario_2_defer_then_take() {
    let h = harness(10);
    let (_hx, cx) = CancelSignal::without_deadline();
    let (_hy, cy) = CancelSignal::without_deadline();
    let (_hz, cz) = CancelSignal::without_deadline();

    let fx = h.broker.collect(grid_request(vec![("A", "a"), ("B", "b")]), cx);
    let fy = h.broker.collect(grid_request(vec![("A", "a"), ("B", "b")]), cy);
    let fz = h.broker.collect(grid_request(vec![("A", "a"), ("B", "b")]), cz);
    tokio::pin!(fx);
    tokio::pin!(fy);
    tokio::pin!(fz);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (_status, taken_x) = get(h.app.clone(), "/data.json").await;
    let id_x = taken_x["uuid"].as_str().unwrap().to_string();

    let (_status, next) = post(h.app.clone(), &format!("/defer/{id_x}"), "").await;
    let id_y = next["uuid"].as_str().unwrap().to_string();

    let (_status, next) = get(h.app.clone(), "/data.json").await;
    let id_z = next["uuid"].as_str().unwrap().to_string();
    assert_ne!(id_y, id_z);

    let (_status, next) = get(h.app.clone(), "/data.json").await;
    let id_x_again = next["uuid"].as_str().unwrap().to_string();
    assert_eq!(id_x_again, id_x);

    post(h.app.clone(), &format!("/submit/{id_y}"), r#"{"index":0}"#).await;
    post(h.app.clone(), &format!("/submit/{id_z}"), r#"{"index":0}"#).await;
    post(h.app.clone(), &format!("/submit/{id_x}"), r#"{"index":0}"#).await;

    assert!(fx.await.is_ok());
    assert!(fy.await.is_ok());
    assert!(fz.await.is_ok());
}

#[tokio::test]
async fn scenario_3_cancellation_while_queued() {
    let h = harness(10);
    let (handle, cancel) = CancelSignal::without_deadline();

    let collect_fut = h
        .broker
        .collect(grid_request(vec![("A", "a"), ("B", "b")]), cancel);
    tokio::pin!(collect_fut);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.queue.len(), 1);

    handle.cancel();
    let result = collect_fut.await;
    assert!(result.is_err());
    assert_eq!(h.queue.len(), 0);
}

#[tokio::test]
async fn scenario_4_cancellation_while_in_flight() {
    let h = harness(10);
    let (handle, cancel) = CancelSignal::without_deadline();

    let collect_fut = h
        .broker
        .collect(grid_request(vec![("A", "a"), ("B", "b")]), cancel);
    tokio::pin!(collect_fut);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (_status, taken) = get(h.app.clone(), "/data.json").await;
    let id = taken["uuid"].as_str().unwrap().to_string();

    handle.cancel();
    let result = collect_fut.await;
    assert!(result.is_err());

    let (status, _body) = post(h.app.clone(), &format!("/submit/{id}"), r#"{"index":0}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scenario_5_overload() {
    let h = harness(2);
    let (_h1, c1) = CancelSignal::without_deadline();
    let (_h2, c2) = CancelSignal::without_deadline();
    let (_h3, c3) = CancelSignal::without_deadline();

    let f1 = h.broker.collect(grid_request(vec![("A", "a"), ("B", "b")]), c1);
    let f2 = h.broker.collect(grid_request(vec![("A", "a"), ("B", "b")]), c2);
    tokio::pin!(f1);
    tokio::pin!(f2);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.queue.len(), 2);

    let err = h
        .broker
        .collect(grid_request(vec![("A", "a"), ("B", "b")]), c3)
        .await
        .unwrap_err();
    assert!(matches!(err, broker_core::BrokerError::Overloaded));
    assert_eq!(h.queue.len(), 2);
}

#[tokio::test]
async fn scenario_6_timeout_on_take() {
    let h = harness(10);
    let start = tokio::time::Instant::now();
    let (status, _body) = get(h.app.clone(), "/data.json").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert!(start.elapsed() >= Duration::from_millis(200));
}
