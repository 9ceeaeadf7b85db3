//! Scheduling order, parsing and fault mapping through a live queue

use std::sync::{Arc, Mutex};
use std::time::Duration;

use shoplist_core::ports::{HttpMethod, TransportError};
use shoplist_net::{Fault, JsonObjectRequest, Priority, Request, RequestState, StringRequest};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_priority_order_with_single_worker() {
    let server = MockServer::start().await;
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(name))
            .mount(&server)
            .await;
    }

    let (queue, mut context) = common::build_queue(&server, 1);
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for (name, priority) in [("a", Priority::Low), ("b", Priority::High), ("c", Priority::Low)] {
        let sink = delivered.clone();
        let request = Request::get(StringRequest, format!("/{name}"))
            .priority(priority)
            .on_complete(move |response| {
                if let Ok(body) = response.into_result() {
                    sink.lock().unwrap().push(body);
                }
            });
        handles.push(queue.add(request));
    }
    assert_eq!(queue.stats().queued, 3);

    queue.start();
    for _ in &handles {
        assert_eq!(context.next().await, Some(true));
    }

    let received: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(received, vec!["/b", "/a", "/c"]);
    assert_eq!(*delivered.lock().unwrap(), vec!["b", "a", "c"]);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_json_object_with_params_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/catalogs/c1"))
        .and(query_param("r_locale", "da_DK"))
        .and(header("X-Token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "c1",
            "ern": "ern:catalog:c1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = common::start_queue(&server, 2);
    let request = Request::get(JsonObjectRequest, "/v2/catalogs/c1")
        .param("r_locale", "da_DK")
        .header("X-Token", "abc");
    let (handle, rx) = queue.add_awaitable(request);

    let value = rx.await.unwrap().into_result().unwrap();
    assert_eq!(value["id"], "c1");
    assert_eq!(handle.state(), RequestState::Finished);

    let names = common::event_names(&handle);
    assert_eq!(names.first().map(String::as_str), Some("enqueued"));
    assert!(names.contains(&"dispatched".to_string()));
    assert!(names.contains(&"network-complete".to_string()));
}

#[tokio::test]
async fn test_put_sends_json_body_and_counts_bytes() {
    let server = MockServer::start().await;
    let payload = serde_json::json!({"name": "Groceries"});
    Mock::given(method("PUT"))
        .and(path("/v2/lists/1"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let queue = common::start_queue(&server, 1);
    let request = Request::new(JsonObjectRequest, HttpMethod::Put, "/v2/lists/1")
        .json_body(&payload)
        .unwrap();
    let (handle, rx) = queue.add_awaitable(request);
    assert!(rx.await.unwrap().is_success());
    common::wait_finished(&handle).await;

    let stats = queue.stats();
    assert_eq!(stats.bytes_in, "{\"ok\":true}".len() as u64);
    assert_eq!(stats.bytes_out, serde_json::to_vec(&payload).unwrap().len() as u64);
    assert_eq!(stats.live, 0);
}

#[tokio::test]
async fn test_api_error_is_delivered_as_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/offers/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": 1100,
            "message": "not found",
            "details": "offer missing"
        })))
        .mount(&server)
        .await;

    let queue = common::start_queue(&server, 1);
    let (_handle, rx) = queue.add_awaitable(Request::get(JsonObjectRequest, "/v2/offers/missing"));

    match rx.await.unwrap().into_result() {
        Err(Fault::Api { status, code, message, details }) => {
            assert_eq!(status, 404);
            assert_eq!(code, Some(1100));
            assert_eq!(message, "not found");
            assert_eq!(details.as_deref(), Some("offer missing"));
        }
        other => panic!("expected API fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_network_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let queue = common::start_queue(&server, 1);
    let request = Request::get(StringRequest, "/slow").timeout(Duration::from_millis(200));
    let (handle, rx) = queue.add_awaitable(request);

    let fault = rx.await.unwrap().into_result().unwrap_err();
    assert!(matches!(
        fault,
        Fault::Network(TransportError::Timeout(d)) if d == Duration::from_millis(200)
    ));
    assert!(common::event_names(&handle).contains(&"network-error".to_string()));
}

#[tokio::test]
async fn test_double_finish_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .mount(&server)
        .await;

    let queue = common::start_queue(&server, 1);
    let (handle, rx) = queue.add_awaitable(Request::get(StringRequest, "/once"));
    rx.await.unwrap();
    common::wait_finished(&handle).await;

    let before = queue.stats();
    assert!(!queue.finish(&handle, "again"));
    assert_eq!(queue.stats(), before);
    assert_eq!(before.bytes_in, 1);
}

#[tokio::test]
async fn test_shutdown_stops_workers() {
    let server = MockServer::start().await;
    let queue = common::start_queue(&server, 3);
    queue.shutdown().await;

    let handle = queue.add(Request::get(StringRequest, "/late"));
    assert!(handle.is_canceled());
    assert!(handle.is_finished());
    assert_eq!(queue.pending(), 0);
}
