//! Cancellation at enqueue, dispatch and delivery

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shoplist_net::{Request, RequestState, StringRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn mount_ok(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

fn counting(route: &str, hits: &Arc<AtomicUsize>) -> Request<StringRequest> {
    let hits = hits.clone();
    Request::get(StringRequest, route).on_complete(move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_cancel_before_dispatch_skips_network() {
    let server = MockServer::start().await;
    mount_ok(&server, "/x").await;
    let (queue, mut context) = common::build_queue(&server, 1);
    let hits = Arc::new(AtomicUsize::new(0));

    let handle = queue.add(counting("/x", &hits));
    assert!(handle.cancel());
    queue.start();
    common::wait_finished(&handle).await;

    assert_eq!(context.run_pending(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(common::event_names(&handle).contains(&"canceled-at-dispatch".to_string()));
    assert_eq!(handle.state(), RequestState::Canceled);
}

#[tokio::test]
async fn test_cancel_after_dispatch_before_delivery() {
    let server = MockServer::start().await;
    mount_ok(&server, "/x").await;
    let (queue, mut context) = common::build_queue(&server, 1);
    let hits = Arc::new(AtomicUsize::new(0));

    queue.start();
    let handle = queue.add(counting("/x", &hits));
    common::wait_finished(&handle).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    assert!(handle.cancel());
    assert_eq!(context.next().await, Some(false));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(common::event_names(&handle).contains(&"canceled-at-delivery".to_string()));
}

#[tokio::test]
async fn test_cancel_after_delivery_is_rejected() {
    let server = MockServer::start().await;
    mount_ok(&server, "/x").await;
    let (queue, mut context) = common::build_queue(&server, 1);
    let hits = Arc::new(AtomicUsize::new(0));

    queue.start();
    let handle = queue.add(counting("/x", &hits));
    assert_eq!(context.next().await, Some(true));

    assert!(!handle.cancel());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), RequestState::Finished);
}

#[tokio::test]
async fn test_cancel_all_by_tag() {
    let server = MockServer::start().await;
    mount_ok(&server, "/tagged").await;
    mount_ok(&server, "/other").await;
    let (queue, mut context) = common::build_queue(&server, 2);
    let hits = Arc::new(AtomicUsize::new(0));

    let tagged: Vec<_> = (0..3)
        .map(|_| queue.add(counting("/tagged", &hits).tag("batch")))
        .collect();
    let other = queue.add(counting("/other", &hits).tag("keep"));

    assert_eq!(queue.cancel_all("batch"), 3);
    assert_eq!(queue.cancel_all("batch"), 0);

    queue.start();
    for handle in tagged.iter().chain(std::iter::once(&other)) {
        common::wait_finished(handle).await;
    }
    assert_eq!(context.next().await, Some(true));
    assert_eq!(context.run_pending(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(tagged.iter().all(|h| h.is_canceled()));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/other");
}
