//! Shared helpers for request queue integration tests

use std::sync::Arc;
use std::time::Duration;

use shoplist_net::{Cache, Delivery, DeliveryContext, HttpTransport, QueueOptions, RequestHandle, RequestQueue};
use wiremock::MockServer;

/// Build a queue pointed at the mock server. Workers are not started and
/// the delivery context is returned to the caller.
pub fn build_queue(server: &MockServer, workers: usize) -> (Arc<RequestQueue>, DeliveryContext) {
    let transport = HttpTransport::new("shoplist-test").expect("transport");
    let (delivery, context) = Delivery::channel();
    let queue = RequestQueue::new(
        Arc::new(transport),
        Arc::new(Cache::default()),
        delivery,
        QueueOptions {
            workers,
            base_url: Some(server.uri()),
            ..QueueOptions::default()
        },
    );
    (queue, context)
}

/// Build and start a queue, delivering callbacks on a background task
pub fn start_queue(server: &MockServer, workers: usize) -> Arc<RequestQueue> {
    let (queue, context) = build_queue(server, workers);
    tokio::spawn(context.run());
    queue.start();
    queue
}

/// Poll until the request has finished, failing after a few seconds
pub async fn wait_finished(handle: &RequestHandle) {
    for _ in 0..500 {
        if handle.is_finished() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request {} did not finish", handle.sequence());
}

pub fn event_names(handle: &RequestHandle) -> Vec<String> {
    handle.events().into_iter().map(|e| e.name).collect()
}
