//! Cache short-circuiting through the queue

use std::time::Duration;

use shoplist_net::{JsonArrayRequest, JsonObjectRequest, Request, RequestState};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

async fn mount_offers(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/v2/offers"))
        .and(query_param("offer_ids", "a,b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a", "ern": "ern:offer:a", "heading": "Milk"},
            {"id": "b", "ern": "ern:offer:b", "heading": "Bread"}
        ])))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_set_lookup_served_from_cache() {
    let server = MockServer::start().await;
    mount_offers(&server, 1).await;
    let queue = common::start_queue(&server, 2);

    let (_first, rx) = queue.add_awaitable(Request::get(JsonArrayRequest, "/v2/offers").param("offer_ids", "a,b"));
    assert_eq!(rx.await.unwrap().into_result().unwrap().len(), 2);
    assert_eq!(queue.cache().len(), 2);

    let (second, rx) = queue.add_awaitable(Request::get(JsonArrayRequest, "/v2/offers").param("offer_ids", "b,a"));
    let offers = rx.await.unwrap().into_result().unwrap();
    assert_eq!(offers[0]["heading"], "Bread");
    assert_eq!(offers[1]["heading"], "Milk");
    assert!(second.is_cache_hit());
    assert_eq!(second.state(), RequestState::Finished);
    assert!(!common::event_names(&second).contains(&"dispatched".to_string()));

    let (single, rx) = queue.add_awaitable(Request::get(JsonObjectRequest, "/v2/offers/a"));
    assert_eq!(rx.await.unwrap().into_result().unwrap()["heading"], "Milk");
    assert!(single.is_cache_hit());
}

#[tokio::test]
async fn test_ignore_cache_goes_to_network() {
    let server = MockServer::start().await;
    mount_offers(&server, 2).await;
    let queue = common::start_queue(&server, 1);

    let (_h, rx) = queue.add_awaitable(Request::get(JsonArrayRequest, "/v2/offers").param("offer_ids", "a,b"));
    rx.await.unwrap();

    let (handle, rx) = queue.add_awaitable(
        Request::get(JsonArrayRequest, "/v2/offers")
            .param("offer_ids", "a,b")
            .ignore_cache(true),
    );
    assert!(rx.await.unwrap().is_success());
    assert!(!handle.is_cache_hit());
}

#[tokio::test]
async fn test_partial_hit_goes_to_network() {
    let server = MockServer::start().await;
    mount_offers(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v2/offers"))
        .and(query_param("offer_ids", "a,c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": "a", "ern": "ern:offer:a"},
            {"id": "c", "ern": "ern:offer:c"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let queue = common::start_queue(&server, 1);

    let (_h, rx) = queue.add_awaitable(Request::get(JsonArrayRequest, "/v2/offers").param("offer_ids", "a,b"));
    rx.await.unwrap();

    let (handle, rx) = queue.add_awaitable(Request::get(JsonArrayRequest, "/v2/offers").param("offer_ids", "a,c"));
    assert_eq!(rx.await.unwrap().into_result().unwrap().len(), 2);
    assert!(!handle.is_cache_hit());
    assert_eq!(queue.cache().len(), 3);
}

#[tokio::test]
async fn test_ttl_override_expires_fragments() {
    let server = MockServer::start().await;
    mount_offers(&server, 2).await;
    let queue = common::start_queue(&server, 1);

    let request = || {
        Request::get(JsonArrayRequest, "/v2/offers")
            .param("offer_ids", "a,b")
            .cache_ttl(Duration::from_millis(50))
    };
    let (_h, rx) = queue.add_awaitable(request());
    rx.await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    let (handle, rx) = queue.add_awaitable(request());
    assert!(rx.await.unwrap().is_success());
    assert!(!handle.is_cache_hit());
}

#[tokio::test]
async fn test_not_modified_served_from_cached_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/offers/a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(
            {"id": "a", "ern": "ern:offer:a", "heading": "Milk"}
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/offers/a"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    let queue = common::start_queue(&server, 1);

    let (_first, rx) = queue.add_awaitable(Request::get(JsonObjectRequest, "/v2/offers/a"));
    assert!(rx.await.unwrap().is_success());

    let (second, rx) = queue.add_awaitable(Request::get(JsonObjectRequest, "/v2/offers/a").ignore_cache(true));
    let offer = rx.await.unwrap().into_result().unwrap();
    assert_eq!(offer["heading"], "Milk");
    assert!(common::event_names(&second).contains(&"not-modified-cache".to_string()));
}

#[tokio::test]
async fn test_not_modified_without_cached_copy_is_parse_fault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/offers/z"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;
    let queue = common::start_queue(&server, 1);

    let (_handle, rx) = queue.add_awaitable(Request::get(JsonObjectRequest, "/v2/offers/z"));
    assert!(matches!(
        rx.await.unwrap().into_result(),
        Err(shoplist_net::Fault::Parse(_))
    ));
}
