//! Request kinds: how a response body becomes a typed result
//!
//! Each kind parses network responses and may answer from the cache. JSON
//! kinds produce cache fragments for every entity carrying an `ern`.

use serde_json::Value;
use shoplist_core::domain::Ern;
use shoplist_core::ports::{HttpMethod, TransportResponse};

use crate::cache::{Cache, CacheItem};
use crate::query::is_success;
use crate::request::RequestSpec;
use crate::response::{Fault, Response};

/// Parse capability of a request
pub trait RequestKind: Send + 'static {
    type Output: Send + 'static;

    /// Turn a raw HTTP response into a result
    fn parse_network(&self, spec: &RequestSpec, raw: &TransportResponse) -> Response<Self::Output>;

    /// Answer from the cache, if this kind can. `None` means go to the network.
    fn parse_cache(&self, _spec: &RequestSpec, _cache: &Cache) -> Option<Response<Self::Output>> {
        None
    }
}

/// Shared status handling: non-success statuses become API faults
fn check_status(raw: &TransportResponse) -> Result<(), Fault> {
    if is_success(raw.status) {
        Ok(())
    } else {
        Err(Fault::from_status(raw.status, &raw.body))
    }
}

fn parse_json(raw: &TransportResponse) -> Result<Value, Fault> {
    check_status(raw)?;
    serde_json::from_slice(&raw.body).map_err(|e| Fault::Parse(e.to_string()))
}

/// Cache fragment for an entity with a well-formed `ern`
fn fragment(value: &Value) -> Option<CacheItem> {
    let ern = value.get("ern")?.as_str()?;
    ern.parse::<Ern>().ok()?;
    Some(CacheItem::new(ern, value.clone()))
}

// ============================================================================
// String
// ============================================================================

/// Body as UTF-8 text; never cached
#[derive(Debug, Clone, Copy, Default)]
pub struct StringRequest;

impl RequestKind for StringRequest {
    type Output = String;

    fn parse_network(&self, _spec: &RequestSpec, raw: &TransportResponse) -> Response<String> {
        if let Err(fault) = check_status(raw) {
            return Response::error(fault);
        }
        match String::from_utf8(raw.body.clone()) {
            Ok(text) => Response::success(text),
            Err(e) => Response::error(Fault::Parse(e.to_string())),
        }
    }
}

// ============================================================================
// JSON object
// ============================================================================

/// A single JSON object, cached under its ERN when fetched with GET
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectRequest;

impl RequestKind for JsonObjectRequest {
    type Output = Value;

    fn parse_network(&self, spec: &RequestSpec, raw: &TransportResponse) -> Response<Value> {
        let value = match parse_json(raw) {
            Ok(value) => value,
            Err(fault) => return Response::error(fault),
        };
        if !value.is_object() {
            return Response::error(Fault::Parse("expected a JSON object".into()));
        }

        let cache = match spec.method {
            HttpMethod::Get => fragment(&value).into_iter().collect(),
            _ => Vec::new(),
        };
        Response::success_with_cache(value, cache)
    }

    fn parse_cache(&self, spec: &RequestSpec, cache: &Cache) -> Option<Response<Value>> {
        if !spec.params.is_empty() {
            return None;
        }
        cache.get_entity(&spec.url).map(Response::success)
    }
}

// ============================================================================
// JSON array
// ============================================================================

/// A JSON array of entities; each entity with an ERN becomes a cache fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArrayRequest;

impl RequestKind for JsonArrayRequest {
    type Output = Vec<Value>;

    fn parse_network(&self, spec: &RequestSpec, raw: &TransportResponse) -> Response<Vec<Value>> {
        let items = match parse_json(raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => return Response::error(Fault::Parse("expected a JSON array".into())),
            Err(fault) => return Response::error(fault),
        };

        let cache = match spec.method {
            HttpMethod::Get => items.iter().filter_map(fragment).collect(),
            _ => Vec::new(),
        };
        Response::success_with_cache(items, cache)
    }

    fn parse_cache(&self, spec: &RequestSpec, cache: &Cache) -> Option<Response<Vec<Value>>> {
        cache.get_list(&spec.url, &spec.params).map(Response::success)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ok(body: Value) -> TransportResponse {
        TransportResponse {
            status: 200,
            body: serde_json::to_vec(&body).unwrap_or_default(),
            ..Default::default()
        }
    }

    fn get(url: &str) -> RequestSpec {
        RequestSpec::new(HttpMethod::Get, url)
    }

    #[test]
    fn test_string_request() {
        let raw = TransportResponse {
            status: 200,
            body: b"hello".to_vec(),
            ..Default::default()
        };
        let response = StringRequest.parse_network(&get("/x"), &raw);
        assert_eq!(response.into_result(), Ok("hello".to_string()));

        let raw = TransportResponse {
            status: 200,
            body: vec![0xff, 0xfe],
            ..Default::default()
        };
        assert!(matches!(
            StringRequest.parse_network(&get("/x"), &raw).fault(),
            Some(Fault::Parse(_))
        ));
    }

    #[test]
    fn test_object_produces_fragment_on_get() {
        let body = json!({"id": "c1", "ern": "ern:catalog:c1", "label": "Weekly"});
        let response = JsonObjectRequest.parse_network(&get("/v2/catalogs/c1"), &ok(body.clone()));
        match response {
            Response::Success { result, cache } => {
                assert_eq!(result, body);
                assert_eq!(cache.len(), 1);
                assert_eq!(cache[0].key, "ern:catalog:c1");
            }
            Response::Error(fault) => panic!("unexpected fault: {fault}"),
        }
    }

    #[test]
    fn test_object_without_fragment_on_put() {
        let body = json!({"id": "c1", "ern": "ern:catalog:c1"});
        let spec = RequestSpec::new(HttpMethod::Put, "/v2/catalogs/c1");
        let mut response = JsonObjectRequest.parse_network(&spec, &ok(body));
        assert!(response.take_cache().is_empty());
    }

    #[test]
    fn test_array_fragments_skip_entities_without_ern() {
        let body = json!([
            {"id": "a", "ern": "ern:offer:a"},
            {"id": "b"},
            {"id": "c", "ern": "not-an-ern"},
            {"id": "d", "ern": "ern:offer:d"}
        ]);
        let mut response = JsonArrayRequest.parse_network(&get("/v2/offers"), &ok(body));
        let keys: Vec<_> = response.take_cache().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec!["ern:offer:a", "ern:offer:d"]);
        assert_eq!(response.result().map(Vec::len), Some(4));
    }

    #[test]
    fn test_wrong_shape_is_parse_fault() {
        let response = JsonArrayRequest.parse_network(&get("/v2/offers"), &ok(json!({"a": 1})));
        assert!(matches!(response.fault(), Some(Fault::Parse(_))));

        let response = JsonObjectRequest.parse_network(&get("/v2/offers/a"), &ok(json!([1])));
        assert!(matches!(response.fault(), Some(Fault::Parse(_))));
    }

    #[test]
    fn test_error_status_is_api_fault() {
        let raw = TransportResponse {
            status: 404,
            body: br#"{"code":1000,"message":"not found"}"#.to_vec(),
            ..Default::default()
        };
        let response = JsonObjectRequest.parse_network(&get("/v2/offers/a"), &raw);
        assert_eq!(response.fault().and_then(Fault::status), Some(404));
    }

    #[test]
    fn test_array_cache_lookup() {
        let cache = Cache::default();
        cache.put(CacheItem::new("ern:offer:a", json!({"id": "a"})));
        cache.put(CacheItem::new("ern:offer:b", json!({"id": "b"})));

        let mut spec = get("/v2/offers");
        spec.params.insert("offer_ids".into(), "b,a".into());
        let hit = JsonArrayRequest.parse_cache(&spec, &cache).map(Response::into_result);
        assert_eq!(hit, Some(Ok(vec![json!({"id": "b"}), json!({"id": "a"})])));

        spec.params.insert("offer_ids".into(), "a,z".into());
        assert!(JsonArrayRequest.parse_cache(&spec, &cache).is_none());
    }

    #[test]
    fn test_object_cache_lookup() {
        let cache = Cache::default();
        cache.put(CacheItem::new("ern:dealer:d9", json!({"id": "d9"})));

        let hit = JsonObjectRequest
            .parse_cache(&get("/v2/dealers/d9"), &cache)
            .map(Response::into_result);
        assert_eq!(hit, Some(Ok(json!({"id": "d9"}))));
        assert!(JsonObjectRequest.parse_cache(&get("/v2/dealers/zz"), &cache).is_none());
        assert!(StringRequest.parse_cache(&get("/v2/dealers/d9"), &cache).is_none());
    }
}
