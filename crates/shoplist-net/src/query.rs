//! Query string canonicalization
//!
//! Parameters are always emitted in lexicographic key order so that the same
//! logical request produces the same URL, and therefore the same cache
//! identity, regardless of how the caller built its parameter map.

use url::form_urlencoded;

/// Encode parameters as `application/x-www-form-urlencoded`, keys sorted.
///
/// Spaces become `+`; a missing value is emitted as the empty string.
pub fn map_to_query_string<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, Option<V>)> = params.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut out = String::new();
    for (key, value) in &pairs {
        if !out.is_empty() {
            out.push('&');
        }
        out.extend(form_urlencoded::byte_serialize(key.as_ref().as_bytes()));
        out.push('=');
        if let Some(value) = value {
            out.extend(form_urlencoded::byte_serialize(value.as_ref().as_bytes()));
        }
    }
    out
}

/// Append the canonical query string to `url`; no `?` when there are no parameters.
pub fn request_to_url_and_query<'a, I>(url: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let query = map_to_query_string(params.into_iter().map(|(k, v)| (k, Some(v))));
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{query}")
    }
}

/// 2xx and 304 responses are eligible for success parsing; the queue answers
/// a 304 from its cached copy when it has one
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status) || status == 304
}
