//! Integration tests for shoplist-net
//!
//! Uses wiremock to stand in for the API and drives the request queue end to
//! end: scheduling order, cache short-circuiting, cancellation and faults.

mod common;

mod test_cache;
mod test_cancellation;
mod test_dispatch;
