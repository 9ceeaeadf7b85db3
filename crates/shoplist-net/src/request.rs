//! Request description and lifecycle
//!
//! A [`Request`] is a write-once description built with chained setters and
//! consumed by [`RequestQueue::add`](crate::dispatcher::RequestQueue::add).
//! Once enqueued, its mutable lifecycle lives in a shared [`RequestControl`]
//! that the caller observes and cancels through a [`RequestHandle`].
//!
//! ## Lifecycle
//!
//! ```text
//! ENQUEUED ──► CACHE_HIT ─────────────────────────────┐
//!    │                                                ▼
//!    └──► DISPATCHED ──► NETWORK_OK / NETWORK_ERROR ──► FINISHED ──► delivered
//!
//!  CANCELED is reachable until the callback has been delivered.
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use shoplist_core::ports::HttpMethod;

use crate::kinds::RequestKind;
use crate::response::Response;

/// Default network timeout of a request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Priority and scheduling order
// ============================================================================

/// Scheduling priority; higher priorities reach the network first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Position of a request in the dispatch order.
///
/// The greatest key is dispatched first: priority descending, then sequence
/// ascending, so a max-heap of keys yields the dispatch order directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleKey {
    pub priority: Priority,
    pub sequence: u64,
}

impl Ord for ScheduleKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduleKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// RequestSpec
// ============================================================================

/// Everything needed to execute a request, fixed once the request is enqueued
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    /// Absolute URL, or a path resolved against the queue's base URL
    pub url: String,
    pub params: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub priority: Priority,
    /// Lifetime of cache fragments produced by this request
    pub cache_ttl: Option<Duration>,
    pub ignore_cache: bool,
    /// Network timeout; `None` uses the queue's default
    pub timeout: Option<Duration>,
    pub tag: Option<String>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: BTreeMap::new(),
            headers: Vec::new(),
            body: None,
            priority: Priority::default(),
            cache_ttl: None,
            ignore_cache: false,
            timeout: None,
            tag: None,
        }
    }

    /// Only GET requests that do not opt out may be answered from the cache
    pub fn is_cacheable(&self) -> bool {
        self.method == HttpMethod::Get && !self.ignore_cache
    }
}

// ============================================================================
// Request
// ============================================================================

pub(crate) type Listener<T> = Box<dyn FnOnce(Response<T>) + Send + 'static>;

/// A typed request: its description, its parse capability and its callback
pub struct Request<K: RequestKind> {
    pub(crate) spec: RequestSpec,
    pub(crate) kind: K,
    pub(crate) listener: Option<Listener<K::Output>>,
}

impl<K: RequestKind> Request<K> {
    pub fn new(kind: K, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            spec: RequestSpec::new(method, url),
            kind,
            listener: None,
        }
    }

    pub fn get(kind: K, url: impl Into<String>) -> Self {
        Self::new(kind, HttpMethod::Get, url)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.params.insert(key.into(), value.into());
        self
    }

    pub fn params<I, Key, Val>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (Key, Val)>,
        Key: Into<String>,
        Val: Into<String>,
    {
        self.spec
            .params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.spec.body = Some(body);
        self
    }

    /// Serialize `value` as the JSON body and set the content type
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self
            .header("Content-Type", "application/json")
            .body(bytes))
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.spec.cache_ttl = Some(ttl);
        self
    }

    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.spec.ignore_cache = ignore;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.spec.tag = Some(tag.into());
        self
    }

    /// Callback invoked exactly once on the delivery context, unless canceled
    pub fn on_complete(mut self, f: impl FnOnce(Response<K::Output>) + Send + 'static) -> Self {
        self.listener = Some(Box::new(f));
        self
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }
}

impl<K: RequestKind> fmt::Debug for Request<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("spec", &self.spec)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

// ============================================================================
// RequestControl - shared lifecycle
// ============================================================================

/// Observable lifecycle state of an enqueued request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Enqueued,
    CacheHit,
    Dispatched,
    Finished,
    Canceled,
}

/// One entry of a request's event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub name: String,
    /// Time since the request was enqueued
    pub elapsed: Duration,
}

/// Receiver of the one-time finish notification
pub(crate) trait RequestOwner: Send + Sync {
    fn release(&self, control: &RequestControl);
}

const OPEN: u8 = 0;
const CANCELED: u8 = 1;
const DELIVERED: u8 = 2;

/// Lifecycle shared between the queue, the workers, delivery and the caller
pub struct RequestControl {
    sequence: u64,
    priority: Priority,
    method: HttpMethod,
    url: String,
    tag: Option<String>,
    created: Instant,
    /// OPEN until either cancel or delivery wins
    outcome: AtomicU8,
    dispatched: AtomicBool,
    cache_hit: AtomicBool,
    finished: AtomicBool,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    events: Mutex<Vec<RequestEvent>>,
    owner: OnceLock<Weak<dyn RequestOwner>>,
}

impl RequestControl {
    pub(crate) fn new(sequence: u64, spec: &RequestSpec) -> Self {
        Self {
            sequence,
            priority: spec.priority,
            method: spec.method,
            url: spec.url.clone(),
            tag: spec.tag.clone(),
            created: Instant::now(),
            outcome: AtomicU8::new(OPEN),
            dispatched: AtomicBool::new(false),
            cache_hit: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            events: Mutex::new(Vec::new()),
            owner: OnceLock::new(),
        }
    }

    /// Attach the owning queue; only the first call has an effect
    pub(crate) fn set_owner(&self, owner: Weak<dyn RequestOwner>) {
        if self.owner.set(owner).is_err() {
            tracing::warn!(sequence = self.sequence, "Request already has an owner");
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn schedule_key(&self) -> ScheduleKey {
        ScheduleKey {
            priority: self.priority,
            sequence: self.sequence,
        }
    }

    pub fn record(&self, name: impl Into<String>) {
        let event = RequestEvent {
            name: name.into(),
            elapsed: self.created.elapsed(),
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancel the request. Returns false if the callback was already delivered
    /// or the request was canceled before.
    pub fn cancel(&self) -> bool {
        let won = self
            .outcome
            .compare_exchange(OPEN, CANCELED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.record("canceled");
        }
        won
    }

    pub fn is_canceled(&self) -> bool {
        self.outcome.load(Ordering::Acquire) == CANCELED
    }

    /// Claim the right to run the callback. Fails if the request was canceled.
    pub(crate) fn begin_delivery(&self) -> bool {
        self.outcome
            .compare_exchange(OPEN, DELIVERED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_delivered(&self) -> bool {
        self.outcome.load(Ordering::Acquire) == DELIVERED
    }

    pub(crate) fn mark_dispatched(&self) {
        self.dispatched.store(true, Ordering::Release);
        self.record("dispatched");
    }

    pub(crate) fn mark_cache_hit(&self) {
        self.cache_hit.store(true, Ordering::Release);
        self.record("cache-hit");
    }

    pub fn is_cache_hit(&self) -> bool {
        self.cache_hit.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn add_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::Relaxed)
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> RequestState {
        match self.outcome.load(Ordering::Acquire) {
            CANCELED => RequestState::Canceled,
            DELIVERED => RequestState::Finished,
            _ if self.is_finished() => RequestState::Finished,
            _ if self.dispatched.load(Ordering::Acquire) => RequestState::Dispatched,
            _ if self.is_cache_hit() => RequestState::CacheHit,
            _ => RequestState::Enqueued,
        }
    }

    /// Finish the request and notify the owning queue.
    ///
    /// Only the first call has an effect; later calls are logged and ignored.
    pub fn finish(&self, reason: &str) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                sequence = self.sequence,
                reason,
                "finish() called on an already finished request"
            );
            return false;
        }

        self.record(reason);
        tracing::debug!(
            sequence = self.sequence,
            url = %self.url,
            reason,
            elapsed_ms = self.created.elapsed().as_millis() as u64,
            "Request finished"
        );

        if let Some(owner) = self.owner.get().and_then(Weak::upgrade) {
            owner.release(self);
        }
        true
    }
}

impl fmt::Debug for RequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestControl")
            .field("sequence", &self.sequence)
            .field("priority", &self.priority)
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// RequestHandle
// ============================================================================

/// Caller-side view of an enqueued request
#[derive(Debug, Clone)]
pub struct RequestHandle {
    control: Arc<RequestControl>,
}

impl RequestHandle {
    pub(crate) fn new(control: Arc<RequestControl>) -> Self {
        Self { control }
    }

    /// Cancel the request; the callback will not fire unless it already has
    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn is_canceled(&self) -> bool {
        self.control.is_canceled()
    }

    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    pub fn is_cache_hit(&self) -> bool {
        self.control.is_cache_hit()
    }

    pub fn sequence(&self) -> u64 {
        self.control.sequence()
    }

    pub fn state(&self) -> RequestState {
        self.control.state()
    }

    pub fn events(&self) -> Vec<RequestEvent> {
        self.control.events()
    }

    pub(crate) fn control(&self) -> &Arc<RequestControl> {
        &self.control
    }
}
