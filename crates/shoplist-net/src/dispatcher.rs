//! Priority request queue and worker pool
//!
//! The [`RequestQueue`] admits requests, answers cacheable GETs from the
//! [`Cache`] when it can, and otherwise hands them to a fixed pool of workers
//! in (priority desc, sequence asc) order. Every outcome, cached or from the
//! network, reaches the caller through [`Delivery`].
//!
//! ## Ownership
//!
//! The queue keeps the live set of requests keyed by sequence number. Each
//! request holds only a weak back-reference to the queue, used once when it
//! finishes; bookkeeping and byte counters are updated in
//! [`RequestOwner::release`].

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use shoplist_core::ports::{INetworkTransport, TransportError, TransportRequest, TransportResponse};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::Cache;
use crate::delivery::Delivery;
use crate::kinds::RequestKind;
use crate::query::request_to_url_and_query;
use crate::request::{
    Request, RequestControl, RequestHandle, RequestOwner, RequestSpec, ScheduleKey, DEFAULT_TIMEOUT,
};
use crate::response::{Fault, Response};

/// Default number of network workers
pub const DEFAULT_WORKERS: usize = 4;

// ============================================================================
// Options and statistics
// ============================================================================

/// Construction options for a [`RequestQueue`]
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Size of the worker pool
    pub workers: usize,
    /// Prefix for request URLs that are not absolute
    pub base_url: Option<String>,
    /// Timeout of requests that do not set their own
    pub timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Aggregate counters of a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Requests admitted but not finished
    pub live: usize,
    /// Requests waiting for a worker
    pub queued: usize,
}

// ============================================================================
// Type-erased queued work
// ============================================================================

/// A request of any kind, waiting in the heap
trait Dispatch: Send {
    fn spec(&self) -> &RequestSpec;

    fn control(&self) -> &Arc<RequestControl>;

    /// Parse the transport outcome, store cache fragments and post delivery
    fn complete(
        self: Box<Self>,
        outcome: Result<TransportResponse, TransportError>,
        cache: &Cache,
        delivery: &Delivery,
    );
}

struct Pending<K: RequestKind> {
    request: Request<K>,
    control: Arc<RequestControl>,
}

impl<K: RequestKind> Dispatch for Pending<K> {
    fn spec(&self) -> &RequestSpec {
        &self.request.spec
    }

    fn control(&self) -> &Arc<RequestControl> {
        &self.control
    }

    fn complete(
        self: Box<Self>,
        outcome: Result<TransportResponse, TransportError>,
        cache: &Cache,
        delivery: &Delivery,
    ) {
        let Pending { request, control } = *self;
        let Request {
            spec,
            kind,
            listener,
        } = request;

        let (mut response, reason) = match outcome {
            Ok(raw) => {
                control.add_bytes_in(raw.body.len() as u64);
                control.record(format!("network-ok:{}", raw.status));
                match not_modified(&kind, &spec, &raw, cache) {
                    Some(cached) => (cached, "not-modified-cache"),
                    None => (kind.parse_network(&spec, &raw), "network-complete"),
                }
            }
            Err(err) => {
                tracing::debug!(sequence = control.sequence(), error = %err, "Transport failed");
                (Response::error(Fault::Network(err)), "network-error")
            }
        };

        let fragments = response.take_cache();
        if !fragments.is_empty() {
            let ttl = spec.cache_ttl.unwrap_or_else(|| cache.default_ttl());
            tracing::trace!(sequence = control.sequence(), count = fragments.len(), "Caching fragments");
            cache.put_all(fragments.into_iter().map(|item| item.with_ttl(ttl)));
        }

        delivery.post(control, listener, response, reason);
    }
}

/// Answer a 304 from the cached copy of the resource.
///
/// Without a live cached copy the response is parsed as usual, which fails
/// for body-less kinds.
fn not_modified<K: RequestKind>(
    kind: &K,
    spec: &RequestSpec,
    raw: &TransportResponse,
    cache: &Cache,
) -> Option<Response<K::Output>> {
    if raw.status != 304 {
        return None;
    }
    let cached = kind.parse_cache(spec, cache);
    if cached.is_none() {
        tracing::debug!(url = %spec.url, "Not modified, but nothing cached");
    }
    cached
}

struct Queued {
    key: ScheduleKey,
    job: Box<dyn Dispatch>,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

// ============================================================================
// RequestQueue
// ============================================================================

/// Prioritized, cache-aware request dispatcher
pub struct RequestQueue {
    transport: Arc<dyn INetworkTransport>,
    cache: Arc<Cache>,
    delivery: Delivery,
    options: QueueOptions,
    /// Requests waiting for a worker
    heap: Mutex<BinaryHeap<Queued>>,
    /// Wakes an idle worker when the heap grows
    notify: Notify,
    next_sequence: AtomicU64,
    /// Every admitted request that has not finished, keyed by sequence
    live: DashMap<u64, Arc<RequestControl>>,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RequestQueue {
    /// Creates a new queue. Workers are not running until [`start`](Self::start).
    pub fn new(
        transport: Arc<dyn INetworkTransport>,
        cache: Arc<Cache>,
        delivery: Delivery,
        options: QueueOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            cache,
            delivery,
            options,
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            next_sequence: AtomicU64::new(0),
            live: DashMap::new(),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    /// Spawn the worker pool on the current tokio runtime
    pub fn start(self: &Arc<Self>) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.is_empty() {
            tracing::warn!("Request queue already started");
            return;
        }

        let count = self.options.workers.max(1);
        for id in 0..count {
            let queue = Arc::clone(self);
            workers.push(tokio::spawn(async move { queue.worker_loop(id).await }));
        }
        tracing::info!(workers = count, "Request queue started");
    }

    /// Stop the workers. Queued requests are canceled and finished; an
    /// in-flight exchange is abandoned.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let drained: Vec<Queued> = {
            let mut heap = self.heap.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *heap).into_vec()
        };
        for queued in drained {
            let control = queued.job.control();
            control.cancel();
            control.finish("shutdown");
        }

        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker task ended abnormally");
            }
        }
        tracing::info!("Request queue stopped");
    }

    /// Admit a request and return its handle.
    ///
    /// Cacheable GETs that the cache can fully answer are delivered without
    /// touching the network.
    pub fn add<K: RequestKind>(self: &Arc<Self>, request: Request<K>) -> RequestHandle {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let control = Arc::new(RequestControl::new(sequence, &request.spec));
        let owner: Weak<dyn RequestOwner> = Arc::downgrade(self) as Weak<RequestQueue>;
        control.set_owner(owner);
        control.record("enqueued");
        self.live.insert(sequence, Arc::clone(&control));

        let handle = RequestHandle::new(Arc::clone(&control));

        if self.shutdown.is_cancelled() {
            control.cancel();
            control.finish("rejected-after-shutdown");
            return handle;
        }

        if request.spec.is_cacheable() {
            if let Some(response) = request.kind.parse_cache(&request.spec, &self.cache) {
                tracing::debug!(sequence, url = %request.spec.url, "Served from cache");
                control.mark_cache_hit();
                self.delivery
                    .post(control, request.listener, response, "cache-complete");
                return handle;
            }
        }

        tracing::debug!(
            sequence,
            method = %request.spec.method,
            url = %request.spec.url,
            priority = %request.spec.priority,
            "Request queued"
        );
        let queued = Queued {
            key: control.schedule_key(),
            job: Box::new(Pending { request, control }),
        };
        if let Err(rejected) = self.enqueue(queued) {
            let control = rejected.job.control();
            control.cancel();
            control.finish("rejected-after-shutdown");
        }
        handle
    }

    /// Push onto the heap unless shutdown has begun. The check happens under
    /// the heap lock, which `shutdown` holds while draining.
    fn enqueue(&self, queued: Queued) -> Result<(), Queued> {
        {
            let mut heap = self.heap.lock().unwrap_or_else(PoisonError::into_inner);
            if self.shutdown.is_cancelled() {
                return Err(queued);
            }
            heap.push(queued);
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Admit a request whose response is handed back through a channel
    /// instead of a callback. The delivery context must still be driven.
    pub fn add_awaitable<K: RequestKind>(
        self: &Arc<Self>,
        request: Request<K>,
    ) -> (RequestHandle, oneshot::Receiver<Response<K::Output>>) {
        let (tx, rx) = oneshot::channel();
        let request = request.on_complete(move |response| {
            // receiver may have been dropped by a caller that stopped waiting
            let _ = tx.send(response);
        });
        (self.add(request), rx)
    }

    /// Cancel every live request carrying `tag`; returns how many were canceled
    pub fn cancel_all(&self, tag: &str) -> usize {
        let canceled = self
            .live
            .iter()
            .filter(|entry| entry.value().tag() == Some(tag))
            .filter(|entry| entry.value().cancel())
            .count();
        tracing::debug!(tag, canceled, "Canceled tagged requests");
        canceled
    }

    /// Finish a request explicitly. Repeated calls are logged no-ops.
    pub fn finish(&self, handle: &RequestHandle, reason: &str) -> bool {
        handle.control().finish(reason)
    }

    /// Number of admitted, unfinished requests
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            live: self.live.len(),
            queued: self.heap.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }

    // ------------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------------

    fn pop(&self) -> Option<Box<dyn Dispatch>> {
        let mut heap = self.heap.lock().unwrap_or_else(PoisonError::into_inner);
        let next = heap.pop()?;
        if !heap.is_empty() {
            // more work left: let another idle worker pick it up
            self.notify.notify_one();
        }
        Some(next.job)
    }

    async fn worker_loop(&self, id: usize) {
        tracing::trace!(worker = id, "Worker started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.pop() {
                Some(job) => self.dispatch(job).await,
                None => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.notify.notified() => {}
                    }
                }
            }
        }
        tracing::trace!(worker = id, "Worker stopped");
    }

    async fn dispatch(&self, job: Box<dyn Dispatch>) {
        let control = Arc::clone(job.control());
        if control.is_canceled() {
            control.finish("canceled-at-dispatch");
            return;
        }
        control.mark_dispatched();

        let request = self.transport_request(job.spec());
        if let Some(body) = &request.body {
            control.add_bytes_out(body.len() as u64);
        }
        tracing::debug!(
            sequence = control.sequence(),
            method = %request.method,
            url = %request.url,
            "Dispatching request"
        );

        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => {
                control.cancel();
                control.finish("shutdown");
                return;
            }
            outcome = self.transport.execute(request) => outcome,
        };

        job.complete(outcome, &self.cache, &self.delivery);
    }

    fn transport_request(&self, spec: &RequestSpec) -> TransportRequest {
        let url = resolve_url(self.options.base_url.as_deref(), &spec.url);
        TransportRequest {
            method: spec.method,
            url: request_to_url_and_query(&url, &spec.params),
            headers: spec.headers.clone(),
            body: spec.body.clone(),
            timeout: spec.timeout.unwrap_or(self.options.timeout),
        }
    }
}

impl RequestOwner for RequestQueue {
    fn release(&self, control: &RequestControl) {
        if self.live.remove(&control.sequence()).is_none() {
            tracing::warn!(sequence = control.sequence(), "Released request was not live");
        }
        self.bytes_in.fetch_add(control.bytes_in(), Ordering::Relaxed);
        self.bytes_out.fetch_add(control.bytes_out(), Ordering::Relaxed);
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("options", &self.options)
            .field("live", &self.live.len())
            .finish()
    }
}

/// Join a relative path onto the base URL; absolute URLs pass through
fn resolve_url(base: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(Some("https://api.example.com/"), "/v2/offers"),
            "https://api.example.com/v2/offers"
        );
        assert_eq!(
            resolve_url(Some("https://api.example.com"), "v2/offers"),
            "https://api.example.com/v2/offers"
        );
        assert_eq!(
            resolve_url(Some("https://api.example.com"), "http://other.test/x"),
            "http://other.test/x"
        );
        assert_eq!(resolve_url(None, "/v2/offers"), "/v2/offers");
    }

    #[test]
    fn test_queue_options_default() {
        let options = QueueOptions::default();
        assert_eq!(options.workers, DEFAULT_WORKERS);
        assert!(options.base_url.is_none());
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);
    }

    // ------------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------------

    struct NoTransport;

    #[async_trait::async_trait]
    impl INetworkTransport for NoTransport {
        async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Connect(request.url))
        }
    }

    fn queue(options: QueueOptions) -> (Arc<RequestQueue>, crate::delivery::DeliveryContext) {
        let (delivery, context) = Delivery::channel();
        let queue = RequestQueue::new(Arc::new(NoTransport), Arc::new(Cache::default()), delivery, options);
        (queue, context)
    }

    fn queued(sequence: u64) -> (Queued, Arc<RequestControl>) {
        let request = Request::get(crate::kinds::StringRequest, "/x");
        let control = Arc::new(RequestControl::new(sequence, &request.spec));
        let queued = Queued {
            key: control.schedule_key(),
            job: Box::new(Pending {
                request,
                control: Arc::clone(&control),
            }),
        };
        (queued, control)
    }

    #[test]
    fn test_enqueue_refused_once_shutdown_began() {
        let (queue, _context) = queue(QueueOptions::default());
        let (first, _) = queued(0);
        assert!(queue.enqueue(first).is_ok());

        // shutdown flips the token before it drains the heap
        queue.shutdown.cancel();
        let (late, control) = queued(1);
        let rejected = queue.enqueue(late).err().expect("late push must be refused");
        assert_eq!(rejected.key, control.schedule_key());
        assert_eq!(queue.stats().queued, 1);
    }

    #[tokio::test]
    async fn test_add_after_shutdown_finishes_request() {
        let (queue, _context) = queue(QueueOptions::default());
        queue.shutdown().await;
        let handle = queue.add(Request::get(crate::kinds::StringRequest, "/x"));
        assert!(handle.is_finished());
        assert!(handle.is_canceled());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_transport_request_timeout_falls_back_to_queue() {
        let (queue, _context) = queue(QueueOptions {
            timeout: Duration::from_secs(3),
            ..QueueOptions::default()
        });
        let spec = RequestSpec::new(shoplist_core::ports::HttpMethod::Get, "/x");
        assert_eq!(queue.transport_request(&spec).timeout, Duration::from_secs(3));

        let mut explicit = spec.clone();
        explicit.timeout = Some(Duration::from_millis(250));
        assert_eq!(queue.transport_request(&explicit).timeout, Duration::from_millis(250));
    }
}
