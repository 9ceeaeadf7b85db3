//! Callback delivery
//!
//! Workers never run user callbacks themselves. They finish the request and
//! post the callback to a [`Delivery`] channel; the caller drives the other
//! end, a [`DeliveryContext`], on whatever task should observe results. A
//! request canceled after posting is dropped there without invoking its
//! callback.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::request::{Listener, RequestControl};
use crate::response::Response;

/// A finished request waiting for its callback to run
pub struct DeliveryJob {
    control: Arc<RequestControl>,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl DeliveryJob {
    pub fn sequence(&self) -> u64 {
        self.control.sequence()
    }

    /// Run the callback unless the request was canceled first.
    ///
    /// Returns whether the callback ran.
    pub fn deliver(self) -> bool {
        if !self.control.begin_delivery() {
            self.control.record("canceled-at-delivery");
            tracing::debug!(sequence = self.control.sequence(), "Dropped canceled delivery");
            return false;
        }
        (self.run)();
        self.control.record("delivered");
        true
    }
}

impl std::fmt::Debug for DeliveryJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryJob")
            .field("sequence", &self.control.sequence())
            .finish()
    }
}

/// Sending half, owned by the request queue
#[derive(Debug, Clone)]
pub struct Delivery {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl Delivery {
    /// Create a delivery channel and the context that runs its callbacks
    pub fn channel() -> (Delivery, DeliveryContext) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Delivery { tx }, DeliveryContext { rx })
    }

    /// Finish the request with `reason` and queue its callback
    pub(crate) fn post<T: Send + 'static>(
        &self,
        control: Arc<RequestControl>,
        listener: Option<Listener<T>>,
        response: Response<T>,
        reason: &str,
    ) {
        control.finish(reason);

        let Some(listener) = listener else {
            return;
        };
        let job = DeliveryJob {
            control,
            run: Box::new(move || listener(response)),
        };
        if let Err(err) = self.tx.send(job) {
            tracing::warn!(
                sequence = err.0.sequence(),
                "Delivery context is gone, dropping callback"
            );
        }
    }
}

/// Receiving half; callbacks run wherever this is driven
#[derive(Debug)]
pub struct DeliveryContext {
    rx: mpsc::UnboundedReceiver<DeliveryJob>,
}

impl DeliveryContext {
    /// Deliver callbacks until every [`Delivery`] sender is dropped
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job.deliver();
        }
        tracing::debug!("Delivery context closed");
    }

    /// Wait for the next posted job, delivering it. `None` once closed.
    pub async fn next(&mut self) -> Option<bool> {
        self.rx.recv().await.map(DeliveryJob::deliver)
    }

    /// Deliver everything already posted without waiting; returns how many
    /// callbacks ran
    pub fn run_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(job) = self.rx.try_recv() {
            if job.deliver() {
                delivered += 1;
            }
        }
        delivered
    }
}
