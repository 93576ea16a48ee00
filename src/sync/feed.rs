//! A spawned task that drains one [`Subscription`] into a handler.
//!
//! Each feed also answers flush requests. The subscription is polled first,
//! so by the time a flush is acknowledged every snapshot the store had
//! already delivered has gone through the handler.

use std::future::Future;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::remote::{Subscription, Unsubscribe};

/// A live subscription plus the task applying its snapshots. Dropping the
/// feed unsubscribes and aborts the task.
pub struct Feed {
    label: String,
    handle: Unsubscribe,
    flush: FlushHandle,
    task: JoinHandle<()>,
}

/// Clonable requester for a feed's flush acknowledgement.
#[derive(Clone)]
pub struct FlushHandle {
    tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl FlushHandle {
    /// Resolve once the feed has applied everything already delivered to it.
    /// Returns immediately if the feed has stopped.
    pub async fn wait(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ack_tx).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Wait on several feeds at once.
pub async fn flush_all(handles: Vec<FlushHandle>) {
    join_all(handles.iter().map(FlushHandle::wait)).await;
}

impl Feed {
    /// Spawn a task feeding every snapshot of `subscription` to `handler`,
    /// one at a time, in delivery order.
    pub fn spawn<T, F, Fut>(label: impl Into<String>, mut subscription: Subscription<T>, mut handler: F) -> Self
    where
        T: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let label = label.into();
        let handle = subscription.handle();
        let (tx, mut flush_rx) = mpsc::unbounded_channel::<oneshot::Sender<()>>();

        let task_label = label.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    next = subscription.recv() => match next {
                        Some(snapshot) => handler(snapshot).await,
                        None => break,
                    },
                    Some(ack) = flush_rx.recv() => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("feed {task_label} stopped");
        });

        tracing::debug!("feed {label} started");
        Self {
            label,
            handle,
            flush: FlushHandle { tx },
            task,
        }
    }

    pub fn flush_handle(&self) -> FlushHandle {
        self.flush.clone()
    }

    /// Unsubscribe and stop the task. Idempotent.
    pub fn cancel(&self) {
        if !self.handle.is_cancelled() {
            tracing::debug!("feed {} cancelled", self.label);
        }
        self.handle.cancel();
        self.task.abort();
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.cancel();
    }
}
