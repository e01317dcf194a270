//! Single-consumer refresh queue.
//!
//! Timer fires, edits and manual requests all become [`RefreshRequest`]s on
//! one channel. A dedicated thread drains it and runs one pass per request.

use super::{RefreshCoordinator, RefreshError, RefreshNotifier, RefreshReason};
use crate::render::render_set::RenderReport;
use log::{info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

pub enum RefreshRequest {
    Refresh {
        reason: RefreshReason,
        reply: Option<oneshot::Sender<RenderReport>>,
    },
    Shutdown,
}

/// Cloneable sender side of the refresh queue.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::UnboundedSender<RefreshRequest>,
}

impl RefreshHandle {
    /// Queues a pass without waiting.
    pub fn request(&self, reason: RefreshReason) -> Result<(), RefreshError> {
        self.tx
            .send(RefreshRequest::Refresh {
                reason,
                reply: None,
            })
            .map_err(|_| RefreshError::WorkerStopped)
    }

    /// Queues a pass and blocks until it has rendered.
    ///
    /// Must not be called from inside an async runtime; use
    /// [`RefreshHandle::trigger_now_async`] there.
    pub fn trigger_now(&self, reason: RefreshReason) -> Result<RenderReport, RefreshError> {
        let rx = self.enqueue_with_reply(reason)?;
        rx.blocking_recv().map_err(|_| RefreshError::ReplyDropped)
    }

    /// Async variant of [`RefreshHandle::trigger_now`].
    pub async fn trigger_now_async(
        &self,
        reason: RefreshReason,
    ) -> Result<RenderReport, RefreshError> {
        let rx = self.enqueue_with_reply(reason)?;
        rx.await.map_err(|_| RefreshError::ReplyDropped)
    }

    /// Asks the worker to stop after the requests already queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(RefreshRequest::Shutdown);
    }

    fn enqueue_with_reply(
        &self,
        reason: RefreshReason,
    ) -> Result<oneshot::Receiver<RenderReport>, RefreshError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RefreshRequest::Refresh {
                reason,
                reply: Some(reply),
            })
            .map_err(|_| RefreshError::WorkerStopped)?;
        Ok(rx)
    }
}

impl RefreshNotifier for RefreshHandle {
    fn request_refresh(&self, reason: RefreshReason) {
        if let Err(err) = self.request(reason) {
            warn!(
                "event=refresh_request module=refresh status=error reason={} error={}",
                reason.as_str(),
                err
            );
        }
    }

    fn refresh_blocking(&self, reason: RefreshReason) -> Result<RenderReport, RefreshError> {
        self.trigger_now(reason)
    }
}

/// Running refresh worker thread. Dropping it stops and joins the thread.
pub struct RefreshWorker {
    handle: RefreshHandle,
    join: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    pub fn handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    /// Stops the worker after queued requests and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.handle.shutdown();
        if join.join().is_err() {
            warn!("event=refresh_worker_stop module=refresh status=error error=worker_panicked");
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Starts the refresh worker thread for `coordinator`.
pub fn spawn_refresh_worker(
    coordinator: Arc<RefreshCoordinator>,
) -> Result<RefreshWorker, RefreshError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<RefreshRequest>();

    let join = std::thread::Builder::new()
        .name("parkwidget-refresh".to_string())
        .spawn(move || {
            info!("event=refresh_worker_start module=refresh status=ok");
            while let Some(request) = rx.blocking_recv() {
                match request {
                    RefreshRequest::Refresh { reason, reply } => {
                        let report = coordinator.trigger_now(reason);
                        if let Some(reply) = reply {
                            // Caller may have given up waiting; the pass still counts.
                            let _ = reply.send(report);
                        }
                    }
                    RefreshRequest::Shutdown => break,
                }
            }
            info!("event=refresh_worker_stop module=refresh status=ok");
        })
        .map_err(RefreshError::Spawn)?;

    Ok(RefreshWorker {
        handle: RefreshHandle { tx },
        join: Some(join),
    })
}
