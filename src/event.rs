//! Rotation event notification, dispatched off the write path.
//!
//! Delivery is at-most-once and best-effort: events flow through a bounded
//! queue drained by a dedicated thread, and a full queue drops the event
//! rather than stalling the writer.

use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Emitted after a successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationEvent {
    /// File that was receiving writes before the switch; `None` when this is
    /// the first file the sink opened.
    pub previous: Option<PathBuf>,
    /// File now receiving writes.
    pub current: PathBuf,
}

/// Callback invoked for every delivered rotation event.
pub trait RotationHandler: Send + Sync {
    fn on_rotation(&self, event: &RotationEvent);
}

impl<F> RotationHandler for F
where
    F: Fn(&RotationEvent) + Send + Sync,
{
    fn on_rotation(&self, event: &RotationEvent) {
        self(event)
    }
}

const QUEUE_DEPTH: usize = 16;

pub(crate) struct EventDispatcher {
    tx: Option<SyncSender<RotationEvent>>,
    handle: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub(crate) fn spawn(handler: Arc<dyn RotationHandler>) -> Self {
        let (tx, rx) = sync_channel::<RotationEvent>(QUEUE_DEPTH);
        let handle = thread::spawn(move || {
            for event in rx {
                handler.on_rotation(&event);
            }
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Never blocks: a slow handler loses events instead of stalling writes.
    pub(crate) fn dispatch(&self, event: RotationEvent) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("rotation event queue full, dropping notification");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Drains queued events, then joins the worker.
    pub(crate) fn stop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
