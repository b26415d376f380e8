//! Request workers
//!
//! Every submission runs on its own short-lived thread. The worker makes
//! the blocking backend call, sends the outcome back over a channel, and
//! pokes the notifier so the owner's event loop wakes up and drains it.

use crate::{Result, VoicelabError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error};
use std::sync::Arc;
use std::thread;

/// Callback fired after a worker has queued its result
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// A finished call tagged with who asked for it
#[derive(Debug, Clone)]
pub struct Completion<T> {
    /// Which slot the call belongs to
    pub key: &'static str,
    /// Sequence number issued with the call
    pub seq: u64,
    pub outcome: T,
}

/// Spawns workers and collects their completions
pub struct Dispatcher<T> {
    tx: Sender<Completion<T>>,
    rx: Receiver<Completion<T>>,
    notifier: Option<Notifier>,
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Create a dispatcher with no notifier
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            notifier: None,
        }
    }

    /// Wake something up whenever a completion is queued
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    /// Run `call` on a new thread and queue its outcome
    pub fn spawn<F>(&self, key: &'static str, seq: u64, call: F) -> Result<()>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.tx.clone();
        let notifier = self.notifier.clone();

        thread::Builder::new()
            .name(format!("req-{}-{}", key, seq))
            .spawn(move || {
                let outcome = call();
                debug!("Worker {}#{} finished", key, seq);
                if tx.send(Completion { key, seq, outcome }).is_err() {
                    // Receiver gone: the owner was dropped mid-flight
                    error!("Completion for {}#{} had nowhere to go", key, seq);
                    return;
                }
                if let Some(notify) = notifier {
                    notify();
                }
            })
            .map(|_| ())
            .map_err(|e| VoicelabError::Other(format!("Failed to spawn worker: {}", e)))
    }

    /// Take every completion queued so far without blocking
    pub fn drain(&self) -> Vec<Completion<T>> {
        self.rx.try_iter().collect()
    }

    /// Block until one completion arrives or the timeout passes
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Completion<T>> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl<T: Send + 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}
