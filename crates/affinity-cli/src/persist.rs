//! Best-effort background persistence for the MCP server.
//!
//! Tool handlers update the in-memory profile and return immediately; the
//! snapshot is queued here and written by a blocking worker that owns the
//! store. Snapshots queued faster than the store can write are coalesced
//! so only the latest per user is saved.

use std::collections::HashMap;

use affinity_core::UserProfile;
use affinity_store::ProfileStore;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Msg {
    Save { user_id: String, profile: UserProfile },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<Msg>,
}

pub struct PersistWorker {
    handle: JoinHandle<usize>,
}

/// Spawn the writer on the blocking pool. Must be called inside a runtime.
pub fn spawn(store: Box<dyn ProfileStore + Send>) -> (PersistHandle, PersistWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || run(store, rx));
    (PersistHandle { tx }, PersistWorker { handle })
}

impl PersistHandle {
    /// Queue a snapshot. Returns false if the worker is gone.
    pub fn queue(&self, user_id: &str, profile: UserProfile) -> bool {
        let queued = self
            .tx
            .send(Msg::Save {
                user_id: user_id.to_string(),
                profile,
            })
            .is_ok();
        if !queued {
            tracing::warn!(user_id, "persist worker stopped, profile kept in memory only");
        }
        queued
    }

    /// Wait until everything queued before this call has been written
    /// (or failed). Snapshots that failed earlier are retried.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Msg::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
    }
}

impl PersistWorker {
    /// Drain the queue and stop the worker. Returns the number of
    /// successful writes over the worker's lifetime.
    pub async fn shutdown(self, handle: &PersistHandle) -> usize {
        handle.shutdown();
        match self.handle.await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!("persist worker panicked: {e}");
                0
            }
        }
    }
}

fn run(store: Box<dyn ProfileStore + Send>, mut rx: mpsc::UnboundedReceiver<Msg>) -> usize {
    let mut saved = 0usize;
    let mut pending: HashMap<String, UserProfile> = HashMap::new();

    while let Some(msg) = rx.blocking_recv() {
        let mut acks = Vec::new();
        let mut stop = false;

        let mut next = Some(msg);
        while let Some(msg) = next.take() {
            match msg {
                Msg::Save { user_id, profile } => {
                    pending.insert(user_id, profile);
                }
                Msg::Flush(ack) => acks.push(ack),
                Msg::Shutdown => stop = true,
            }
            next = rx.try_recv().ok();
        }

        // Failed snapshots stay pending and are retried on the next drain,
        // unless a newer snapshot for the same user replaces them first.
        pending.retain(|user_id, profile| match store.save(user_id, profile) {
            Ok(()) => {
                saved += 1;
                false
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    "profile not persisted, will retry: {e}"
                );
                true
            }
        });
        for ack in acks {
            let _ = ack.send(());
        }
        if stop {
            break;
        }
    }

    if !pending.is_empty() {
        tracing::warn!(
            users = pending.len(),
            "persist worker stopped with unsaved profiles"
        );
    }
    tracing::debug!(saved, "persist worker stopped");
    saved
}
