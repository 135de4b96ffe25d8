use crate::core::error::CacheError;
use crate::store::DurableStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Sink receiving every recoverable durable-layer failure
pub type ErrorSink = Arc<dyn Fn(CacheError) + Send + Sync>;

/// Error sink that discards failures (they are still logged)
pub fn noop_error_sink() -> ErrorSink {
    Arc::new(|_| {})
}

/// A durable operation queued behind a mirror mutation
enum SyncCommand {
    Put { key: String, payload: Vec<u8> },
    Delete { key: String },
    Clear,
    Flush { ack: oneshot::Sender<()> },
}

/// Fire-and-forget propagation of mirror mutations to the durable store.
///
/// Mutations enqueue commands on an unbounded channel; a single background
/// task drains them in order against the store. Failures never reach the
/// mutating caller: they are logged and handed to the error sink.
#[derive(Clone)]
pub(crate) struct Synchronizer {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl Synchronizer {
    /// Spawn the background writer task and return a handle to its queue
    pub fn start(store: Arc<dyn DurableStore>, on_error: ErrorSink) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::writer_loop(store, rx, on_error));

        Self { tx }
    }

    /// Background writer loop, holding the store handle for the process lifetime
    async fn writer_loop(
        store: Arc<dyn DurableStore>,
        mut rx: mpsc::UnboundedReceiver<SyncCommand>,
        on_error: ErrorSink,
    ) {
        while let Some(command) = rx.recv().await {
            match command {
                SyncCommand::Put { key, payload } => {
                    if let Err(e) = store.put(&key, payload).await {
                        warn!("Durable put failed for {}: {}", key, e);
                        on_error(e.into());
                    }
                }
                SyncCommand::Delete { key } => {
                    if let Err(e) = store.delete(&key).await {
                        warn!("Durable delete failed for {}: {}", key, e);
                        on_error(e.into());
                    }
                }
                SyncCommand::Clear => {
                    if let Err(e) = store.clear().await {
                        warn!("Durable clear failed: {}", e);
                        on_error(e.into());
                    }
                }
                SyncCommand::Flush { ack } => {
                    let _ = ack.send(());
                }
            }
        }

        debug!("Synchronizer writer loop terminated");
    }

    pub fn put(&self, key: String, payload: Vec<u8>) {
        self.send(SyncCommand::Put { key, payload });
    }

    pub fn delete(&self, key: String) {
        self.send(SyncCommand::Delete { key });
    }

    pub fn clear(&self) {
        self.send(SyncCommand::Clear);
    }

    /// Wait until every previously enqueued operation has settled
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(SyncCommand::Flush { ack }).is_ok() {
            let _ = done.await;
        }
    }

    fn send(&self, command: SyncCommand) {
        if self.tx.send(command).is_err() {
            warn!("Synchronizer queue closed, durable operation dropped");
        }
    }
}
