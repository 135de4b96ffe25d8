use crate::core::error::Result;
use crate::core::mirror::Mirror;
use crate::handler::StorageHandler;
use crate::store::DurableStore;
use tracing::{debug, info, warn};

/// Drain the durable store into the mirror.
///
/// Runs once at construction time, before the provider is handed out: no
/// partially hydrated mirror is ever observable. Records the handler marks
/// stale are pruned from the store on the way through; a pruning failure is
/// logged and skipped, the record simply survives until the next startup.
/// A store or handler failure aborts construction.
pub(crate) async fn hydrate(
    store: &dyn DurableStore,
    handler: &dyn StorageHandler,
    mirror: &Mirror,
) -> Result<()> {
    let mut cursor = store.scan().await?;
    let mut loaded = 0usize;
    let mut pruned = 0usize;

    while let Some((key, payload)) = cursor.advance().await? {
        match handler.revive(&key, &payload)? {
            Some(entry) => {
                debug!("Hydrating {}", key);
                mirror.set(&key, entry);
                loaded += 1;
            }
            None => {
                debug!("Pruning stale record for {}", key);
                if let Err(e) = store.delete(&key).await {
                    warn!("Failed to prune stale record for {}: {}", key, e);
                }
                pruned += 1;
            }
        }
    }

    info!(
        "Hydration complete: {} entries loaded, {} stale records pruned",
        loaded, pruned
    );

    Ok(())
}
