//! Background job: evict revocation records whose tokens have expired.
//!
//! An expired token is rejected on its `exp` claim alone, so its revocation
//! record no longer protects anything.

use crate::{RevocationStore, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

/// Spawn the periodic prune task. Call this once at startup.
///
/// The first sweep runs immediately.
pub fn spawn_prune_job(store: Arc<dyn RevocationStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = prune_once(store.as_ref()).await {
                tracing::error!("revocation prune failed: {}", e);
            }
        }
    })
}

/// One sweep over the revocation list
pub async fn prune_once(store: &dyn RevocationStore) -> Result<usize> {
    let removed = store.prune_expired(Utc::now().timestamp()).await?;

    if removed > 0 {
        tracing::info!(removed, "pruned expired revocation records");
    }

    Ok(removed)
}
