//! Background supervision of the match store connection.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the match store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_match_store(store.clone()).await;
                info!("match store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;
                state.clear_match_store().await;

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "match store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be recovered in place.
async fn supervise(state: &SharedState, store: &dyn MatchStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("match store healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut recovered = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "match store reconnected after health check failure");
                    recovered = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(
                            attempt, error = %err,
                            "match store reconnect failed; entering degraded mode"
                        );
                        state.update_degraded(true).await;
                    } else {
                        warn!(attempt, error = %err, "match store reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !recovered {
            warn!("exhausted match store reconnect attempts; staying in degraded mode");
            return;
        }
        state.update_degraded(false).await;
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::match_store::InMemoryMatchStore, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn installs_the_store_once_connected() {
        let state = AppState::new(AppConfig::default());
        let store = InMemoryMatchStore::new();

        let supervised = state.clone();
        let handle = tokio::spawn(run(supervised, move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        assert!(state.require_match_store().await.is_ok());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_store_flips_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let store = InMemoryMatchStore::new();
        let outage = store.clone();

        let supervised = state.clone();
        let handle = tokio::spawn(run(supervised, move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        let mut watcher = state.degraded_watcher();
        watcher.wait_for(|degraded| !degraded).await.unwrap();

        outage.set_unavailable(true);
        watcher.wait_for(|degraded| *degraded).await.unwrap();
        assert!(state.require_match_store().await.is_err());

        outage.set_unavailable(false);
        watcher.wait_for(|degraded| !degraded).await.unwrap();
        handle.abort();
    }
}
