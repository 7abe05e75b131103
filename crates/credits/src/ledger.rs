use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adforge_api::Backend;
use adforge_core::error::AdForgeResult;
use adforge_core::signal::{Signal, SignalHub};
use adforge_core::types::CreditSummary;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle returned by [`CreditLedger::subscribe`]; pass back to
/// [`CreditLedger::unsubscribe`] to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&CreditSummary) + Send + Sync>;

/// Process-local cache of the user's remaining credit balance.
///
/// `get` never blocks and may be stale; `refresh` replaces the cache with
/// the authoritative backend value, leaving the stale value intact on
/// failure. Cache changes are delivered to listeners in subscription
/// order; listeners carry no cross-listener atomicity and should re-fetch
/// when correctness requires the authoritative value.
pub struct CreditLedger {
    backend: Arc<dyn Backend>,
    hub: SignalHub,
    cache: RwLock<CreditSummary>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

impl CreditLedger {
    pub fn new(backend: Arc<dyn Backend>, hub: SignalHub) -> Self {
        Self {
            backend,
            hub,
            cache: RwLock::new(CreditSummary::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Last-known balance. Never blocks; may be stale.
    pub fn get(&self) -> CreditSummary {
        *self.cache.read()
    }

    /// Fetch the authoritative balance and replace the cache. On error the
    /// stale cached value stays in place and the error surfaces to this
    /// caller only.
    pub async fn refresh(&self) -> AdForgeResult<CreditSummary> {
        match self.backend.fetch_subscription().await {
            Ok(info) => {
                let summary = info.credit_summary();
                self.apply(summary);
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "credit refresh failed, keeping stale cache");
                metrics::counter!("credits.refresh_errors").increment(1);
                Err(e)
            }
        }
    }

    /// Register a listener invoked on every cached-value change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&CreditSummary) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id.0);
    }

    /// Broadcast the process-wide "credits changed" signal so sibling
    /// ledger instances re-fetch. Called by any component after the
    /// backend confirms credit consumption, even if this instance already
    /// holds the new value.
    pub fn notify_changed(&self) {
        self.hub.emit(Signal::CreditsChanged);
    }

    /// Spawn a task that re-refreshes this ledger whenever the hub signals
    /// a credit change. Refresh failures are logged and the stale cache
    /// kept, same as a direct `refresh` call.
    pub fn watch_signals(self: Arc<Self>) -> JoinHandle<()> {
        let ledger = self;
        let mut rx = ledger.hub.subscribe();
        tokio::spawn(async move {
            while let Ok(signal) = rx.recv().await {
                if signal == Signal::CreditsChanged {
                    debug!("credits changed signal received, refreshing");
                    let _ = ledger.refresh().await;
                }
            }
        })
    }

    /// Replace the cached value and notify listeners if it changed.
    fn apply(&self, summary: CreditSummary) {
        {
            let mut cache = self.cache.write();
            if *cache == summary {
                return;
            }
            *cache = summary;
        }
        info!(
            credits = summary.credits,
            trial_credits = summary.trial_credits,
            "credit balance updated"
        );

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adforge_api::StubBackend;
    use adforge_core::error::AdForgeError;
    use parking_lot::Mutex as PlMutex;

    fn ledger_with(backend: Arc<StubBackend>) -> Arc<CreditLedger> {
        Arc::new(CreditLedger::new(backend, SignalHub::new()))
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(7);
        let ledger = ledger_with(backend);

        assert_eq!(ledger.get().credits, 0);
        let summary = ledger.refresh().await.unwrap();
        assert_eq!(summary.credits, 7);
        assert_eq!(ledger.get().credits, 7);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_cache() {
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(3);
        let ledger = ledger_with(Arc::clone(&backend));
        ledger.refresh().await.unwrap();

        backend.push_subscription_response(Err(AdForgeError::Fetch("backend down".into())));
        assert!(ledger.refresh().await.is_err());
        assert_eq!(ledger.get().credits, 3);
    }

    #[tokio::test]
    async fn test_listeners_invoked_in_subscription_order() {
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(2);
        let ledger = ledger_with(backend);

        let order = Arc::new(PlMutex::new(Vec::new()));
        let first = Arc::clone(&order);
        ledger.subscribe(move |_| first.lock().push("first"));
        let second = Arc::clone(&order);
        ledger.subscribe(move |summary| {
            second.lock().push("second");
            assert_eq!(summary.credits, 2);
        });

        ledger.refresh().await.unwrap();
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(1);
        let ledger = ledger_with(Arc::clone(&backend));

        let calls = Arc::new(PlMutex::new(0u32));
        let counter = Arc::clone(&calls);
        let id = ledger.subscribe(move |_| *counter.lock() += 1);

        ledger.refresh().await.unwrap();
        assert_eq!(*calls.lock(), 1);

        ledger.unsubscribe(id);
        backend.set_subscription(9);
        ledger.refresh().await.unwrap();
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_value_does_not_notify() {
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(4);
        let ledger = ledger_with(backend);

        let calls = Arc::new(PlMutex::new(0u32));
        let counter = Arc::clone(&calls);
        ledger.subscribe(move |_| *counter.lock() += 1);

        ledger.refresh().await.unwrap();
        ledger.refresh().await.unwrap();
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_notify_changed_drives_sibling_ledger() {
        let hub = SignalHub::new();
        let backend = Arc::new(StubBackend::new());
        backend.set_subscription(10);

        let producer = Arc::new(CreditLedger::new(
            Arc::clone(&backend) as Arc<dyn Backend>,
            hub.clone(),
        ));
        let sidebar = Arc::new(CreditLedger::new(
            Arc::clone(&backend) as Arc<dyn Backend>,
            hub.clone(),
        ));
        let handle = Arc::clone(&sidebar).watch_signals();

        producer.notify_changed();
        // Give the watcher task a chance to run its refresh.
        for _ in 0..50 {
            if sidebar.get().credits == 10 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(sidebar.get().credits, 10);
        handle.abort();
    }
}
