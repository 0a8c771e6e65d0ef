use std::sync::Arc;

use dashmap::DashMap;
use tracing::{error, info, warn};

use hermes_core::Platform;

use crate::adapter::PlatformAdapter;
use crate::backoff::with_backoff;
use crate::error::ChannelError;

/// Registry of platform adapters, keyed by [`Platform`].
///
/// The supervisor owns the manager; the delivery router shares the inner
/// map. Connecting applies exponential backoff per adapter; one platform
/// failing to come up never blocks the others from being registered.
pub struct AdapterManager {
    adapters: Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>>,
}

impl AdapterManager {
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(DashMap::new()),
        }
    }

    /// Register an adapter. An existing adapter for the same platform is
    /// replaced.
    pub fn register(&self, adapter: Arc<dyn PlatformAdapter>) {
        let platform = adapter.platform();
        info!(platform = %platform, "registering platform adapter");
        self.adapters.insert(platform, adapter);
    }

    /// Shared view of the registry, for the delivery router.
    pub fn adapters(&self) -> Arc<DashMap<Platform, Arc<dyn PlatformAdapter>>> {
        Arc::clone(&self.adapters)
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).map(|a| Arc::clone(&a))
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> =
            self.adapters.iter().map(|entry| *entry.key()).collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }

    /// Connect every registered adapter, applying backoff per adapter.
    ///
    /// Failures are logged and skipped; the rest of the gateway keeps
    /// running with whichever platforms came up.
    pub async fn connect_all(&self) {
        for entry in self.adapters.iter() {
            let platform = *entry.key();
            let adapter = Arc::clone(entry.value());
            info!(platform = %platform, "connecting adapter");
            let result: Result<(), ChannelError> =
                with_backoff(platform.as_str(), || adapter.connect()).await;
            if let Err(e) = result {
                error!(platform = %platform, error = %e, "adapter failed to connect after retries");
            }
        }
    }

    /// Disconnect all adapters; errors are logged, not propagated.
    pub async fn disconnect_all(&self) {
        for entry in self.adapters.iter() {
            let platform = *entry.key();
            if let Err(e) = entry.value().disconnect().await {
                warn!(platform = %platform, error = %e, "error while disconnecting adapter");
            }
        }
    }
}

impl Default for AdapterManager {
    fn default() -> Self {
        Self::new()
    }
}
