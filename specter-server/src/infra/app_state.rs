use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::Semaphore;

use crate::infra::config::Config;
use crate::infra::rate_limit::RateLimiter;
use crate::results::store::ResultStore;
use crate::search::registry::SearchRegistry;
use crate::search::sherlock::SherlockTool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Resolved once at startup. `None` means every search reports the tool
    /// as missing until the server restarts with a working install.
    pub sherlock: Option<SherlockTool>,
    pub registry: SearchRegistry,
    pub permits: Arc<Semaphore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub store: ResultStore,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Build runtime state, resolving the sherlock executable from the
    /// configured override or well-known locations.
    pub fn new(config: Config) -> Self {
        let sherlock = SherlockTool::resolve(config.sherlock_path.as_deref());
        Self::with_tool(config, sherlock)
    }

    /// Build state around an explicit tool handle. Used by `new` and by
    /// tests that point the server at a stand-in executable.
    pub fn with_tool(config: Config, sherlock: Option<SherlockTool>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_searches));
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            Duration::from_secs(60),
        ));
        let store = ResultStore::new(config.results_dir.clone());

        Self {
            config: Arc::new(config),
            sherlock,
            registry: SearchRegistry::default(),
            permits,
            rate_limiter,
            store,
        }
    }
}
