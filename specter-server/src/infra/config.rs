use std::{env, path::PathBuf, time::Duration};

/// Server configuration loaded from environment variables.
///
/// Result files live in a scratch area outside any watched source tree so
/// that file-watcher tooling does not react to files being created and
/// deleted while searches run.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Sherlock settings
    pub sherlock_path: Option<PathBuf>,

    // Logging default when RUST_LOG is unset
    pub log_level: String,

    // CORS settings
    pub allowed_origin: String,

    // Search lifecycle settings
    pub max_concurrent_searches: usize,
    pub search_timeout: Duration,
    /// Number of sites the deployed sherlock build checks; reported alongside
    /// progress so clients can render completion. Coupled to the tool version,
    /// so configurable rather than hardcoded.
    pub total_sites: u64,
    pub rate_limit_per_minute: u32,

    // Result store settings
    pub scratch_dir: PathBuf,
    pub results_dir: PathBuf,
    pub cleanup_age: Duration,
    pub cleanup_interval: Duration,

    // Optional static frontend bundle
    pub frontend_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let scratch_dir = env::temp_dir().join("specter");
        let results_dir = env::var("RESULTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| scratch_dir.join("results"));
        let scratch_dir = results_dir
            .parent()
            .map(PathBuf::from)
            .unwrap_or(scratch_dir);

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),

            sherlock_path: env::var("SHERLOCK_PATH").ok().map(PathBuf::from),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            allowed_origin: env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            max_concurrent_searches: env::var("MAX_CONCURRENT_SEARCHES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            search_timeout: Duration::from_secs(
                env::var("SEARCH_TIMEOUT")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            ),
            total_sites: env::var("TOTAL_SITES")
                .unwrap_or_else(|_| "405".to_string())
                .parse()
                .unwrap_or(405),
            rate_limit_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            scratch_dir,
            results_dir,
            cleanup_age: Duration::from_secs(
                env::var("CLEANUP_AGE")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
            ),
            cleanup_interval: Duration::from_secs(
                env::var("CLEANUP_INTERVAL")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            ),

            frontend_dir: env::var("FRONTEND_DIR").ok().map(PathBuf::from),
        })
    }

    /// Create the scratch and result directories if they don't exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        std::fs::create_dir_all(&self.results_dir)?;
        Ok(())
    }
}
