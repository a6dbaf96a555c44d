use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "VaxTrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default table page size used by every screen.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Page sizes offered by the screens.
pub const PAGE_SIZE_OPTIONS: &[usize] = &[5, 10, 25, 50, 100];

/// Minimum time the loader stays visible once shown.
pub const LOADER_MIN_DISPLAY: Duration = Duration::from_millis(1000);

/// Default lifetime of a notification.
pub const NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);

const DEFAULT_ADDR: &str = "127.0.0.1:8470";
const DATABASE_FILE: &str = "vaxtrack.db";

/// Get the application data directory.
/// `VAXTRACK_DATA_DIR` wins; otherwise ~/VaxTrack/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VAXTRACK_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Path of the local record store.
pub fn database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "vaxtrack=info,vaxtrack_lib=info,tower_http=warn"
}

/// Runtime settings read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Artificial latency applied to export and regenerate operations.
    pub simulated_latency: Duration,
    /// Fixed generator seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Settings {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("VAXTRACK_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_addr);

        let simulated_latency = std::env::var("VAXTRACK_LATENCY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);

        let seed = std::env::var("VAXTRACK_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        Self {
            bind_addr,
            database_path: database_path(),
            simulated_latency,
            seed,
        }
    }
}

fn default_addr() -> SocketAddr {
    // Constant literal, always parses.
    DEFAULT_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8470)))
}
