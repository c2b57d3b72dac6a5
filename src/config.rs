//! Application settings.
//!
//! Every setting is a clap argument bound to an environment variable (read
//! after the binary loads `.env`), so flags override the environment and clap
//! reports malformed values.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::repository::DbContext;

/// Default upstream endpoint.
pub const DEFAULT_ANIDB_URL: &str = "http://api.anidb.net:9001/httpapi";

pub const DEFAULT_DAILY_LIMIT: u64 = 200;
pub const DEFAULT_THROTTLE_SECONDS: u64 = 4;
pub const DEFAULT_MIN_CALL_DELAY_MS: u64 = 2000;
pub const DEFAULT_UPDATE_THRESHOLD_DAYS: i64 = 14;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Identity and credentials used for upstream requests.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub client: String,
    pub client_version: String,
    pub protocol_version: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ANIDB_URL.to_string(),
            client: "kometa".to_string(),
            client_version: "1".to_string(),
            protocol_version: "1".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding one XML document per record.
    pub xml_dir: PathBuf,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Directory searched for a seed archive on first start.
    pub seed_data_dir: PathBuf,
    /// Upstream calls allowed per trailing 24 hours.
    pub daily_limit: u64,
    /// Sleep after every worker iteration.
    pub throttle: Duration,
    /// Minimum spacing between upstream calls.
    pub min_call_delay: Duration,
    /// Records older than this many days are refreshed.
    pub update_threshold_days: i64,
    /// Prefix all routes are nested under (empty for none).
    pub root_path: String,
    pub upstream: UpstreamConfig,
    /// Basic auth username for protected routes.
    pub api_user: String,
    /// Basic auth password for protected routes.
    pub api_pass: String,
    pub bind: SocketAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            xml_dir: PathBuf::from("/app/data"),
            db_path: PathBuf::from("/app/database/anidb.db"),
            seed_data_dir: PathBuf::from("/app/seed_data"),
            daily_limit: DEFAULT_DAILY_LIMIT,
            throttle: Duration::from_secs(DEFAULT_THROTTLE_SECONDS),
            min_call_delay: Duration::from_millis(DEFAULT_MIN_CALL_DELAY_MS),
            update_threshold_days: DEFAULT_UPDATE_THRESHOLD_DAYS,
            root_path: String::new(),
            upstream: UpstreamConfig::default(),
            api_user: "kometa_admin".to_string(),
            api_pass: "change_me_to_something_secure".to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

impl Settings {
    /// Settings rooted in a single data directory. Handy for tests and
    /// local runs.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            xml_dir: data_dir.join("xml"),
            db_path: data_dir.join("anidb.db"),
            seed_data_dir: data_dir.join("seed"),
            ..Default::default()
        }
    }

    /// Ensure the cache and database directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.xml_dir)?;
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Create a database context over the configured paths.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::new(&self.db_path, &self.xml_dir)
    }
}

/// Settings as command-line arguments, each bound to an environment variable.
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Directory holding cached XML documents
    #[arg(long, global = true, env = "XML_DIR", default_value = "/app/data")]
    pub xml_dir: PathBuf,

    /// SQLite database path
    #[arg(long, global = true, env = "DB_PATH", default_value = "/app/database/anidb.db")]
    pub db_path: PathBuf,

    /// Directory searched for a seed archive
    #[arg(long = "seed-dir", global = true, env = "SEED_DATA_DIR", default_value = "/app/seed_data")]
    pub seed_data_dir: PathBuf,

    /// Upstream calls allowed per trailing 24 hours
    #[arg(long, global = true, env = "DAILY_LIMIT", default_value_t = DEFAULT_DAILY_LIMIT)]
    pub daily_limit: u64,

    /// Seconds the worker sleeps after every refresh
    #[arg(long, global = true, env = "THROTTLE_SECONDS", default_value_t = DEFAULT_THROTTLE_SECONDS)]
    pub throttle_seconds: u64,

    /// Minimum milliseconds between upstream calls
    #[arg(long, global = true, env = "MIN_CALL_DELAY_MS", default_value_t = DEFAULT_MIN_CALL_DELAY_MS)]
    pub min_call_delay_ms: u64,

    /// Records older than this many days are refreshed
    #[arg(
        long,
        global = true,
        env = "UPDATE_THRESHOLD_DAYS",
        default_value_t = DEFAULT_UPDATE_THRESHOLD_DAYS,
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    pub update_threshold_days: i64,

    /// Prefix every route is nested under, e.g. /anidb
    #[arg(long, global = true, env = "ROOT_PATH", default_value = "")]
    pub root_path: String,

    /// Upstream HTTP API endpoint
    #[arg(long, global = true, env = "ANIDB_URL", default_value = DEFAULT_ANIDB_URL)]
    pub anidb_url: String,

    /// Registered upstream client name
    #[arg(long, global = true, env = "ANIDB_CLIENT", default_value = "kometa")]
    pub anidb_client: String,

    /// Registered upstream client version
    #[arg(long, global = true, env = "ANIDB_VERSION", default_value = "1")]
    pub anidb_version: String,

    /// Upstream protocol version
    #[arg(long, global = true, env = "ANIDB_PROTO_VER", default_value = "1")]
    pub anidb_proto_ver: String,

    /// Upstream account name, sent only together with a password
    #[arg(long, global = true, env = "ANIDB_USERNAME")]
    pub anidb_username: Option<String>,

    /// Upstream account password
    #[arg(long, global = true, env = "ANIDB_PASSWORD", hide_env_values = true)]
    pub anidb_password: Option<String>,

    /// Upstream request timeout in seconds
    #[arg(
        long,
        global = true,
        env = "REQUEST_TIMEOUT_SECONDS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECONDS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_seconds: u64,

    /// Basic auth username for protected routes
    #[arg(long, global = true, env = "API_USER", default_value = "kometa_admin")]
    pub api_user: String,

    /// Basic auth password for protected routes
    #[arg(
        long,
        global = true,
        env = "API_PASS",
        default_value = "change_me_to_something_secure",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub api_pass: String,
}

impl From<SettingsArgs> for Settings {
    fn from(args: SettingsArgs) -> Self {
        Self {
            xml_dir: args.xml_dir,
            db_path: args.db_path,
            seed_data_dir: args.seed_data_dir,
            daily_limit: args.daily_limit,
            throttle: Duration::from_secs(args.throttle_seconds),
            min_call_delay: Duration::from_millis(args.min_call_delay_ms),
            update_threshold_days: args.update_threshold_days,
            root_path: normalize_root_path(&args.root_path),
            upstream: UpstreamConfig {
                url: args.anidb_url,
                client: args.anidb_client,
                client_version: args.anidb_version,
                protocol_version: args.anidb_proto_ver,
                username: args.anidb_username,
                password: args.anidb_password,
                timeout: Duration::from_secs(args.request_timeout_seconds),
            },
            api_user: args.api_user,
            api_pass: args.api_pass,
            ..Default::default()
        }
    }
}

/// `"api/"` and `"/api"` both become `"/api"`; `"/"` becomes empty.
pub fn normalize_root_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
