use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fieldreport.db")
}

// ============================================================================
// Storage
// ============================================================================

/// Object storage configuration.
///
/// The local root is always present: it is the active backend in local mode
/// and the legacy read/cleanup location in remote mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for the local backend (one subdirectory per prefix).
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Number of keys whose serving backend is remembered by the dual read.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Remote bucket; when present and reachable at startup the store runs in remote mode.
    #[serde(default)]
    pub remote: Option<RemoteStorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            cache_size: default_cache_size(),
            remote: None,
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_cache_size() -> usize {
    1024
}

/// S3-compatible bucket settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteStorageConfig {
    /// Endpoint URL (e.g. "http://minio:9000").
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Use path-style addressing (required by most self-hosted stores).
    #[serde(default = "default_true")]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Generation
// ============================================================================

/// Document generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Per-backend attempt timeout in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Shared staging area where backends drop artifacts by filename.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Backends in priority order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Extra classification aliases (synonym -> canonical code).
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_generation_timeout(),
            staging_dir: default_staging_dir(),
            backends: Vec::new(),
            aliases: BTreeMap::new(),
        }
    }
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("staging")
}

/// One generation backend entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Remote HTTP rendering service.
    Http { url: String },
    /// gRPC document generator microservice.
    Grpc { address: String },
    /// Local generator script.
    Subprocess {
        #[serde(default = "default_interpreters")]
        interpreters: Vec<String>,
        script: PathBuf,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Http { .. } => "http",
            BackendConfig::Grpc { .. } => "grpc",
            BackendConfig::Subprocess { .. } => "subprocess",
        }
    }
}

fn default_interpreters() -> Vec<String> {
    vec!["python3".to_string(), "python".to_string()]
}

// ============================================================================
// Queue
// ============================================================================

/// Ticket intake queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,
    /// Worker poll interval when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
    /// How long a received message stays invisible before redelivery.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    /// Deliveries after which a message is dropped.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            poll_interval_ms: default_poll_interval_ms(),
            publish_timeout_secs: default_publish_timeout(),
            lease_secs: default_lease_secs(),
            max_deliveries: default_max_deliveries(),
        }
    }
}

fn default_queue_name() -> String {
    "tickets".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_publish_timeout() -> u64 {
    10
}

fn default_lease_secs() -> u64 {
    60
}

fn default_max_deliveries() -> u32 {
    5
}

// ============================================================================
// Notifier
// ============================================================================

/// Backlog notifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Periodic check interval (0 disables the periodic task).
    #[serde(default = "default_notify_interval")]
    pub interval_secs: u64,
    /// Timeout for one Bot API call.
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
    /// How many recent tickets the digest lists.
    #[serde(default = "default_digest_size")]
    pub digest_size: usize,
    /// Link appended to the digest.
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            api_base: default_api_base(),
            interval_secs: default_notify_interval(),
            timeout_secs: default_notify_timeout(),
            digest_size: default_digest_size(),
            link_url: None,
            subscribers: Vec::new(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_notify_interval() -> u64 {
    300
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_digest_size() -> usize {
    3
}

/// A notification recipient (chat id).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubscriberConfig {
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// ============================================================================
// Sanitized view
// ============================================================================

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: SanitizedStorageConfig,
    pub generation: SanitizedGenerationConfig,
    pub queue: QueueConfig,
    pub notifier: SanitizedNotifierConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub local_root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<SanitizedRemoteConfig>,
}

/// Remote storage config (keys hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub credentials_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub timeout_secs: u64,
    pub backends: Vec<String>,
}

/// Notifier config (bot token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub enabled: bool,
    pub bot_token_configured: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub subscribers: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            storage: SanitizedStorageConfig {
                local_root: config.storage.local_root.clone(),
                remote: config.storage.remote.as_ref().map(|r| SanitizedRemoteConfig {
                    endpoint: r.endpoint.clone(),
                    bucket: r.bucket.clone(),
                    region: r.region.clone(),
                    credentials_configured: !r.access_key.is_empty() && !r.secret_key.is_empty(),
                }),
            },
            generation: SanitizedGenerationConfig {
                timeout_secs: config.generation.timeout_secs,
                backends: config
                    .generation
                    .backends
                    .iter()
                    .map(|b| b.kind().to_string())
                    .collect(),
            },
            queue: config.queue.clone(),
            notifier: SanitizedNotifierConfig {
                enabled: config.notifier.enabled,
                bot_token_configured: !config.notifier.bot_token.is_empty(),
                interval_secs: config.notifier.interval_secs,
                timeout_secs: config.notifier.timeout_secs,
                subscribers: config.notifier.subscribers.len(),
            },
        }
    }
}
