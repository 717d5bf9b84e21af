//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwitchyardConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Webhook route settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Update dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Outbound call policies.
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Bots served by this process.
    #[serde(default)]
    pub bots: Vec<BotConfig>,
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `switchyard_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

// =============================================================================
// Webhook & Dispatch
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public origin the platform posts to, e.g. `https://bots.example.com`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path under which guarded routes are mounted.
    #[serde(default = "default_webhook_path")]
    pub path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: default_webhook_path(),
        }
    }
}

fn default_webhook_path() -> String {
    "/update".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Internal time limit for handling one update, in milliseconds.
    #[serde(default)]
    pub handler_timeout_ms: Option<u64>,

    /// Time cancelled handlers get to wind down, in milliseconds.
    #[serde(default)]
    pub cancel_grace_ms: Option<u64>,
}

impl DispatchConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace_ms
            .map_or(crate::endpoint::DEFAULT_CANCEL_GRACE, Duration::from_millis)
    }
}

// =============================================================================
// Resilience
// =============================================================================

/// Policies applied to outbound calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cap shared by every high-frequency call.
    #[serde(default = "default_global_limit")]
    pub global: LimitConfig,

    /// Per-conversation cap per minute.
    #[serde(default = "default_chat_per_minute")]
    pub chat_per_minute: LimitConfig,

    /// Per-conversation burst cap per second.
    #[serde(default = "default_chat_per_second")]
    pub chat_per_second: LimitConfig,

    /// Cached policies unused for this long are evicted.
    #[serde(default = "default_policy_idle_secs")]
    pub policy_idle_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            global: default_global_limit(),
            chat_per_minute: default_chat_per_minute(),
            chat_per_second: default_chat_per_second(),
            policy_idle_secs: default_policy_idle_secs(),
        }
    }
}

impl ResilienceConfig {
    pub fn policy_idle(&self) -> Duration {
        Duration::from_secs(self.policy_idle_secs)
    }
}

fn default_global_limit() -> LimitConfig {
    LimitConfig::new(30, 1_000, 30)
}

fn default_chat_per_minute() -> LimitConfig {
    LimitConfig::new(20, 60_000, 20)
}

fn default_chat_per_second() -> LimitConfig {
    LimitConfig::new(1, 1_000, 3)
}

fn default_policy_idle_secs() -> u64 {
    300
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait used when a rejection carries no delay hint.
    #[serde(default = "default_wait_secs")]
    pub default_wait_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            default_wait_secs: default_wait_secs(),
        }
    }
}

impl RetryConfig {
    pub fn default_wait(&self) -> Duration {
        Duration::from_secs(self.default_wait_secs)
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_wait_secs() -> u64 {
    3
}

/// `permits` calls per `per_ms` milliseconds, bursting up to `burst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub permits: u32,
    pub per_ms: u64,
    pub burst: u32,
}

impl LimitConfig {
    pub const fn new(permits: u32, per_ms: u64, burst: u32) -> Self {
        Self {
            permits,
            per_ms,
            burst,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.per_ms)
    }
}

impl fmt::Display for LimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}ms (burst {})",
            self.permits, self.per_ms, self.burst
        )
    }
}

// =============================================================================
// Bots
// =============================================================================

/// A bot served by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// The platform's numeric bot id.
    pub id: i64,

    #[serde(default)]
    pub username: Option<String>,
}
