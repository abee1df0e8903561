//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`MQ_*`)
//!
//! The connection settings are immutable once the connector is built; every
//! connection parameter travels through [`ConnectionConfig`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{InboundError, Result};

/// Content type used when none is declared.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue manager connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Downstream sequence hand-off
    #[serde(default)]
    pub injection: InjectionConfig,

    /// Poll scheduling
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            InboundError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Default config file location (`<config dir>/mq-inbound/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mq-inbound").join("config.toml"))
    }

    /// Overlay `MQ_*` environment variables on top of this config
    pub fn apply_env(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok();

        // Connection settings
        if let Some(host) = var("MQ_HOST") {
            self.connection.host = host;
        }
        if let Some(port) = var("MQ_PORT").and_then(|p| p.parse().ok()) {
            self.connection.port = port;
        }
        if let Some(channel) = var("MQ_CHANNEL") {
            self.connection.channel = channel;
        }
        if let Some(qmgr) = var("MQ_QMGR") {
            self.connection.queue_manager = qmgr;
        }
        if let Some(queue) = var("MQ_QUEUE") {
            self.connection.queue = queue;
        }
        if let Some(user) = var("MQ_USER_ID") {
            self.connection.user_id = Some(user);
        }
        if let Some(password) = var("MQ_PASSWORD") {
            self.connection.password = Some(password);
        }
        if let Some(enabled) = var("MQ_SSL_ENABLED").and_then(|v| v.parse().ok()) {
            self.connection.ssl_enabled = enabled;
        }

        // TLS material
        let tls = &mut self.connection.tls;
        if let Some(path) = var("MQ_SSL_KEYSTORE_LOCATION") {
            tls.keystore_path = Some(path.into());
        }
        if let Some(kind) = var("MQ_SSL_KEYSTORE_TYPE") {
            tls.keystore_type = Some(kind);
        }
        if let Some(password) = var("MQ_SSL_KEYSTORE_PASSWORD") {
            tls.keystore_password = Some(password);
        }
        if let Some(path) = var("MQ_SSL_TRUSTSTORE_LOCATION") {
            tls.truststore_path = Some(path.into());
        }
        if let Some(kind) = var("MQ_SSL_TRUSTSTORE_TYPE") {
            tls.truststore_type = Some(kind);
        }
        if let Some(version) = var("MQ_SSL_VERSION") {
            tls.protocol_version = Some(version);
        }
        if let Some(suite) = var("MQ_SSL_CIPHERSUITE") {
            tls.cipher_suite = Some(suite);
        }
        if let Some(fips) = var("MQ_SSL_FIPS").and_then(|v| v.parse().ok()) {
            tls.fips_required = fips;
        }

        // Injection
        if let Some(seq) = var("MQ_INJECTION_SEQUENCE") {
            self.injection.sequence = Some(seq);
        }
        if let Some(seq) = var("MQ_ERROR_SEQUENCE") {
            self.injection.error_sequence = Some(seq);
        }
        if let Some(content_type) = var("MQ_CONTENT_TYPE") {
            self.injection.content_type = content_type;
        }

        // Poll settings
        if let Some(ms) = var("MQ_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll.interval_ms = ms;
        }
        if let Some(ms) = var("MQ_RECEIVE_WAIT_MS").and_then(|v| v.parse().ok()) {
            self.poll.receive_wait_ms = ms;
        }

        self
    }

    /// Structural checks. TLS material and the injection sequence are
    /// checked lazily, per tick, so a broken value never stops the host.
    pub fn validate(&self) -> Result<()> {
        let conn = &self.connection;
        let required = [
            ("host", &conn.host),
            ("channel", &conn.channel),
            ("queue_manager", &conn.queue_manager),
            ("queue", &conn.queue),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(InboundError::Configuration(format!(
                    "connection.{field} must not be empty"
                )));
            }
        }
        if conn.port == 0 {
            return Err(InboundError::Configuration(
                "connection.port must not be 0".to_string(),
            ));
        }
        if self.poll.interval_ms == 0 {
            return Err(InboundError::Configuration(
                "poll.interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Queue manager connection configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Queue manager host name
    pub host: String,

    /// Listener port
    pub port: u16,

    /// Server-connection channel name
    pub channel: String,

    /// Queue manager name
    pub queue_manager: String,

    /// Queue to consume from
    pub queue: String,

    /// User id presented to the queue manager
    pub user_id: Option<String>,

    /// Password presented to the queue manager
    pub password: Option<String>,

    /// Enable TLS on the channel
    pub ssl_enabled: bool,

    /// TLS material, required when `ssl_enabled` is set
    pub tls: TlsSettings,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1414,
            channel: "DEV.APP.SVRCONN".to_string(),
            queue_manager: "QM1".to_string(),
            queue: "DEV.QUEUE.1".to_string(),
            user_id: None,
            password: None,
            ssl_enabled: false,
            tls: TlsSettings::default(),
        }
    }
}

impl ConnectionConfig {
    /// `host:port` of the listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shown in place of secrets in `Debug` output.
const REDACTED: &str = "<redacted>";

fn redact(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| REDACTED)
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("channel", &self.channel)
            .field("queue_manager", &self.queue_manager)
            .field("queue", &self.queue)
            .field("user_id", &self.user_id)
            .field("password", &redact(self.password.as_ref()))
            .field("ssl_enabled", &self.ssl_enabled)
            .field("tls", &self.tls)
            .finish()
    }
}

/// TLS keystore/truststore settings.
///
/// Every field is optional at parse time; the TLS context builder rejects
/// missing values when TLS is enabled.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Client keystore (certificate chain + private key)
    pub keystore_path: Option<PathBuf>,

    /// Keystore format
    pub keystore_type: Option<String>,

    /// Keystore password
    pub keystore_password: Option<String>,

    /// Trusted CA certificates
    pub truststore_path: Option<PathBuf>,

    /// Truststore format
    pub truststore_type: Option<String>,

    /// Protocol version (`TLSv1.2`, `TLSv1.3`, `TLS`)
    pub protocol_version: Option<String>,

    /// Cipher suite name
    pub cipher_suite: Option<String>,

    /// Restrict to FIPS-approved algorithms
    pub fips_required: bool,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("keystore_path", &self.keystore_path)
            .field("keystore_type", &self.keystore_type)
            .field("keystore_password", &redact(self.keystore_password.as_ref()))
            .field("truststore_path", &self.truststore_path)
            .field("truststore_type", &self.truststore_type)
            .field("protocol_version", &self.protocol_version)
            .field("cipher_suite", &self.cipher_suite)
            .field("fips_required", &self.fips_required)
            .finish()
    }
}

/// Downstream sequence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Sequence that receives injected messages
    pub sequence: Option<String>,

    /// Sequence that receives error reports
    pub error_sequence: Option<String>,

    /// Declared content type of message bodies
    pub content_type: String,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            sequence: None,
            error_sequence: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Poll scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Consumer name used in logs
    pub name: String,

    /// Interval between poll ticks in milliseconds
    pub interval_ms: u64,

    /// Bounded wait for a single receive in milliseconds (0 = no wait)
    pub receive_wait_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            name: "mq-inbound".to_string(),
            interval_ms: 1000,
            receive_wait_ms: 0,
        }
    }
}

impl PollConfig {
    /// Interval between ticks
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Bounded receive wait
    pub fn receive_wait(&self) -> Duration {
        Duration::from_millis(self.receive_wait_ms)
    }
}
