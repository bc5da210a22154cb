//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::retry::DialPolicy;
use crate::core::{FprotError, Result};

/// Address used when none is given.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:10200";

/// Default dial timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default per-operation timeout once connected.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default pause between dial retries.
pub const DEFAULT_CONNECT_SLEEP: Duration = Duration::from_secs(1);

/// Configuration for a [`Client`](crate::Client).
///
/// Durations serialize as integer milliseconds so the struct can be
/// embedded in a host application's configuration file.
///
/// # Examples
///
/// ```rust
/// use fprot::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("192.168.1.126:10200")
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_connect_retries(2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Daemon address as `host:port`.
    pub address: String,

    /// Timeout for each dial attempt.
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Timeout applied to every read and write of an exchange.
    #[serde(with = "duration_millis")]
    pub command_timeout: Duration,

    /// Additional dial attempts after a timeout.
    pub connect_retries: u32,

    /// Pause between dial attempts.
    #[serde(with = "duration_millis")]
    pub connect_sleep: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_retries: 0,
            connect_sleep: DEFAULT_CONNECT_SLEEP,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `address`; an empty address selects
    /// [`DEFAULT_ADDRESS`].
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
        .resolved()
    }

    /// Replaces an empty address with [`DEFAULT_ADDRESS`].
    ///
    /// Applies to configurations built by struct literal or deserialized
    /// from a file, where the address may be left blank.
    pub fn resolved(mut self) -> Self {
        if self.address.is_empty() {
            self.address = DEFAULT_ADDRESS.to_string();
        }
        self
    }

    /// Sets the dial timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the number of dial retries.
    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = retries;
        self
    }

    /// Sets the pause between dial retries.
    pub fn with_connect_sleep(mut self, sleep: Duration) -> Self {
        self.connect_sleep = sleep;
        self
    }

    /// Returns the dial retry policy.
    pub fn dial_policy(&self) -> DialPolicy {
        DialPolicy::new()
            .with_retries(self.connect_retries)
            .with_sleep(self.connect_sleep)
    }

    /// Checks the configuration without touching the network.
    ///
    /// An empty address is accepted; it stands for [`DEFAULT_ADDRESS`].
    pub fn validate(&self) -> Result<()> {
        if !self.address.is_empty() {
            validate_address(&self.address)?;
        }
        if self.connect_timeout.is_zero() {
            return Err(FprotError::configuration("connect timeout must be non-zero"));
        }
        if self.command_timeout.is_zero() {
            return Err(FprotError::configuration("command timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Checks that `address` has the form `host:port`.
///
/// Exactly one colon is accepted, which rules out unbracketed IPv6
/// literals and Unix socket paths.
pub fn validate_address(address: &str) -> Result<()> {
    if address.matches(':').count() != 1 {
        return Err(FprotError::configuration("The supplied address is invalid"));
    }
    Ok(())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
