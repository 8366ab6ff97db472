//! Configuration for directory connections and query defaults.
//!
//! [`DirectoryConfig`] doubles as the query layer's configuration source: the
//! executor takes its default search base from [`DirectoryConfig::base_dn`]
//! and its default result cap from [`DirectoryConfig::search_size_limit`]
//! whenever the query specification leaves them unset.

use crate::dn::DistinguishedName;
use crate::Result;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

/// Credentials used for the directory bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindCredentials {
    /// Distinguished name to bind as.
    bind_dn: String,
    /// Bind password; never serialized.
    #[serde(skip_serializing)]
    bind_password: SecretString,
}

impl BindCredentials {
    /// Creates new bind credentials.
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, bind_password: impl Into<String>) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            bind_password: SecretString::from(bind_password.into()),
        }
    }

    /// The bind distinguished name.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Exposes the bind password for the bind operation.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }
}

/// Configuration for connecting to and querying a directory server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    url: String,
    credentials: BindCredentials,
    base_dn: DistinguishedName,
    #[serde(default)]
    search_size_limit: u32,
    #[serde(default = "default_tls_verify")]
    tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tls_ca_cert: Option<PathBuf>,
    #[serde(default = "default_connection_timeout_secs")]
    connection_timeout_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    operation_timeout_secs: u64,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl DirectoryConfig {
    /// Creates a new directory configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the provided URL is invalid.
    pub fn new(
        url: impl Into<String>,
        credentials: BindCredentials,
        base_dn: DistinguishedName,
    ) -> Result<Self> {
        let url_string = url.into();
        Url::parse(&url_string)?;

        Ok(Self {
            url: url_string,
            credentials,
            base_dn,
            search_size_limit: 0,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        })
    }

    /// Returns the directory endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the bind credentials.
    #[must_use]
    pub const fn credentials(&self) -> &BindCredentials {
        &self.credentials
    }

    /// Returns the default search base.
    #[must_use]
    pub const fn base_dn(&self) -> &DistinguishedName {
        &self.base_dn
    }

    /// Returns the default result cap for searches; 0 means unlimited.
    #[must_use]
    pub const fn search_size_limit(&self) -> u32 {
        self.search_size_limit
    }

    /// Returns whether TLS certificate verification is enabled.
    #[must_use]
    pub const fn tls_verify(&self) -> bool {
        self.tls_verify
    }

    /// Optional custom CA certificate path.
    #[must_use]
    pub fn tls_ca_cert(&self) -> Option<&PathBuf> {
        self.tls_ca_cert.as_ref()
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the default result cap; 0 means unlimited.
    #[must_use]
    pub const fn with_search_size_limit(mut self, limit: u32) -> Self {
        self.search_size_limit = limit;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
