//! Connection provider boundary and the `ldap3`-backed implementation.
//!
//! The query executor only sees three traits: [`ConnectionProvider`] hands
//! out live, bound connections; [`DirectoryConnection`] issues a single
//! search; [`EntryCursor`] walks the results one item at a time,
//! distinguishing entries from referrals and surfacing the size-limit
//! condition at the point of truncation. [`LdapConnectionProvider`] is the
//! production implementation: it binds lazily, keeps one underlying
//! connection, and hands out cheap clones of the protocol handle.

use crate::config::DirectoryConfig;
use crate::query::{SearchRequest, SearchScope};
use crate::Result;
use async_trait::async_trait;
use dirquery_core::{Entry, Error};
use ldap3::result::{LdapResult, SearchResult};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, ResultEntry, Scope, SearchEntry, SearchOptions};
use native_tls::{Certificate, TlsConnector};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// LDAP result code for a search terminated by the size limit.
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
/// LDAP result code for a referral returned as the search completion.
const RC_REFERRAL: u32 = 10;
/// LDAP result code for rejected credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// One item produced by an [`EntryCursor`].
#[derive(Debug, Clone)]
pub enum CursorItem {
    /// A directory entry.
    Entry(Entry),
    /// A referral to another server; never followed.
    Referral,
}

/// Cursor over the items of one search operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryCursor: Send {
    /// Advances the cursor.
    ///
    /// Returns `Ok(None)` at the end of the result stream. A search stopped
    /// by the server's size limit yields [`Error::SizeLimitExceeded`] at the
    /// truncation point; any other error is a protocol failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeLimitExceeded`] on truncation or
    /// [`Error::Protocol`] on a directory-level failure.
    async fn next(&mut self) -> Result<Option<CursorItem>>;
}

/// A live, bound directory connection able to run one search per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Issues a single search operation and returns a cursor over its
    /// results.
    ///
    /// # Errors
    ///
    /// Returns an error when the server rejects the search outright.
    async fn search(&mut self, request: SearchRequest) -> Result<Box<dyn EntryCursor>>;
}

/// Supplies already-authenticated directory connections on demand.
///
/// The provider owns connection lifecycle; callers never close what it hands
/// out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Returns a live, bound connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] when no connection can be
    /// established and [`Error::BindFailed`] when the server rejects the
    /// configured credentials.
    async fn connection(&self) -> Result<Box<dyn DirectoryConnection>>;
}

/// Connection provider backed by `ldap3`.
///
/// Connects and binds on first use, then reuses the same underlying
/// connection for every subsequent request by cloning the multiplexing
/// handle.
pub struct LdapConnectionProvider {
    config: Arc<DirectoryConfig>,
    shared: Mutex<Option<Ldap>>,
}

impl LdapConnectionProvider {
    /// Creates a provider for the given configuration.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        Self {
            config,
            shared: Mutex::new(None),
        }
    }

    /// Unbinds and drops the cached connection, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the unbind operation fails.
    pub async fn dispose(&self) -> Result<()> {
        let mut guard = self.shared.lock().await;
        if let Some(mut ldap) = guard.take() {
            ldap.unbind().await.map_err(map_ldap_error)?;
        }
        Ok(())
    }

    async fn handle(&self) -> Result<Ldap> {
        let mut guard = self.shared.lock().await;
        if let Some(ldap) = guard.as_ref() {
            return Ok(ldap.clone());
        }
        let ldap = self.connect_and_bind().await?;
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    async fn connect_and_bind(&self) -> Result<Ldap> {
        let settings = build_conn_settings(&self.config)?;
        debug!(url = self.config.url(), "connecting to directory server");
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, self.config.url())
            .await
            .map_err(|err| Error::NotConnected(err.to_string()))?;
        ldap3::drive!(conn);

        let credentials = self.config.credentials();
        let result = timeout(
            self.config.operation_timeout(),
            ldap.simple_bind(credentials.bind_dn(), credentials.bind_password()),
        )
        .await
        .map_err(|_| Error::Timeout("directory bind timed out".to_string()))?
        .map_err(map_ldap_error)?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(Error::BindFailed("invalid credentials".to_string()));
        }
        if result.rc != 0 {
            return Err(Error::BindFailed(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        debug!(
            bind_dn = credentials.bind_dn(),
            "directory connection established"
        );
        Ok(ldap)
    }
}

#[async_trait]
impl ConnectionProvider for LdapConnectionProvider {
    async fn connection(&self) -> Result<Box<dyn DirectoryConnection>> {
        let ldap = self.handle().await?;
        Ok(Box::new(LdapDirectoryConnection {
            ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct LdapDirectoryConnection {
    ldap: Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for LdapDirectoryConnection {
    async fn search(&mut self, request: SearchRequest) -> Result<Box<dyn EntryCursor>> {
        let attributes = wire_attributes(request.attributes.as_deref());
        self.ldap
            .with_search_options(SearchOptions::new().sizelimit(request.size_limit.as_wire()));

        let SearchResult(items, done) = timeout(
            self.operation_timeout,
            self.ldap.search(
                &request.base_dn,
                request.scope.into(),
                &request.filter,
                attributes,
            ),
        )
        .await
        .map_err(|_| Error::Timeout("directory search timed out".to_string()))?
        .map_err(map_ldap_error)?;

        Ok(Box::new(LdapEntryCursor {
            items: items.into_iter(),
            done: Some(done),
        }))
    }
}

struct LdapEntryCursor {
    items: std::vec::IntoIter<ResultEntry>,
    done: Option<LdapResult>,
}

#[async_trait]
impl EntryCursor for LdapEntryCursor {
    async fn next(&mut self) -> Result<Option<CursorItem>> {
        if let Some(item) = self.items.next() {
            if item.is_ref() {
                return Ok(Some(CursorItem::Referral));
            }
            let entry = SearchEntry::construct(item);
            return Ok(Some(CursorItem::Entry(Entry {
                dn: entry.dn,
                attributes: entry.attrs,
            })));
        }
        match self.done.take() {
            None => Ok(None),
            Some(result) => completion_status(&result),
        }
    }
}

/// Maps the search completion result onto the cursor contract.
fn completion_status(result: &LdapResult) -> Result<Option<CursorItem>> {
    match result.rc {
        0 => Ok(None),
        RC_SIZE_LIMIT_EXCEEDED => Err(Error::SizeLimitExceeded),
        RC_REFERRAL => {
            debug!("search completed with a referral result; not followed");
            Ok(None)
        }
        rc => Err(Error::Protocol {
            code: rc,
            message: result.text.clone(),
        }),
    }
}

/// Translates the requested-attribute selection to the wire form.
///
/// `None` requests all user attributes (`*`); an empty list requests no
/// attributes at all (`1.1`, RFC 4511).
fn wire_attributes(attributes: Option<&[String]>) -> Vec<String> {
    match attributes {
        None => vec!["*".to_string()],
        Some([]) => vec!["1.1".to_string()],
        Some(list) => list.to_vec(),
    }
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

fn build_conn_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = config.tls_ca_cert() {
        let pem = fs::read(cert_path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to load CA certificate: {err}")))?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    warn!(error = %err, "directory operation failed");
    Error::Protocol {
        code: 0,
        message: err.to_string(),
    }
}
