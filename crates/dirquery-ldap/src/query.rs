//! Query specification, search execution, and result shaping.
//!
//! [`EntryQuery`] is configured once by the caller (base DN, scope, filter,
//! requested attributes, size limit), then each accessor runs its own search
//! against the connection provider and projects the raw result set into the
//! shape it promises. Accessors never share a cache; two calls mean two
//! search round-trips.

use crate::config::DirectoryConfig;
use crate::conn::{ConnectionProvider, CursorItem, LdapConnectionProvider};
use crate::filter::DEFAULT_FILTER;
use crate::Result;
use dirquery_core::{Entry, EntrySet, Error, Match};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Search breadth relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// The base entry itself.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all descendants.
    #[default]
    Subtree,
}

/// Cap on the number of entries a search may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeLimit {
    /// No client-requested cap.
    #[default]
    Unlimited,
    /// At most this many entries.
    Limited(u32),
}

impl SizeLimit {
    /// Wire representation; 0 requests no limit.
    #[must_use]
    pub fn as_wire(self) -> i32 {
        match self {
            Self::Unlimited => 0,
            Self::Limited(limit) => i32::try_from(limit).unwrap_or(i32::MAX),
        }
    }
}

impl From<u32> for SizeLimit {
    fn from(limit: u32) -> Self {
        if limit == 0 {
            Self::Unlimited
        } else {
            Self::Limited(limit)
        }
    }
}

/// Immutable snapshot of one search operation's parameters.
///
/// Built fresh for every execution; accessors that need different attributes
/// (the DN list) override them here instead of mutating the query
/// specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base.
    pub base_dn: String,
    /// Search breadth.
    pub scope: SearchScope,
    /// Search filter, RFC 4515 syntax, passed to the server verbatim.
    pub filter: String,
    /// Requested attributes: `None` for all, empty for none.
    pub attributes: Option<Vec<String>>,
    /// Result cap for this search.
    pub size_limit: SizeLimit,
}

/// How a search run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// The cursor was drained without incident.
    Complete,
    /// The server stopped at the size limit; collected entries are valid.
    Truncated,
    /// A protocol error ended the iteration; collected entries are kept.
    Aborted(Error),
}

/// Typed result of one search execution.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Entries collected before the search ended.
    pub entries: EntrySet,
    /// Completion status.
    pub status: SearchStatus,
}

impl SearchOutcome {
    /// Returns true when the cursor was fully drained.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SearchStatus::Complete
    }

    /// Returns true when the server cut the search at the size limit.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.status == SearchStatus::Truncated
    }

    /// Collapses the outcome to its entries, logging an aborted status.
    ///
    /// Truncation is partial success and passes silently; an abort is logged
    /// at `warn` so the partial (possibly empty) result can be handled like
    /// any other.
    #[must_use]
    pub fn into_entries(self) -> EntrySet {
        if let SearchStatus::Aborted(err) = &self.status {
            warn!(error = %err, "directory search aborted; returning partial result");
        }
        self.entries
    }
}

/// A parameterized directory search and its result projections.
///
/// Defaults: subtree scope, `(objectClass=*)` filter, all attributes, base
/// DN and size limit taken from [`DirectoryConfig`]. Concurrent use requires
/// distinct instances; setters mutate the specification between executions.
pub struct EntryQuery {
    config: Arc<DirectoryConfig>,
    provider: Arc<dyn ConnectionProvider>,
    base_dn: Option<String>,
    scope: SearchScope,
    filter: String,
    attributes: Option<Vec<String>>,
    size_limit: Option<SizeLimit>,
}

impl EntryQuery {
    /// Creates a query backed by an `ldap3` connection provider for the
    /// given configuration.
    #[must_use]
    pub fn new(config: Arc<DirectoryConfig>) -> Self {
        let provider = Arc::new(LdapConnectionProvider::new(config.clone()));
        Self::with_provider(config, provider)
    }

    /// Creates a query over an explicit connection provider.
    #[must_use]
    pub fn with_provider(config: Arc<DirectoryConfig>, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            config,
            provider,
            base_dn: None,
            scope: SearchScope::default(),
            filter: DEFAULT_FILTER.to_string(),
            attributes: None,
            size_limit: None,
        }
    }

    /// Overrides the search base for subsequent executions.
    pub fn set_base_dn(&mut self, base_dn: impl Into<String>) {
        self.base_dn = Some(base_dn.into());
    }

    /// Sets the search breadth.
    pub fn set_scope(&mut self, scope: SearchScope) {
        self.scope = scope;
    }

    /// Sets the search filter, stored verbatim. An empty string falls back
    /// to `(objectClass=*)` at execution time.
    pub fn set_search_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Requests specific result attributes; an empty selection requests no
    /// attributes at all.
    pub fn set_result_attributes<I, S>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
    }

    /// Reverts to requesting all attributes.
    pub fn clear_result_attributes(&mut self) {
        self.attributes = None;
    }

    /// Caps the number of returned entries for subsequent executions.
    pub fn set_max_results(&mut self, limit: impl Into<SizeLimit>) {
        self.size_limit = Some(limit.into());
    }

    /// Executes the search and returns the typed outcome.
    ///
    /// Exactly one search round-trip. Referrals are skipped; a size-limit
    /// stop or protocol error ends the iteration but keeps everything
    /// collected up to that point.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired from the
    /// provider; directory-level failures are reported through
    /// [`SearchStatus::Aborted`].
    pub async fn execute(&self) -> Result<SearchOutcome> {
        self.run(self.request(None)).await
    }

    /// Executes the search and returns the raw result set, keyed by DN in
    /// cursor arrival order.
    ///
    /// Protocol failures are logged and collapse to the partial (possibly
    /// empty) result; use [`EntryQuery::execute`] to observe them.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn find(&self) -> Result<EntrySet> {
        Ok(self.execute().await?.into_entries())
    }

    /// Returns the matched entry iff the search matched exactly one.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn single_entry(&self) -> Result<Match<Entry>> {
        Ok(self.find().await?.into_single())
    }

    /// Returns the attribute map of the single matched entry, or an empty
    /// map when zero or several entries matched.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn single_result(&self) -> Result<HashMap<String, Vec<String>>> {
        Ok(match self.single_entry().await? {
            Match::One(entry) => entry.attributes,
            Match::None | Match::Many => HashMap::new(),
        })
    }

    /// Returns each attribute's first value for the single matched entry.
    ///
    /// Attributes without values are omitted. Empty for zero or several
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn single_attribute_map(&self) -> Result<HashMap<String, String>> {
        let attributes = self.single_result().await?;
        Ok(attributes
            .into_iter()
            .filter_map(|(name, mut values)| {
                if values.is_empty() {
                    None
                } else {
                    Some((name, values.remove(0)))
                }
            })
            .collect())
    }

    /// Returns the first value of the first requested attribute present on
    /// the single matched entry.
    ///
    /// Requires result attributes to be set; returns an empty string when
    /// they are unset or empty, when the match is not single, or when none
    /// of the requested attributes is present.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn single_attribute(&self) -> Result<String> {
        let Some(requested) = self.requested_attributes() else {
            return Ok(String::new());
        };
        let requested = requested.to_vec();
        let mut available = self.single_attribute_map().await?;
        for name in &requested {
            if let Some(value) = available.remove(name) {
                return Ok(value);
            }
        }
        Ok(String::new())
    }

    /// Returns the matched distinguished names in cursor arrival order.
    ///
    /// This is an existence-only query: the underlying request asks for the
    /// `objectClass` attribute alone, leaving the query specification
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn dn_list(&self) -> Result<Vec<String>> {
        let request = self.request(Some(vec!["objectClass".to_string()]));
        let entries = self.run(request).await?.into_entries();
        Ok(entries.dns().map(ToOwned::to_owned).collect())
    }

    /// Returns the single matched distinguished name with explicit
    /// cardinality.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn dn_match(&self) -> Result<Match<String>> {
        let mut dns = self.dn_list().await?;
        Ok(match dns.len() {
            0 => Match::None,
            1 => Match::One(dns.remove(0)),
            _ => Match::Many,
        })
    }

    /// Returns the matched distinguished name iff the search matched exactly
    /// one entry; zero and multiple matches are both absent.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn single_dn(&self) -> Result<Option<String>> {
        Ok(self.dn_match().await?.into_option())
    }

    /// Returns every value of every requested attribute across all matched
    /// entries, in entry, then attribute, then value order.
    ///
    /// Requires result attributes to be set; returns an empty list when they
    /// are unset or empty. Attributes absent from an entry contribute
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error only when no connection could be acquired.
    pub async fn attribute_list(&self) -> Result<Vec<String>> {
        let Some(requested) = self.requested_attributes() else {
            return Ok(Vec::new());
        };
        let requested = requested.to_vec();
        let entries = self.find().await?;
        let mut values = Vec::new();
        for entry in entries.iter() {
            for name in &requested {
                if let Some(attribute_values) = entry.values(name) {
                    values.extend(attribute_values.iter().cloned());
                }
            }
        }
        Ok(values)
    }

    /// Requested attributes when set and non-empty.
    fn requested_attributes(&self) -> Option<&[String]> {
        self.attributes
            .as_deref()
            .filter(|attributes| !attributes.is_empty())
    }

    /// Builds the immutable per-execution request, resolving defaults from
    /// the configuration source.
    fn request(&self, attributes_override: Option<Vec<String>>) -> SearchRequest {
        let filter = if self.filter.is_empty() {
            DEFAULT_FILTER.to_string()
        } else {
            self.filter.clone()
        };
        SearchRequest {
            base_dn: self
                .base_dn
                .clone()
                .unwrap_or_else(|| self.config.base_dn().as_str().to_string()),
            scope: self.scope,
            filter,
            attributes: match attributes_override {
                Some(attributes) => Some(attributes),
                None => self.attributes.clone(),
            },
            size_limit: self
                .size_limit
                .unwrap_or_else(|| SizeLimit::from(self.config.search_size_limit())),
        }
    }

    async fn run(&self, request: SearchRequest) -> Result<SearchOutcome> {
        let mut connection = self.provider.connection().await?;
        debug!(
            base_dn = %request.base_dn,
            filter = %request.filter,
            scope = ?request.scope,
            "executing directory search"
        );

        let mut cursor = match connection.search(request).await {
            Ok(cursor) => cursor,
            Err(err) => {
                return Ok(SearchOutcome {
                    entries: EntrySet::new(),
                    status: SearchStatus::Aborted(err),
                })
            }
        };

        let mut entries = EntrySet::new();
        let mut referrals = 0usize;
        let status = loop {
            match cursor.next().await {
                Ok(Some(CursorItem::Entry(entry))) => {
                    entries.insert(entry);
                }
                Ok(Some(CursorItem::Referral)) => referrals += 1,
                Ok(None) => break SearchStatus::Complete,
                Err(Error::SizeLimitExceeded) => break SearchStatus::Truncated,
                Err(err) => break SearchStatus::Aborted(err),
            }
        };
        if referrals > 0 {
            debug!(referrals, "skipped referral results");
        }
        Ok(SearchOutcome { entries, status })
    }
}
