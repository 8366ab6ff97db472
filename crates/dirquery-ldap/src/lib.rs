//! Parameterized LDAP search execution and result shaping.
//!
//! This crate builds and runs directory search requests against a pluggable
//! connection provider, tolerating referrals and size-limit truncation while
//! collecting results, and projects the raw entries into attribute-oriented
//! views: a single distinguished name, an attribute map, one scalar value, or
//! a flattened value list.

#![deny(missing_docs)]

mod config;
mod conn;
mod dn;
mod filter;
mod query;

pub use config::{
    BindCredentials, DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS,
    DEFAULT_OPERATION_TIMEOUT_SECS,
};
pub use conn::{
    ConnectionProvider, CursorItem, DirectoryConnection, EntryCursor, LdapConnectionProvider,
};
pub use dn::{DistinguishedName, DnError, Rdn};
pub use filter::{escape_value, from_template, DEFAULT_FILTER, FALLBACK_FILTER};
pub use query::{EntryQuery, SearchOutcome, SearchRequest, SearchScope, SearchStatus, SizeLimit};

pub use dirquery_core::{Entry, EntrySet, Error, Match};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirquery_core::Result<T>;
