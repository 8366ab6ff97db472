//! Integration tests for query execution and result shaping.
//!
//! These tests drive the public accessor surface against an in-memory
//! directory that honors equality filters, size limits, and referral
//! injection through the connection-provider traits.

use async_trait::async_trait;
use dirquery_ldap::{
    BindCredentials, ConnectionProvider, CursorItem, DirectoryConfig, DirectoryConnection,
    DistinguishedName, Entry, EntryCursor, EntryQuery, Error, Match, Result, SearchRequest,
    SizeLimit,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

fn entry(dn: &str, attrs: &[(&str, &[&str])]) -> Entry {
    let mut attributes = HashMap::new();
    for (name, values) in attrs {
        attributes.insert(
            (*name).to_string(),
            values.iter().map(ToString::to_string).collect(),
        );
    }
    Entry {
        dn: dn.to_string(),
        attributes,
    }
}

fn people() -> Vec<Entry> {
    vec![
        entry(
            "uid=alice,ou=People,dc=example,dc=com",
            &[
                ("uid", &["alice"]),
                ("cn", &["Alice Adams"]),
                ("mail", &["alice@example.com", "a.adams@example.com"]),
            ],
        ),
        entry(
            "uid=bob,ou=People,dc=example,dc=com",
            &[("uid", &["bob"]), ("cn", &["Bob Brown"])],
        ),
        entry(
            "uid=carol,ou=People,dc=example,dc=com",
            &[
                ("uid", &["carol"]),
                ("cn", &["Carol Clark"]),
                ("mail", &["carol@example.com"]),
            ],
        ),
    ]
}

/// Matches the two filter shapes the fixtures use: presence filters
/// (`(attr=*)`) match everything, equality filters match on any value.
fn matches_filter(entry: &Entry, filter: &str) -> bool {
    let inner = filter.trim_start_matches('(').trim_end_matches(')');
    let Some((attribute, value)) = inner.split_once('=') else {
        return false;
    };
    if value == "*" {
        return true;
    }
    entry
        .values(attribute)
        .is_some_and(|values| values.iter().any(|candidate| candidate == value))
}

/// Applies the requested-attribute selection the way a server would.
fn project(mut entry: Entry, attributes: Option<&[String]>) -> Entry {
    match attributes {
        None => entry,
        Some([]) => {
            entry.attributes.clear();
            entry
        }
        Some(names) => {
            entry
                .attributes
                .retain(|name, _| names.iter().any(|requested| requested == name));
            entry
        }
    }
}

#[derive(Clone, Default)]
struct Fixture {
    entries: Vec<Entry>,
    referrals: usize,
}

struct FixtureProvider {
    fixture: Fixture,
    requests: Arc<Mutex<Vec<SearchRequest>>>,
}

impl FixtureProvider {
    fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ConnectionProvider for FixtureProvider {
    async fn connection(&self) -> Result<Box<dyn DirectoryConnection>> {
        Ok(Box::new(FixtureConnection {
            fixture: self.fixture.clone(),
            requests: self.requests.clone(),
        }))
    }
}

struct FixtureConnection {
    fixture: Fixture,
    requests: Arc<Mutex<Vec<SearchRequest>>>,
}

#[async_trait]
impl DirectoryConnection for FixtureConnection {
    async fn search(&mut self, request: SearchRequest) -> Result<Box<dyn EntryCursor>> {
        self.requests.lock().unwrap().push(request.clone());

        let mut items: VecDeque<Result<Option<CursorItem>>> = VecDeque::new();
        for _ in 0..self.fixture.referrals {
            items.push_back(Ok(Some(CursorItem::Referral)));
        }

        let matched: Vec<Entry> = self
            .fixture
            .entries
            .iter()
            .filter(|candidate| matches_filter(candidate, &request.filter))
            .cloned()
            .collect();
        let (cap, truncated) = match request.size_limit {
            SizeLimit::Limited(limit) if matched.len() > limit as usize => (limit as usize, true),
            _ => (matched.len(), false),
        };
        for candidate in matched.into_iter().take(cap) {
            items.push_back(Ok(Some(CursorItem::Entry(project(
                candidate,
                request.attributes.as_deref(),
            )))));
        }
        if truncated {
            items.push_back(Err(Error::SizeLimitExceeded));
        }

        Ok(Box::new(FixtureCursor { items }))
    }
}

struct FixtureCursor {
    items: VecDeque<Result<Option<CursorItem>>>,
}

#[async_trait]
impl EntryCursor for FixtureCursor {
    async fn next(&mut self) -> Result<Option<CursorItem>> {
        self.items.pop_front().unwrap_or(Ok(None))
    }
}

fn config() -> Arc<DirectoryConfig> {
    let credentials = BindCredentials::new("cn=admin,dc=example,dc=com", "secret");
    let base_dn = DistinguishedName::parse("dc=example,dc=com").unwrap();
    Arc::new(DirectoryConfig::new("ldap://directory.example.com", credentials, base_dn).unwrap())
}

fn query_over(fixture: Fixture) -> (EntryQuery, Arc<Mutex<Vec<SearchRequest>>>) {
    let provider = FixtureProvider::new(fixture);
    let requests = provider.requests.clone();
    (
        EntryQuery::with_provider(config(), Arc::new(provider)),
        requests,
    )
}

#[tokio::test]
async fn size_limit_truncates_without_error() {
    let (mut query, _) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });
    query.set_max_results(2u32);

    let outcome = query.execute().await.unwrap();
    assert!(outcome.is_truncated());
    assert_eq!(outcome.entries.len(), 2);

    let entries = query.find().await.unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn single_match_is_fully_projectable() {
    let (mut query, _) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });
    query.set_search_filter("(uid=alice)");
    query.set_result_attributes(["mail", "cn"]);

    assert_eq!(
        query.single_dn().await.unwrap(),
        Some("uid=alice,ou=People,dc=example,dc=com".to_string())
    );

    let attributes = query.single_result().await.unwrap();
    assert_eq!(
        attributes.get("mail"),
        Some(&vec![
            "alice@example.com".to_string(),
            "a.adams@example.com".to_string()
        ])
    );

    let first_values = query.single_attribute_map().await.unwrap();
    assert_eq!(
        first_values.get("mail"),
        Some(&"alice@example.com".to_string())
    );

    // First requested attribute present wins; first of its values returned.
    assert_eq!(query.single_attribute().await.unwrap(), "alice@example.com");
}

#[tokio::test]
async fn zero_and_many_matches_are_both_absent() {
    let (mut query, _) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });

    query.set_search_filter("(uid=nobody)");
    assert_eq!(query.single_dn().await.unwrap(), None);
    assert!(query.single_result().await.unwrap().is_empty());
    assert_eq!(query.dn_match().await.unwrap(), Match::None);

    query.set_search_filter("(objectClass=*)");
    assert_eq!(query.single_dn().await.unwrap(), None);
    assert!(query.single_result().await.unwrap().is_empty());
    assert_eq!(query.dn_match().await.unwrap(), Match::Many);
}

#[tokio::test]
async fn dn_list_length_matches_key_count() {
    let (query, requests) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });

    let entries = query.find().await.unwrap();
    let dns = query.dn_list().await.unwrap();
    assert_eq!(dns.len(), entries.len());
    assert_eq!(dns, entries.dns().map(String::from).collect::<Vec<_>>());

    // The DN list ran as an existence-only query.
    let recorded = requests.lock().unwrap();
    assert_eq!(
        recorded.last().unwrap().attributes,
        Some(vec!["objectClass".to_string()])
    );
}

#[tokio::test]
async fn attribute_list_length_is_value_count_sum() {
    let (mut query, _) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });
    query.set_result_attributes(["mail"]);

    let values = query.attribute_list().await.unwrap();
    // alice has two mail values, bob none, carol one.
    assert_eq!(
        values,
        vec![
            "alice@example.com",
            "a.adams@example.com",
            "carol@example.com"
        ]
    );
}

#[tokio::test]
async fn consecutive_finds_have_identical_key_sets() {
    let (query, _) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });
    let first: Vec<String> = query.find().await.unwrap().dns().map(String::from).collect();
    let second: Vec<String> = query.find().await.unwrap().dns().map(String::from).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn referrals_are_skipped_not_collected() {
    let (query, _) = query_over(Fixture {
        entries: people(),
        referrals: 2,
    });
    let entries = query.find().await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.dns().all(|dn| dn.starts_with("uid=")));
}

#[tokio::test]
async fn each_accessor_runs_its_own_search() {
    let (query, requests) = query_over(Fixture {
        entries: people(),
        referrals: 0,
    });
    let _ = query.find().await.unwrap();
    let _ = query.dn_list().await.unwrap();
    let _ = query.single_dn().await.unwrap();
    assert_eq!(requests.lock().unwrap().len(), 3);
}
