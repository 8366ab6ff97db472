//! Distinguished name handling for configured search bases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use dirquery_core::Error as CoreError;

/// Errors that can occur when parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component lacked the `attribute=value` form.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// The distinguished name ended mid escape sequence.
    #[error("distinguished name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<DnError> for CoreError {
    fn from(err: DnError) -> Self {
        CoreError::InvalidDn(err.to_string())
    }
}

/// A single `attribute=value` component of a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn {
    attribute: String,
    value: String,
}

impl Rdn {
    /// Attribute portion (e.g. `cn`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Value portion, unescaped.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Strongly-typed distinguished name.
///
/// Keeps a canonical string form alongside the parsed components. Parsing is
/// strict so malformed base DNs surface at configuration time rather than as
/// server-side errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<Rdn>,
}

impl DistinguishedName {
    /// Parses a distinguished name from a string.
    ///
    /// # Errors
    ///
    /// Returns [`DnError`] when the input is empty or a component is not of
    /// the `attribute=value` form.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, DnError> {
        let input = input.as_ref().trim();
        if input.is_empty() {
            return Err(DnError::Empty);
        }

        let mut rdns = Vec::new();
        for component in split_unescaped(input, ',')? {
            let (attribute, value) = component
                .split_once('=')
                .ok_or_else(|| DnError::InvalidComponent(component.clone()))?;
            let attribute = attribute.trim();
            let value = value.trim();
            if attribute.is_empty() || value.is_empty() {
                return Err(DnError::InvalidComponent(component.clone()));
            }
            rdns.push(Rdn {
                attribute: attribute.to_string(),
                value: unescape(value)?,
            });
        }

        Ok(Self {
            raw: canonical(&rdns),
            rdns,
        })
    }

    /// Borrows the canonical distinguished name string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed components in order, most specific first.
    #[must_use]
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// Looks up the value of the first matching attribute (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.rdns
            .iter()
            .find(|rdn| rdn.attribute.eq_ignore_ascii_case(attribute))
            .map(Rdn::value)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DistinguishedName {
    type Error = DnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for DistinguishedName {
    type Error = DnError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DistinguishedName> for String {
    fn from(value: DistinguishedName) -> Self {
        value.raw
    }
}

fn split_unescaped(input: &str, delimiter: char) -> Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push('\\');
            current.push(ch);
            escape = false;
        } else if ch == '\\' {
            escape = true;
        } else if ch == delimiter {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if escape {
        return Err(DnError::UnterminatedEscape);
    }
    parts.push(current);

    if parts.iter().any(|part| part.trim().is_empty()) {
        return Err(DnError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

fn unescape(value: &str) -> Result<String, DnError> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            result.push(chars.next().ok_or(DnError::UnterminatedEscape)?);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn canonical(rdns: &[Rdn]) -> String {
    rdns.iter()
        .map(|rdn| format!("{}={}", rdn.attribute, escape(&rdn.value)))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_dn() {
        let dn = DistinguishedName::parse("cn=John Doe, ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("John Doe"));
        assert_eq!(dn.get("OU"), Some("People"));
        assert_eq!(dn.get("o"), None);
        assert_eq!(dn.as_str(), "cn=John Doe,ou=People,dc=example,dc=com");
        assert_eq!(dn.rdns().len(), 4);
    }

    #[test]
    fn parse_dn_with_escaped_comma() {
        let dn = DistinguishedName::parse("cn=Smith\\, John,dc=example,dc=com").unwrap();
        assert_eq!(dn.get("cn"), Some("Smith, John"));
        assert_eq!(dn.to_string(), "cn=Smith\\, John,dc=example,dc=com");
    }

    #[test]
    fn rejects_empty_and_malformed_input() {
        assert_eq!(DistinguishedName::parse("  "), Err(DnError::Empty));
        assert!(matches!(
            DistinguishedName::parse("cn=John,"),
            Err(DnError::InvalidComponent(_))
        ));
        assert!(matches!(
            DistinguishedName::parse("people"),
            Err(DnError::InvalidComponent(_))
        ));
        assert!(matches!(
            DistinguishedName::parse("cn=John\\"),
            Err(DnError::UnterminatedEscape)
        ));
    }

    #[test]
    fn converts_to_core_error() {
        let err: CoreError = DnError::Empty.into();
        assert!(matches!(err, CoreError::InvalidDn(_)));
    }

    #[test]
    fn serde_uses_string_form() {
        let dn = DistinguishedName::parse("dc=example,dc=com").unwrap();
        let json = serde_json::to_string(&dn).unwrap();
        assert_eq!(json, "\"dc=example,dc=com\"");
        let back: DistinguishedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dn);
    }
}
