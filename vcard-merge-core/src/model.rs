//! The record/property/value model shared by every pipeline stage.
//!
//! This replaces the duck-typed, dynamically-attributed vCard object the
//! original tool relies on (`vobject.vCard`) with a concrete, explicitly
//! ordered representation. Order matters: several downstream invariants
//! (first-seen `TYPE=` ordering, deterministic grouping) depend on
//! properties and parameter values being iterated in the order they were
//! first observed, which is why `IndexMap` is used throughout instead of
//! a hash map.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use indexmap::IndexMap;

/// Returned when a [`PropertyName`]/[`ParamName`] is built from text that
/// isn't already non-empty uppercase ASCII.
#[derive(Debug, Clone, thiserror::Error)]
#[error("name is not uppercase ASCII: {0:?}")]
pub struct InvalidNameError(pub String);

fn is_uppercase_ascii(s: &str) -> bool {
    !s.is_empty() && s.is_ascii() && !s.chars().any(|c| c.is_ascii_lowercase())
}

/// An uppercase-ASCII property name (`FN`, `TEL`, `X-CUSTOM`, ...).
///
/// Validated on construction via [`PropertyName::new`]; the `From`
/// impls below are for call sites (literals, already-sanitized text)
/// that are trusted to already satisfy the invariant, and panic
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyName(String);

impl PropertyName {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidNameError> {
        let s = s.into();
        if is_uppercase_ascii(&s) {
            Ok(PropertyName(s))
        } else {
            Err(InvalidNameError(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for PropertyName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PropertyName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for PropertyName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PropertyName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PropertyName {
    fn from(s: &str) -> Self {
        PropertyName::new(s).expect("property name must be uppercase ASCII")
    }
}

impl From<String> for PropertyName {
    fn from(s: String) -> Self {
        PropertyName::new(s).expect("property name must be uppercase ASCII")
    }
}

/// An uppercase-ASCII parameter name (`TYPE`, `ENCODING`, `VALUE`, ...).
/// Same validation and trusted-literal conversions as [`PropertyName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamName(String);

impl ParamName {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidNameError> {
        let s = s.into();
        if is_uppercase_ascii(&s) {
            Ok(ParamName(s))
        } else {
            Err(InvalidNameError(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ParamName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ParamName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ParamName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ParamName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for ParamName {
    fn from(s: &str) -> Self {
        ParamName::new(s).expect("parameter name must be uppercase ASCII")
    }
}

impl From<String> for ParamName {
    fn from(s: String) -> Self {
        ParamName::new(s).expect("parameter name must be uppercase ASCII")
    }
}

/// A structured value for the `N` property: family name, given name(s),
/// and an optional suffix (used to carry bracketed/parenthesized content,
/// see [`crate::names::build_structured_name`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredName {
    pub family: String,
    pub given: String,
    pub suffix: Option<String>,
}

impl StructuredName {
    /// Stringifies the same way the original tool's `str(vcard.n.value)`
    /// did: the three fields space-joined, suffix last.
    pub fn to_plain_string(&self) -> String {
        let mut parts = vec![self.family.as_str(), self.given.as_str()];
        if let Some(suffix) = &self.suffix {
            parts.push(suffix.as_str());
        }
        parts
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A property's value. `N` and `ORG` get their own structured shapes;
/// every other property is a scalar string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Name(StructuredName),
    List(Vec<String>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&StructuredName> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Ordered parameter-name -> ordered set of parameter-values mapping,
/// e.g. `TYPE -> [HOME, VOICE]`.
pub type Params = IndexMap<ParamName, Vec<String>>;

/// A single property instance: `NAME;PARAMS:VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropertyName,
    pub value: Value,
    pub params: Params,
}

impl Property {
    pub fn new(name: impl Into<PropertyName>, value: Value) -> Self {
        Property {
            name: name.into(),
            value,
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Returns the ordered list of values for a `TYPE` parameter, if any.
    pub fn types(&self) -> Option<&[String]> {
        self.params.get("TYPE").map(|v| v.as_slice())
    }
}

/// One contact: an ordered collection of property instances.
///
/// Properties are kept as a flat, insertion-ordered `Vec` rather than a
/// name -> instances map, because several operations (the fixer, the
/// serializer) need to preserve the exact original interleaving of
/// distinct property names, and a map-of-lists would lose that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub properties: Vec<Property>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// All instances with the given (case-sensitive, uppercase) name, in
    /// source order.
    pub fn all(&self, name: &str) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    pub fn all_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut Property> {
        self.properties.iter_mut().filter(move |p| p.name == name)
    }

    pub fn first(&self, name: &str) -> Option<&Property> {
        self.all(name).next()
    }

    pub fn has(&self, name: &str) -> bool {
        self.first(name).is_some()
    }

    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    /// Removes every instance of `name`, returning how many were removed.
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.properties.len();
        self.properties.retain(|p| p.name != name);
        before - self.properties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_name_plain_string_skips_empty_fields() {
        let n = StructuredName {
            family: "Doe".to_string(),
            given: "".to_string(),
            suffix: None,
        };
        assert_eq!(n.to_plain_string(), "Doe");
    }

    #[test]
    fn record_remove_all_counts_removed() {
        let mut record = Record::new();
        record.push(Property::new("EMAIL", Value::Text("a@example.com".into())));
        record.push(Property::new("EMAIL", Value::Text("b@example.com".into())));
        record.push(Property::new("FN", Value::Text("A".into())));
        assert_eq!(record.remove_all("EMAIL"), 2);
        assert_eq!(record.properties.len(), 1);
    }
}
