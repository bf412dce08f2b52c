use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known property key: the registration sequence number assigned by the
/// registry. Set automatically on every registration.
pub const SERVICE_ID: &str = "service.id";

/// Well-known property key: integer ranking used to order same-interface
/// registrations. Defaults to 0; higher wins.
pub const SERVICE_RANKING: &str = "service.ranking";

/// A single value in a service property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

/// Property bag attached to a service registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProperties {
    entries: HashMap<String, PropertyValue>,
}

impl ServiceProperties {
    /// Create an empty property bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Convenience builder for the `service.ranking` property
    pub fn with_ranking(self, ranking: i32) -> Self {
        self.with(SERVICE_RANKING, ranking)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(PropertyValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PropertyValue::Str(v)) => Some(v),
            _ => None,
        }
    }

    /// The registration's ranking; absent or non-integer values count as 0,
    /// values outside the `i32` range saturate.
    pub fn ranking(&self) -> i32 {
        self.get_int(SERVICE_RANKING)
            .unwrap_or(0)
            .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A predicate over a service property bag.
///
/// Lookups and listeners use an explicit equality/boolean filter instead of
/// a query string: filters are built programmatically from [`eq`](Self::eq)
/// and the [`and`](Self::and)/[`or`](Self::or)/[`not`](Self::not)
/// combinators.
#[derive(Debug, Clone)]
pub enum ServiceFilter {
    /// Property `key` is present and equal to the value
    Eq(String, PropertyValue),
    /// Property `key` is present, whatever its value
    Present(String),
    /// All sub-filters match
    And(Vec<ServiceFilter>),
    /// At least one sub-filter matches
    Or(Vec<ServiceFilter>),
    /// The sub-filter does not match
    Not(Box<ServiceFilter>),
}

impl ServiceFilter {
    pub fn eq(key: &str, value: impl Into<PropertyValue>) -> Self {
        ServiceFilter::Eq(key.to_string(), value.into())
    }

    pub fn present(key: &str) -> Self {
        ServiceFilter::Present(key.to_string())
    }

    pub fn and(filters: impl IntoIterator<Item = ServiceFilter>) -> Self {
        ServiceFilter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = ServiceFilter>) -> Self {
        ServiceFilter::Or(filters.into_iter().collect())
    }

    pub fn not(filter: ServiceFilter) -> Self {
        ServiceFilter::Not(Box::new(filter))
    }

    /// Evaluate the filter against a property bag
    pub fn matches(&self, properties: &ServiceProperties) -> bool {
        match self {
            ServiceFilter::Eq(key, value) => properties.get(key) == Some(value),
            ServiceFilter::Present(key) => properties.contains_key(key),
            ServiceFilter::And(filters) => filters.iter().all(|f| f.matches(properties)),
            ServiceFilter::Or(filters) => filters.iter().any(|f| f.matches(properties)),
            ServiceFilter::Not(filter) => !filter.matches(properties),
        }
    }
}
