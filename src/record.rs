//! Records (data frames): one flat attribute map per incoming unit of data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GateResult, ValidationError};
use crate::value::Value;

/// A flat mapping from attribute name to scalar value.
///
/// An attribute whose value is JSON `null` is treated the same as an absent
/// key. Zero, `false` and empty strings are present values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attribute, value);
        self
    }

    /// Inserts or replaces an attribute value.
    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(attribute.into(), value.into());
    }

    /// Returns the value of an attribute, or `None` if it is absent or null.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.fields.get(attribute).filter(|v| !v.is_null())
    }

    /// Returns true if the attribute is present with a non-null value.
    #[must_use]
    pub fn contains(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a record from a JSON object.
    pub fn from_json_str(json: &str) -> GateResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ValidationError::Malformed {
                what: "record",
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
