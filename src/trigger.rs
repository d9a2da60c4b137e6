//! Trigger identifiers and per-attribute predicate specifications.
//!
//! These types are serializable so trigger configurations can be shipped as
//! JSON documents:
//!
//! ```json
//! {
//!   "temperature": { "kind": "between", "values": [10, 20] },
//!   "status": 3
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GateResult, ValidationError};
use crate::filter::range::UNBOUNDED;

/// Opaque identifier of a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    /// Wraps a trigger name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TriggerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TriggerId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<&str> for TriggerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A numeric range predicate for one attribute.
///
/// Bounds are inclusive. `Between` does not check that `lo <= hi`; an
/// inverted range simply never matches.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRangeConstraint", into = "RawRangeConstraint")]
pub enum RangeConstraint {
    Greater(f64),
    Less(f64),
    Between(f64, f64),
    Equal(f64),
}

impl RangeConstraint {
    /// The `(lower, upper)` row this constraint compiles to. An open side is
    /// the NaN sentinel.
    #[must_use]
    pub const fn bounds(self) -> (f64, f64) {
        match self {
            Self::Greater(v) => (v, UNBOUNDED),
            Self::Less(v) => (UNBOUNDED, v),
            Self::Between(lo, hi) => (lo, hi),
            Self::Equal(v) => (v, v),
        }
    }

    /// Wire name of the comparison.
    #[must_use]
    pub const fn kind(self) -> RangeKind {
        match self {
            Self::Greater(_) => RangeKind::Greater,
            Self::Less(_) => RangeKind::Less,
            Self::Between(..) => RangeKind::Between,
            Self::Equal(_) => RangeKind::Equal,
        }
    }
}

/// Comparison selector in the wire form of a range constraint.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    Greater,
    Less,
    Between,
    Equal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RangeValues {
    Single(f64),
    Pair([f64; 2]),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawRangeConstraint {
    #[serde(alias = "being")]
    kind: RangeKind,
    values: RangeValues,
}

impl TryFrom<RawRangeConstraint> for RangeConstraint {
    type Error = ValidationError;

    fn try_from(raw: RawRangeConstraint) -> Result<Self, Self::Error> {
        match (raw.kind, raw.values) {
            (RangeKind::Greater, RangeValues::Single(v)) => Ok(Self::Greater(v)),
            (RangeKind::Less, RangeValues::Single(v)) => Ok(Self::Less(v)),
            (RangeKind::Equal, RangeValues::Single(v)) => Ok(Self::Equal(v)),
            (RangeKind::Between, RangeValues::Pair([lo, hi])) => Ok(Self::Between(lo, hi)),
            (RangeKind::Between, RangeValues::Single(_)) => Err(ValidationError::InvalidConstraint {
                reason: "'between' takes a [min, max] pair".to_string(),
            }),
            (kind, RangeValues::Pair(_)) => Err(ValidationError::InvalidConstraint {
                reason: format!("'{kind:?}' takes a single number").to_lowercase(),
            }),
        }
    }
}

impl From<RangeConstraint> for RawRangeConstraint {
    fn from(c: RangeConstraint) -> Self {
        let values = match c {
            RangeConstraint::Between(lo, hi) => RangeValues::Pair([lo, hi]),
            RangeConstraint::Greater(v) | RangeConstraint::Less(v) | RangeConstraint::Equal(v) => {
                RangeValues::Single(v)
            }
        };
        Self { kind: c.kind(), values }
    }
}

/// Predicate for one attribute of one trigger.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Range(RangeConstraint),
    /// Pre-encoded flag word; each set bit is one required (strict) or
    /// accepted (permissive) flag.
    Bitmask(u64),
}

impl Constraint {
    /// Human-readable constraint family.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::Range(_) => "range",
            Self::Bitmask(_) => "bitmask",
        }
    }
}

impl From<RangeConstraint> for Constraint {
    fn from(c: RangeConstraint) -> Self {
        Self::Range(c)
    }
}

impl From<u64> for Constraint {
    fn from(mask: u64) -> Self {
        Self::Bitmask(mask)
    }
}

/// Partial predicate specification of a trigger: only the attributes the
/// trigger cares about. Omitted attributes become wildcard rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerSpec {
    constraints: BTreeMap<String, Constraint>,
}

impl TriggerSpec {
    /// Creates an empty spec (matches every record that carries the schema).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint for an attribute, replacing any earlier one.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
        self.constraints.insert(attribute.into(), constraint.into());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn range(self, attribute: impl Into<String>, constraint: RangeConstraint) -> Self {
        self.with(attribute, constraint)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn bitmask(self, attribute: impl Into<String>, mask: u64) -> Self {
        self.with(attribute, mask)
    }

    /// Constraint supplied for an attribute, if any.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Constraint> {
        self.constraints.get(attribute)
    }

    /// Iterates constrained attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.constraints.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Parses a spec from its JSON form.
    pub fn from_json_str(json: &str) -> GateResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ValidationError::Malformed {
                what: "trigger spec",
                reason: e.to_string(),
            }
            .into()
        })
    }
}
