//! Attribute filters.
//!
//! An attribute filter holds one predicate row per registered trigger for a
//! single record attribute. Rows are accumulated while the filter is open,
//! frozen by `seal`, and then evaluated element-wise against one scalar value,
//! yielding one boolean per trigger.

/// Bit-set membership filter.
pub mod bitmask;
/// Numeric range filter.
pub mod range;

use std::fmt;
use std::str::FromStr;

use crate::error::{ExecutionError, FilterState, GateResult, ValidationError};
use crate::trigger::Constraint;
use crate::value::Value;

pub use bitmask::{BitmaskFilter, BitmaskPolicy};
pub use range::{RangeFilter, UNBOUNDED};

/// The filter kind declared for an attribute in an event schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Numeric range ("range").
    Range,
    /// Flag word with a combination policy ("bitmask_strict" / "hard",
    /// "bitmask_permissive" / "soft").
    Bitmask(BitmaskPolicy),
}

impl FilterKind {
    /// Canonical name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Bitmask(BitmaskPolicy::Strict) => "bitmask_strict",
            Self::Bitmask(BitmaskPolicy::Permissive) => "bitmask_permissive",
        }
    }

    const fn family(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Bitmask(_) => "bitmask",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "range" | "quantity_range" => Ok(Self::Range),
            "bitmask_strict" | "strict" | "hard" => Ok(Self::Bitmask(BitmaskPolicy::Strict)),
            "bitmask_permissive" | "permissive" | "soft" => Ok(Self::Bitmask(BitmaskPolicy::Permissive)),
            _ => Err(ValidationError::UnknownFilterKind { kind: s.to_string() }),
        }
    }
}

/// Closed set of attribute filters.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub enum AttributeFilter {
    Range(RangeFilter),
    Bitmask(BitmaskFilter),
}

impl AttributeFilter {
    /// Creates an empty, open filter of the given kind.
    #[must_use]
    pub const fn new(kind: FilterKind) -> Self {
        match kind {
            FilterKind::Range => Self::Range(RangeFilter::new()),
            FilterKind::Bitmask(policy) => Self::Bitmask(BitmaskFilter::new(policy)),
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::Range(_) => FilterKind::Range,
            Self::Bitmask(f) => FilterKind::Bitmask(f.policy()),
        }
    }

    /// Returns true if `constraint` belongs to this filter's family.
    #[must_use]
    pub const fn accepts(&self, constraint: &Constraint) -> bool {
        matches!(
            (self, constraint),
            (Self::Range(_), Constraint::Range(_)) | (Self::Bitmask(_), Constraint::Bitmask(_))
        )
    }

    /// Appends the row for `constraint`.
    pub fn add_constraint(&mut self, constraint: &Constraint) -> GateResult<()> {
        match (self, constraint) {
            (Self::Range(f), Constraint::Range(c)) => f.add_constraint(*c),
            (Self::Bitmask(f), Constraint::Bitmask(mask)) => f.add_constraint(*mask),
            (filter, constraint) => Err(ValidationError::InvalidConstraint {
                reason: format!(
                    "a {} filter cannot take a {} constraint",
                    filter.kind().family(),
                    constraint.family()
                ),
            }
            .into()),
        }
    }

    /// Appends a row that admits every value.
    pub fn add_wildcard_row(&mut self) -> GateResult<()> {
        match self {
            Self::Range(f) => f.add_wildcard_row(),
            Self::Bitmask(f) => f.add_wildcard_row(),
        }
    }

    #[allow(missing_docs)]
    pub fn seal(&mut self) -> GateResult<()> {
        match self {
            Self::Range(f) => f.seal(),
            Self::Bitmask(f) => f.seal(),
        }
    }

    /// Coerces `value` and returns the row-wise admission vector.
    pub fn evaluate(&self, attribute: &str, value: &Value) -> GateResult<Vec<bool>> {
        let mut out = vec![true; self.len()];
        self.evaluate_into(attribute, value, &mut out)?;
        Ok(out)
    }

    /// Coerces `value` and ANDs the row-wise admission into `acc`.
    pub fn evaluate_into(&self, attribute: &str, value: &Value, acc: &mut [bool]) -> GateResult<()> {
        match self {
            Self::Range(f) => {
                let v = value.to_f64().ok_or_else(|| coercion_error(attribute, "a number", value))?;
                f.evaluate_into(v, acc)
            }
            Self::Bitmask(f) => {
                let v = value
                    .to_u64()
                    .ok_or_else(|| coercion_error(attribute, "an unsigned 64-bit integer", value))?;
                f.evaluate_into(v, acc)
            }
        }
    }

    /// Number of trigger rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Range(f) => f.len(),
            Self::Bitmask(f) => f.len(),
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn state(&self) -> FilterState {
        match self {
            Self::Range(f) => f.state(),
            Self::Bitmask(f) => f.state(),
        }
    }
}

fn coercion_error(attribute: &str, expected: &'static str, value: &Value) -> ExecutionError {
    ExecutionError::TypeCoercion {
        attribute: attribute.to_string(),
        expected,
        value: value.to_string(),
    }
}
