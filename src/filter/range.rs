//! Numeric range filter.

use crate::error::{FilterState, GateError, GateResult};
use crate::trigger::RangeConstraint;

/// Sentinel for an open bound: no limit on that side.
pub const UNBOUNDED: f64 = f64::NAN;

const TARGET: &str = "range filter";

/// One inclusive `[lower, upper]` row per trigger, in registration order.
///
/// Either side may be [`UNBOUNDED`].
#[derive(Debug, Clone)]
pub struct RangeFilter {
    lower: Vec<f64>,
    upper: Vec<f64>,
    state: FilterState,
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeFilter {
    #[allow(missing_docs)]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lower: Vec::new(),
            upper: Vec::new(),
            state: FilterState::Open,
        }
    }

    /// Appends the row a constraint compiles to.
    pub fn add_constraint(&mut self, constraint: RangeConstraint) -> GateResult<()> {
        let (lower, upper) = constraint.bounds();
        self.push_row(lower, upper)
    }

    /// Appends a row that admits every value.
    pub fn add_wildcard_row(&mut self) -> GateResult<()> {
        self.push_row(UNBOUNDED, UNBOUNDED)
    }

    fn push_row(&mut self, lower: f64, upper: f64) -> GateResult<()> {
        self.ensure(FilterState::Open, "add a row")?;
        self.lower.push(lower);
        self.upper.push(upper);
        Ok(())
    }

    /// Freezes the rows. Sealing twice is rejected.
    pub fn seal(&mut self) -> GateResult<()> {
        self.ensure(FilterState::Open, "seal")?;
        self.lower.shrink_to_fit();
        self.upper.shrink_to_fit();
        self.state = FilterState::Sealed;
        Ok(())
    }

    /// Row-wise admission of `value`.
    pub fn evaluate(&self, value: f64) -> GateResult<Vec<bool>> {
        let mut out = vec![true; self.len()];
        self.evaluate_into(value, &mut out)?;
        Ok(out)
    }

    /// ANDs row-wise admission of `value` into `acc`.
    pub fn evaluate_into(&self, value: f64, acc: &mut [bool]) -> GateResult<()> {
        self.ensure(FilterState::Sealed, "evaluate")?;
        if acc.len() != self.len() {
            return Err(GateError::internal(format!(
                "range filter has {} rows, accumulator has {}",
                self.len(),
                acc.len()
            )));
        }
        for ((slot, &lower), &upper) in acc.iter_mut().zip(&self.lower).zip(&self.upper) {
            *slot &= admits(lower, upper, value);
        }
        Ok(())
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Number of trigger rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn state(&self) -> FilterState {
        self.state
    }

    fn ensure(&self, required: FilterState, operation: &'static str) -> GateResult<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(GateError::sealed_state(TARGET, operation, self.state))
        }
    }
}

#[inline]
fn admits(lower: f64, upper: f64, value: f64) -> bool {
    (lower.is_nan() || value >= lower) && (upper.is_nan() || value <= upper)
}
