//! Bit-set membership filter over 64-bit flag words.

use serde::{Deserialize, Serialize};

use crate::error::{FilterState, GateError, GateResult};

const TARGET: &str = "bitmask filter";

/// How a row mask is combined with the record's flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitmaskPolicy {
    /// Every bit set in the mask must be set in the value ("hard").
    Strict,
    /// At least one bit set in the mask must be set in the value ("soft").
    Permissive,
}

impl BitmaskPolicy {
    /// Applies the policy to one mask.
    #[must_use]
    pub const fn admits(self, mask: u64, value: u64) -> bool {
        match self {
            Self::Strict => mask & value == mask,
            Self::Permissive => mask & value != 0,
        }
    }
}

/// One mask per trigger row.
///
/// Wildcard rows are kept as `None` and admit every value under both
/// policies; they are not encoded as an all-ones mask, which a strict policy
/// would read as "every flag required".
#[derive(Debug, Clone)]
pub struct BitmaskFilter {
    policy: BitmaskPolicy,
    rows: Vec<Option<u64>>,
    state: FilterState,
}

impl BitmaskFilter {
    #[allow(missing_docs)]
    #[must_use]
    pub const fn new(policy: BitmaskPolicy) -> Self {
        Self {
            policy,
            rows: Vec::new(),
            state: FilterState::Open,
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn strict() -> Self {
        Self::new(BitmaskPolicy::Strict)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn permissive() -> Self {
        Self::new(BitmaskPolicy::Permissive)
    }

    /// Appends a pre-encoded mask verbatim.
    pub fn add_constraint(&mut self, mask: u64) -> GateResult<()> {
        self.push_row(Some(mask))
    }

    /// Appends a row that admits every value.
    pub fn add_wildcard_row(&mut self) -> GateResult<()> {
        self.push_row(None)
    }

    fn push_row(&mut self, row: Option<u64>) -> GateResult<()> {
        self.ensure(FilterState::Open, "add a row")?;
        self.rows.push(row);
        Ok(())
    }

    /// Freezes the rows. Sealing twice is rejected.
    pub fn seal(&mut self) -> GateResult<()> {
        self.ensure(FilterState::Open, "seal")?;
        self.rows.shrink_to_fit();
        self.state = FilterState::Sealed;
        Ok(())
    }

    /// Row-wise admission of `value`.
    pub fn evaluate(&self, value: u64) -> GateResult<Vec<bool>> {
        let mut out = vec![true; self.len()];
        self.evaluate_into(value, &mut out)?;
        Ok(out)
    }

    /// ANDs row-wise admission of `value` into `acc`.
    pub fn evaluate_into(&self, value: u64, acc: &mut [bool]) -> GateResult<()> {
        self.ensure(FilterState::Sealed, "evaluate")?;
        if acc.len() != self.len() {
            return Err(GateError::internal(format!(
                "bitmask filter has {} rows, accumulator has {}",
                self.len(),
                acc.len()
            )));
        }
        let policy = self.policy;
        for (slot, row) in acc.iter_mut().zip(&self.rows) {
            *slot &= row.map_or(true, |mask| policy.admits(mask, value));
        }
        Ok(())
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn policy(&self) -> BitmaskPolicy {
        self.policy
    }

    /// Rows in registration order; `None` is a wildcard row.
    #[must_use]
    pub fn rows(&self) -> &[Option<u64>] {
        &self.rows
    }

    /// Number of trigger rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
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
