//! Event filter sets.
//!
//! An `EventFilterSet` owns one attribute filter per declared attribute of an
//! event and the ordered list of triggers registered on it. Row `i` of every
//! filter belongs to `trigger_ids[i]`; registration keeps that alignment by
//! adding exactly one row (constraint or wildcard) to every filter per
//! trigger.
//!
//! After `seal` the set is immutable and `evaluate` takes `&self`, so a sealed
//! set can be shared across threads and evaluated concurrently.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ExecutionError, FilterState, GateError, GateResult, ValidationError};
use crate::filter::AttributeFilter;
use crate::record::Record;
use crate::schema::EventSchema;
use crate::trigger::{TriggerId, TriggerSpec};

/// Callback invoked with the name of a declared attribute a record lacks.
pub type MissingAttributeHandler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug)]
struct AttributeSlot {
    name: String,
    filter: AttributeFilter,
}

/// Per-event filters plus the triggers registered on them.
pub struct EventFilterSet {
    event_name: String,
    slots: Vec<AttributeSlot>,
    trigger_ids: Vec<TriggerId>,
    registered: HashSet<TriggerId>,
    on_missing_attribute: Option<MissingAttributeHandler>,
    state: FilterState,
}

impl fmt::Debug for EventFilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilterSet")
            .field("event_name", &self.event_name)
            .field("slots", &self.slots)
            .field("trigger_ids", &self.trigger_ids)
            .field("on_missing_attribute", &self.on_missing_attribute.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl EventFilterSet {
    /// Creates an open set with one empty filter per declared attribute.
    pub fn new(event_name: impl Into<String>, schema: &EventSchema) -> GateResult<Self> {
        let event_name = event_name.into();
        let mut slots: Vec<AttributeSlot> = Vec::with_capacity(schema.len());
        for decl in schema.attributes() {
            if slots.iter().any(|s| s.name == decl.name) {
                return Err(ValidationError::DuplicateAttribute {
                    event: event_name,
                    attribute: decl.name.clone(),
                }
                .into());
            }
            slots.push(AttributeSlot {
                name: decl.name.clone(),
                filter: AttributeFilter::new(decl.kind),
            });
        }

        Ok(Self {
            event_name,
            slots,
            trigger_ids: Vec::new(),
            registered: HashSet::new(),
            on_missing_attribute: None,
            state: FilterState::Open,
        })
    }

    /// Builder-style variant of [`set_missing_attribute_handler`](Self::set_missing_attribute_handler).
    #[must_use]
    pub fn with_missing_attribute_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_missing_attribute = Some(Arc::new(handler));
        self
    }

    /// Installs the callback run when a record lacks a declared attribute.
    pub fn set_missing_attribute_handler(&mut self, handler: MissingAttributeHandler) {
        self.on_missing_attribute = Some(handler);
    }

    /// Registers a trigger.
    ///
    /// Every constrained attribute in `spec` must be declared and its
    /// constraint must fit the attribute's filter kind; the spec is checked in
    /// full before any row is added, so a rejected registration leaves the set
    /// unchanged.
    pub fn register_trigger(&mut self, trigger_id: impl Into<TriggerId>, spec: &TriggerSpec) -> GateResult<()> {
        let trigger_id = trigger_id.into();
        self.ensure(FilterState::Open, "register a trigger")?;

        if self.registered.contains(&trigger_id) {
            return Err(ValidationError::DuplicateTrigger {
                event: self.event_name.clone(),
                trigger: trigger_id.to_string(),
            }
            .into());
        }
        self.validate_spec(spec)?;

        for slot in &mut self.slots {
            match spec.get(&slot.name) {
                Some(constraint) => slot.filter.add_constraint(constraint)?,
                None => slot.filter.add_wildcard_row()?,
            }
        }

        debug!(
            event = %self.event_name,
            trigger = %trigger_id,
            row = self.trigger_ids.len(),
            constrained = spec.len(),
            "registered trigger"
        );
        self.registered.insert(trigger_id.clone());
        self.trigger_ids.push(trigger_id);
        Ok(())
    }

    fn validate_spec(&self, spec: &TriggerSpec) -> GateResult<()> {
        for (attribute, constraint) in spec.iter() {
            let Some(slot) = self.slots.iter().find(|s| s.name == attribute) else {
                return Err(ValidationError::UnknownAttribute {
                    event: self.event_name.clone(),
                    attribute: attribute.to_string(),
                }
                .into());
            };
            if !slot.filter.accepts(constraint) {
                return Err(ValidationError::ConstraintMismatch {
                    event: self.event_name.clone(),
                    attribute: attribute.to_string(),
                    expected: slot.filter.kind().as_str(),
                    actual: constraint.family(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Compiles every attribute filter and closes registration.
    ///
    /// Sealing is one-way; a second call is rejected.
    pub fn seal(&mut self) -> GateResult<()> {
        self.ensure(FilterState::Open, "seal")?;
        for slot in &mut self.slots {
            slot.filter.seal()?;
        }
        self.state = FilterState::Sealed;
        debug!(
            event = %self.event_name,
            triggers = self.trigger_ids.len(),
            attributes = self.slots.len(),
            "sealed event filters"
        );
        Ok(())
    }

    /// Returns the first declared attribute `record` has no value for, as a
    /// `MissingAttribute` error.
    pub fn check_record(&self, record: &Record) -> GateResult<()> {
        match self.slots.iter().find(|s| !record.contains(&s.name)) {
            None => Ok(()),
            Some(slot) => Err(ExecutionError::MissingAttribute {
                event: self.event_name.clone(),
                attribute: slot.name.clone(),
            }
            .into()),
        }
    }

    /// Triggers whose predicates all hold for `record`, in registration order.
    ///
    /// A record lacking any declared attribute matches nothing: the
    /// missing-attribute handler runs once with that attribute's name and an
    /// empty list is returned. Values that cannot be coerced to the filter's
    /// type fail with `TypeCoercion`.
    pub fn evaluate(&self, record: &Record) -> GateResult<Vec<TriggerId>> {
        self.ensure(FilterState::Sealed, "evaluate")?;

        let mut values = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let Some(value) = record.get(&slot.name) else {
                debug!(event = %self.event_name, attribute = %slot.name, "record lacks declared attribute");
                if let Some(handler) = &self.on_missing_attribute {
                    handler(&slot.name);
                }
                return Ok(Vec::new());
            };
            values.push(value);
        }

        let mut acc = vec![true; self.trigger_ids.len()];
        for (slot, value) in self.slots.iter().zip(values) {
            slot.filter.evaluate_into(&slot.name, value, &mut acc)?;
        }

        Ok(acc
            .iter()
            .zip(&self.trigger_ids)
            .filter_map(|(&hit, id)| hit.then(|| id.clone()))
            .collect())
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Registered triggers in row order.
    #[must_use]
    pub fn trigger_ids(&self) -> &[TriggerId] {
        &self.trigger_ids
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.trigger_ids.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn contains_trigger(&self, trigger_id: &TriggerId) -> bool {
        self.registered.contains(trigger_id)
    }

    /// Declared attribute names in schema order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// The filter behind a declared attribute.
    #[must_use]
    pub fn filter(&self, attribute: &str) -> Option<&AttributeFilter> {
        self.slots.iter().find(|s| s.name == attribute).map(|s| &s.filter)
    }

    #[allow(missing_docs)]
    #[must_use]
    pub const fn state(&self) -> FilterState {
        self.state
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state == FilterState::Sealed
    }

    fn ensure(&self, required: FilterState, operation: &'static str) -> GateResult<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(GateError::sealed_state(
                format!("event '{}'", self.event_name),
                operation,
                self.state,
            ))
        }
    }
}
