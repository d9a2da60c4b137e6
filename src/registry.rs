//! Trigger registry.
//!
//! Owns every declared event and the handler bound to each trigger name. A
//! registry is built single-threaded, sealed once, and then shared (usually
//! behind an `Arc`) with whatever feeds it records.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ExecutionError, GateError, GateResult, ValidationError};
use crate::event::{EventFilterSet, MissingAttributeHandler};
use crate::record::Record;
use crate::schema::EventSchema;
use crate::trigger::{TriggerId, TriggerSpec};

/// Callable run with the record that matched its trigger.
pub type TriggerHandler = Arc<dyn Fn(&Record) + Send + Sync>;

/// Events, their filter sets, and trigger handlers.
#[derive(Default)]
pub struct TriggerRegistry {
    events: HashMap<String, EventFilterSet>,
    handlers: HashMap<TriggerId, TriggerHandler>,
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&TriggerId> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("TriggerRegistry")
            .field("events", &self.events)
            .field("handlers", &handlers)
            .finish()
    }
}

impl TriggerRegistry {
    #[allow(missing_docs)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an event. Redefining an event name is rejected.
    pub fn define_event(&mut self, name: impl Into<String>, schema: &EventSchema) -> GateResult<&mut EventFilterSet> {
        self.insert_event(name.into(), schema, None)
    }

    /// Declares an event with a callback for records lacking a declared
    /// attribute.
    pub fn define_event_with_handler(
        &mut self,
        name: impl Into<String>,
        schema: &EventSchema,
        on_missing_attribute: MissingAttributeHandler,
    ) -> GateResult<&mut EventFilterSet> {
        self.insert_event(name.into(), schema, Some(on_missing_attribute))
    }

    fn insert_event(
        &mut self,
        name: String,
        schema: &EventSchema,
        on_missing_attribute: Option<MissingAttributeHandler>,
    ) -> GateResult<&mut EventFilterSet> {
        if self.events.contains_key(&name) {
            return Err(ValidationError::AlreadyDefined { item: "event", name }.into());
        }
        let mut set = EventFilterSet::new(name.clone(), schema)?;
        if let Some(handler) = on_missing_attribute {
            set.set_missing_attribute_handler(handler);
        }
        debug!(event = %name, attributes = schema.len(), "defined event");
        Ok(self.events.entry(name).or_insert(set))
    }

    /// Binds a handler to a trigger name. Rebinding is rejected.
    pub fn define_handler<F>(&mut self, trigger_id: impl Into<TriggerId>, handler: F) -> GateResult<()>
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        let trigger_id = trigger_id.into();
        if self.handlers.contains_key(&trigger_id) {
            return Err(ValidationError::AlreadyDefined {
                item: "trigger handler",
                name: trigger_id.to_string(),
            }
            .into());
        }
        self.handlers.insert(trigger_id, Arc::new(handler));
        Ok(())
    }

    /// Registers a trigger on a declared event.
    pub fn add_trigger(
        &mut self,
        event: &str,
        trigger_id: impl Into<TriggerId>,
        spec: &TriggerSpec,
    ) -> GateResult<()> {
        self.event_mut(event)?.register_trigger(trigger_id, spec)
    }

    /// Seals every event that is still open.
    pub fn seal(&mut self) -> GateResult<()> {
        for set in self.events.values_mut() {
            if !set.is_sealed() {
                set.seal()?;
            }
        }
        Ok(())
    }

    /// Returns true once every declared event is sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.events.values().all(EventFilterSet::is_sealed)
    }

    #[allow(missing_docs)]
    pub fn event(&self, name: &str) -> GateResult<&EventFilterSet> {
        self.events.get(name).ok_or_else(|| event_not_found(name))
    }

    #[allow(missing_docs)]
    pub fn event_mut(&mut self, name: &str) -> GateResult<&mut EventFilterSet> {
        self.events.get_mut(name).ok_or_else(|| event_not_found(name))
    }

    /// Declared event names, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn handler(&self, trigger_id: &TriggerId) -> Option<&TriggerHandler> {
        self.handlers.get(trigger_id)
    }

    /// Triggers of `event` matching `record`, without running handlers.
    pub fn matches(&self, event: &str, record: &Record) -> GateResult<Vec<TriggerId>> {
        self.event(event)?.evaluate(record)
    }

    /// Evaluates `record` and runs the handler of every matched trigger in
    /// registration order.
    ///
    /// Handlers are all resolved before the first one runs, so a missing
    /// handler fails the record without partial dispatch.
    pub fn run_event(&self, event: &str, record: &Record) -> GateResult<Vec<TriggerId>> {
        let matched = self.matches(event, record)?;
        let handlers = matched
            .iter()
            .map(|id| {
                self.handlers.get(id).ok_or_else(|| {
                    GateError::from(ExecutionError::HandlerNotFound {
                        trigger: id.to_string(),
                    })
                })
            })
            .collect::<GateResult<Vec<&TriggerHandler>>>()?;

        for handler in handlers {
            handler(record);
        }
        Ok(matched)
    }
}

fn event_not_found(name: &str) -> GateError {
    ExecutionError::EventNotFound { name: name.to_string() }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::filter::{BitmaskPolicy, FilterKind};
    use crate::trigger::RangeConstraint;

    fn schema() -> EventSchema {
        EventSchema::new()
            .attribute("price", FilterKind::Range)
            .attribute("flags", FilterKind::Bitmask(BitmaskPolicy::Permissive))
    }

    #[test]
    fn event_redefinition_is_rejected() {
        let mut registry = TriggerRegistry::new();
        registry.define_event("ticker", &schema()).unwrap();
        let err = registry.define_event("ticker", &schema()).unwrap_err();
        assert_eq!(
            err,
            GateError::Validation(ValidationError::AlreadyDefined {
                item: "event",
                name: "ticker".to_string(),
            })
        );
    }

    #[test]
    fn handler_redefinition_is_rejected() {
        let mut registry = TriggerRegistry::new();
        registry.define_handler("buy", |_| {}).unwrap();
        let err = registry.define_handler("buy", |_| {}).unwrap_err();
        assert!(matches!(err, GateError::Validation(ValidationError::AlreadyDefined { .. })));
    }

    #[test]
    fn unknown_event() {
        let mut registry = TriggerRegistry::new();
        let err = registry.add_trigger("nope", "t", &TriggerSpec::new()).unwrap_err();
        assert_eq!(
            err,
            GateError::Execution(ExecutionError::EventNotFound { name: "nope".to_string() })
        );
        assert!(registry.matches("nope", &Record::new()).is_err());
    }

    #[test]
    fn run_event_invokes_matched_handlers_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TriggerRegistry::new();
        registry.define_event("ticker", &schema()).unwrap();

        for name in ["cheap", "any", "pricey"] {
            let sink = Arc::clone(&calls);
            registry
                .define_handler(name, move |record: &Record| {
                    let price = record.get("price").and_then(crate::Value::to_f64).unwrap_or_default();
                    sink.lock().unwrap().push(format!("{name}@{price}"));
                })
                .unwrap();
        }
        registry
            .add_trigger("ticker", "cheap", &TriggerSpec::new().range("price", RangeConstraint::Less(10.0)))
            .unwrap();
        registry.add_trigger("ticker", "any", &TriggerSpec::new()).unwrap();
        registry
            .add_trigger("ticker", "pricey", &TriggerSpec::new().range("price", RangeConstraint::Greater(100.0)))
            .unwrap();
        registry.seal().unwrap();
        assert!(registry.is_sealed());

        let matched = registry
            .run_event("ticker", &Record::new().with("price", 5).with("flags", 1_u64))
            .unwrap();
        assert_eq!(matched, vec!["cheap", "any"]);
        assert_eq!(*calls.lock().unwrap(), vec!["cheap@5".to_string(), "any@5".to_string()]);
    }

    #[test]
    fn missing_handler_prevents_partial_dispatch() {
        let calls = Arc::new(Mutex::new(0_u32));
        let mut registry = TriggerRegistry::new();
        registry.define_event("ticker", &schema()).unwrap();
        let sink = Arc::clone(&calls);
        registry
            .define_handler("first", move |_| *sink.lock().unwrap() += 1)
            .unwrap();
        registry.add_trigger("ticker", "first", &TriggerSpec::new()).unwrap();
        registry.add_trigger("ticker", "orphan", &TriggerSpec::new()).unwrap();
        registry.seal().unwrap();

        let err = registry
            .run_event("ticker", &Record::new().with("price", 1).with("flags", 1_u64))
            .unwrap_err();
        assert_eq!(
            err,
            GateError::Execution(ExecutionError::HandlerNotFound { trigger: "orphan".to_string() })
        );
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn define_event_with_missing_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = TriggerRegistry::new();
        registry
            .define_event_with_handler(
                "ticker",
                &schema(),
                Arc::new(move |attr: &str| sink.lock().unwrap().push(attr.to_string())),
            )
            .unwrap();
        registry.seal().unwrap();
        assert!(registry.run_event("ticker", &Record::new().with("price", 1)).unwrap().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["flags".to_string()]);
    }

    #[test]
    fn seal_skips_sealed_events() {
        let mut registry = TriggerRegistry::new();
        registry.define_event("a", &schema()).unwrap().seal().unwrap();
        registry.define_event("b", &schema()).unwrap();
        assert!(!registry.is_sealed());
        registry.seal().unwrap();
        assert!(registry.is_sealed());
        assert_eq!(registry.event_names(), vec!["a", "b"]);
    }
}
