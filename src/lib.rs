//! # eventgate - content-based trigger matching
//!
//! eventgate decides, for every incoming record, exactly which registered
//! triggers should fire. Each trigger is a conjunction of per-attribute
//! predicates (numeric ranges or bit-set membership); predicates are compiled
//! into row vectors once, so evaluating a record is a handful of element-wise
//! passes rather than a scan over trigger definitions.
//!
//! ## Core Concepts
//!
//! - **Event**: a named schema of filterable attributes and their filter kinds
//! - **Trigger**: an identifier bound to a partial predicate specification
//! - **Attribute filter**: one predicate row per trigger for one attribute
//! - **Seal**: the one-way switch from registration to evaluation
//!
//! ## Usage
//!
//! ```rust
//! use eventgate::{
//!     BitmaskPolicy, EventFilterSet, EventSchema, FilterKind, RangeConstraint, Record, TriggerSpec,
//! };
//!
//! let schema = EventSchema::new()
//!     .attribute("temperature", FilterKind::Range)
//!     .attribute("status", FilterKind::Bitmask(BitmaskPolicy::Strict));
//!
//! let mut sensor = EventFilterSet::new("sensor", &schema)?;
//! sensor.register_trigger(
//!     "T1",
//!     &TriggerSpec::new()
//!         .range("temperature", RangeConstraint::Between(10.0, 20.0))
//!         .bitmask("status", 0b011),
//! )?;
//! sensor.register_trigger("T2", &TriggerSpec::new().range("temperature", RangeConstraint::Greater(25.0)))?;
//! sensor.seal()?;
//!
//! let hit = sensor.evaluate(&Record::new().with("temperature", 15).with("status", 0b111_u64))?;
//! assert_eq!(hit, vec!["T1"]);
//! # Ok::<(), eventgate::GateError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Matching core
pub mod error;
pub mod event;
pub mod filter;
pub mod record;
pub mod schema;
pub mod trigger;
pub mod value;

// Handler binding and concurrent dispatch
pub mod dispatcher;
pub mod registry;

// Re-export primary types at crate root for convenience
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherConfig, MatchReport};
pub use error::{ExecutionError, FilterState, GateError, GateResult, ValidationError};
pub use event::{EventFilterSet, MissingAttributeHandler};
pub use filter::{AttributeFilter, BitmaskFilter, BitmaskPolicy, FilterKind, RangeFilter, UNBOUNDED};
pub use record::Record;
pub use registry::{TriggerHandler, TriggerRegistry};
pub use schema::{AttributeDecl, EventSchema};
pub use trigger::{Constraint, RangeConstraint, RangeKind, TriggerId, TriggerSpec};
pub use value::Value;
