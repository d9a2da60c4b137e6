//! Event schemas: which record attributes an event filters on, and how.

use crate::error::{GateError, GateResult, ValidationError};
use crate::filter::FilterKind;

/// One filterable attribute of an event.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: FilterKind,
}

/// Ordered attribute-name → filter-kind declaration of one event.
///
/// Duplicate names are allowed here and rejected when the schema is turned
/// into an [`EventFilterSet`](crate::EventFilterSet), where the event name is
/// known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSchema {
    attributes: Vec<AttributeDecl>,
}

impl EventSchema {
    #[allow(missing_docs)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, kind: FilterKind) -> Self {
        self.attributes.push(AttributeDecl {
            name: name.into(),
            kind,
        });
        self
    }

    /// Builds a schema from attribute / kind-name pairs.
    ///
    /// Fails with `UnknownFilterKind` on the first kind name that is not
    /// implemented.
    pub fn from_kind_names<I, K, V>(pairs: I) -> GateResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut schema = Self::new();
        for (name, kind) in pairs {
            let kind: FilterKind = kind.as_ref().parse()?;
            schema = schema.attribute(name, kind);
        }
        Ok(schema)
    }

    /// Parses a schema from a JSON object of attribute → kind name.
    ///
    /// Attributes are declared in the order the document lists them.
    pub fn from_json_str(json: &str) -> GateResult<Self> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
        let pairs = raw
            .into_iter()
            .map(|(name, kind)| match kind {
                serde_json::Value::String(kind) => Ok((name, kind)),
                other => Err(malformed(format!("kind of '{name}' must be a string, got {other}"))),
            })
            .collect::<GateResult<Vec<(String, String)>>>()?;
        Self::from_kind_names(pairs)
    }

    /// Declared attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn malformed(reason: String) -> GateError {
    ValidationError::Malformed {
        what: "event schema",
        reason,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BitmaskPolicy;

    #[test]
    fn builds_in_declaration_order() {
        let schema = EventSchema::new()
            .attribute("temperature", FilterKind::Range)
            .attribute("status", FilterKind::Bitmask(BitmaskPolicy::Strict));
        let names: Vec<&str> = schema.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["temperature", "status"]);
    }

    #[test]
    fn parses_json() {
        let schema = EventSchema::from_json_str(r#"{"temperature": "range", "status": "soft"}"#).unwrap();
        assert_eq!(schema.len(), 2);
        let names: Vec<&str> = schema.attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["temperature", "status"]);
        assert_eq!(schema.attributes()[1].kind, FilterKind::Bitmask(BitmaskPolicy::Permissive));
    }

    #[test]
    fn json_keeps_document_order_for_missing_attribute_reports() {
        use std::sync::{Arc, Mutex};

        use crate::event::EventFilterSet;
        use crate::record::Record;

        let schema = EventSchema::from_json_str(r#"{"temperature": "range", "status": "hard"}"#).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut set = EventFilterSet::new("sensor", &schema)
            .unwrap()
            .with_missing_attribute_handler(move |attr| sink.lock().unwrap().push(attr.to_string()));
        set.seal().unwrap();

        assert!(set.evaluate(&Record::new()).unwrap().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["temperature".to_string()]);
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let err = EventSchema::from_json_str(r#"{"price": "fuzzy"}"#).unwrap_err();
        assert_eq!(
            err,
            GateError::Validation(ValidationError::UnknownFilterKind { kind: "fuzzy".to_string() })
        );
    }

    #[test]
    fn malformed_json() {
        let err = EventSchema::from_json_str(r#"{"price": 3}"#).unwrap_err();
        assert!(matches!(err, GateError::Validation(ValidationError::Malformed { .. })));
    }
}
