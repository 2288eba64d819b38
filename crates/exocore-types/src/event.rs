//! Chain event model and attribute extraction.
//!
//! Every begin-block, end-block and transaction result carries a flat list of
//! [`Event`]s. Projectors filter the list by event type with
//! [`find_events_by_type`] and pull named attributes with
//! [`Event::attribute`]. A missing attribute is always an error: the chain
//! emits a fixed schema per event type, so an absent key means the indexer
//! and the chain disagree and nothing downstream can be trusted.

use serde::{Deserialize, Serialize};

use crate::numeric::{Dec, Int};

/// Errors raised while reading event attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A required attribute key is absent from the event.
    #[error("event {event_type:?} has no attribute {key:?}")]
    MissingAttribute {
        /// The type of the event that was inspected.
        event_type: String,
        /// The attribute key that was requested.
        key: String,
    },

    /// An attribute is present but its value cannot be parsed.
    #[error("event {event_type:?} attribute {key:?} has invalid value {value:?}: {reason}")]
    InvalidAttribute {
        /// The type of the event that was inspected.
        event_type: String,
        /// The attribute key.
        key: String,
        /// The raw attribute value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A single key/value pair attached to an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value. Always a string on the wire.
    #[serde(default)]
    pub value: String,
}

/// An ABCI event emitted by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The event type, e.g. `undelegation_started`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered attributes.
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    /// Build an event from a type and `(key, value)` pairs.
    pub fn new<K, V>(kind: &str, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            kind: kind.to_owned(),
            attributes: attributes
                .into_iter()
                .map(|(key, value)| EventAttribute {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Return the value of the first attribute with the given key.
    pub fn attribute(&self, key: &str) -> Result<&str, EventError> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
            .ok_or_else(|| EventError::MissingAttribute {
                event_type: self.kind.clone(),
                key: key.to_owned(),
            })
    }

    /// Return the value of the first attribute regardless of its key.
    ///
    /// Used for single-attribute events whose key is not stable across
    /// chain versions.
    pub fn first_attribute(&self) -> Result<&str, EventError> {
        self.attributes
            .first()
            .map(|attr| attr.value.as_str())
            .ok_or_else(|| EventError::MissingAttribute {
                event_type: self.kind.clone(),
                key: String::from("<first>"),
            })
    }

    /// Read an attribute as an [`Int`].
    pub fn int(&self, key: &str) -> Result<Int, EventError> {
        let raw = self.attribute(key)?;
        Int::parse(raw).map_err(|e| self.invalid(key, raw, &e.to_string()))
    }

    /// Read an attribute as a [`Dec`].
    pub fn dec(&self, key: &str) -> Result<Dec, EventError> {
        let raw = self.attribute(key)?;
        Dec::parse(raw).map_err(|e| self.invalid(key, raw, &e.to_string()))
    }

    /// Read an attribute as an `i64`.
    pub fn i64(&self, key: &str) -> Result<i64, EventError> {
        let raw = self.attribute(key)?;
        raw.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| self.invalid(key, raw, &e.to_string()))
    }

    /// Read an attribute as a `u64`.
    pub fn u64(&self, key: &str) -> Result<u64, EventError> {
        let raw = self.attribute(key)?;
        raw.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| self.invalid(key, raw, &e.to_string()))
    }

    /// Read an attribute as a `u32`.
    pub fn u32(&self, key: &str) -> Result<u32, EventError> {
        let raw = self.attribute(key)?;
        raw.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| self.invalid(key, raw, &e.to_string()))
    }

    /// Read an attribute as a boolean. Only the literal `"true"` is true.
    pub fn flag(&self, key: &str) -> Result<bool, EventError> {
        self.attribute(key).map(|raw| raw == "true")
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> EventError {
        EventError::InvalidAttribute {
            event_type: self.kind.clone(),
            key: key.to_owned(),
            value: value.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

/// Return the events of the given type, in their original order.
///
/// An empty result is not an error.
pub fn find_events_by_type<'a>(events: &'a [Event], kind: &str) -> Vec<&'a Event> {
    events.iter().filter(|event| event.kind == kind).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample() -> Vec<Event> {
        vec![
            Event::new("a", [("k", "1")]),
            Event::new("b", [("k", "2")]),
            Event::new("a", [("k", "3"), ("flag", "true")]),
        ]
    }

    #[test]
    fn filters_in_order() {
        let events = sample();
        let found = find_events_by_type(&events, "a");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].attribute("k").unwrap(), "1");
        assert_eq!(found[1].attribute("k").unwrap(), "3");
        assert!(find_events_by_type(&events, "missing").is_empty());
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let events = sample();
        let err = events[0].attribute("nope").unwrap_err();
        assert_eq!(
            err,
            EventError::MissingAttribute {
                event_type: String::from("a"),
                key: String::from("nope"),
            }
        );
    }

    #[test]
    fn typed_reads() {
        let events = sample();
        assert_eq!(events[2].int("k").unwrap(), Int::from(3_u64));
        assert!(events[2].flag("flag").unwrap());
        assert!(!events[0].flag("k").unwrap());
        assert_eq!(events[1].first_attribute().unwrap(), "2");

        let bad = Event::new("x", [("n", "abc")]);
        assert!(matches!(
            bad.int("n"),
            Err(EventError::InvalidAttribute { .. })
        ));
        assert!(matches!(bad.i64("n"), Err(EventError::InvalidAttribute { .. })));
    }

    #[test]
    fn deserializes_wire_shape() {
        let json = r#"{"type":"mint","attributes":[{"key":"amount","value":"5"}]}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "mint");
        assert_eq!(event.int("amount").unwrap(), Int::from(5_u64));
    }
}
