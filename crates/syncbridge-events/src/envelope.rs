//! Inbound change-event envelope.
//!
//! Messages arrive as
//! `{ eventType, occurredAt?, additionalInformation, personReference? }` and are
//! narrowed into an immutable [`ChangeEvent`] naming one entity and one action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EventError, EventResult};

/// Identifier of a person attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonIdentifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub value: String,
}

/// Person the event relates to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonReference {
    #[serde(default)]
    pub identifiers: Vec<PersonIdentifier>,
}

impl PersonReference {
    /// Value of the first identifier of the given type.
    #[must_use]
    pub fn identifier(&self, id_type: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.id_type == id_type)
            .map(|i| i.value.as_str())
    }
}

/// Wire envelope as published by the source system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additional_information: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_reference: Option<PersonReference>,
}

impl EventEnvelope {
    /// Parse an envelope from a raw message body.
    pub fn from_slice(body: &[u8]) -> EventResult<Self> {
        let envelope: Self = serde_json::from_slice(body)?;
        if envelope.event_type.trim().is_empty() {
            return Err(EventError::InvalidEnvelope {
                reason: "eventType is empty".to_string(),
            });
        }
        Ok(envelope)
    }

    /// An `additionalInformation` entry rendered as a string.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.additional_information.get(name).and_then(stringify)
    }

    /// Narrow the envelope into a change event.
    ///
    /// `source_id_attribute` names the `additionalInformation` entry holding the
    /// entity's source identifier. Person identifiers are folded into the
    /// attributes under their type unless that key is already taken.
    pub fn into_change_event(self, source_id_attribute: &str) -> EventResult<ChangeEvent> {
        let source_entity_id =
            self.attribute(source_id_attribute)
                .ok_or_else(|| EventError::MissingAttribute {
                    event_type: self.event_type.clone(),
                    attribute: source_id_attribute.to_string(),
                })?;

        let mut attributes: BTreeMap<String, String> = self
            .additional_information
            .iter()
            .filter_map(|(k, v)| stringify(v).map(|s| (k.clone(), s)))
            .collect();

        if let Some(person) = &self.person_reference {
            for identifier in &person.identifiers {
                attributes
                    .entry(identifier.id_type.clone())
                    .or_insert_with(|| identifier.value.clone());
            }
        }

        Ok(ChangeEvent {
            event_type: self.event_type,
            source_entity_id,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            attributes,
        })
    }
}

fn stringify(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One lifecycle change of one entity instance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    event_type: String,
    source_entity_id: String,
    occurred_at: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

impl ChangeEvent {
    /// Build an event directly (tests and replays).
    pub fn new(event_type: impl Into<String>, source_entity_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_id: source_entity_id.into(),
            occurred_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    #[must_use]
    pub fn source_entity_id(&self) -> &str {
        &self.source_entity_id
    }

    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
