//! Core history data types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// The (namespace, workflow id, run id) triple naming one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkflowIdentity {
    namespace: String,
    workflow_id: String,
    run_id: String,
}

impl WorkflowIdentity {
    pub fn new(
        namespace: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Decoded workflow id.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Opaque pagination cursor handed out by the backend.
///
/// The only thing callers may ask is whether it is empty; an empty token
/// requests the first page, and an empty token in a response means the
/// history is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuationToken(Bytes);

impl ContinuationToken {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One record in a workflow execution's history.
///
/// Serialized in the backend's event schema: scalar fields are omitted when
/// zero, `Attributes` is always present and is `null` when no attributes
/// variant is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub event_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub event_type: i32,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub version: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub task_id: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub worker_may_ignore: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<serde_json::Value>,
    #[serde(rename = "Attributes", default)]
    pub attributes: Option<EventAttributes>,
}

impl HistoryEvent {
    /// Event with just an id and a type, no attributes.
    pub fn new(event_id: i64, event_type: i32) -> Self {
        Self {
            event_id,
            event_type,
            ..Default::default()
        }
    }

    pub fn with_attributes(mut self, attributes: EventAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

/// The populated variant of an event's attributes oneof.
///
/// Serialized as a single-key object, e.g.
/// `{"WorkflowExecutionStartedEventAttributes": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventAttributes {
    /// Variant name, e.g. `WorkflowExecutionStartedEventAttributes`.
    pub kind: String,
    /// Variant payload, passed through untouched.
    pub fields: serde_json::Value,
}

impl EventAttributes {
    pub fn new(kind: impl Into<String>, fields: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }
}

impl Serialize for EventAttributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.kind, &self.fields)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for EventAttributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = EventAttributes;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an object with exactly one attributes variant")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let Some((kind, fields)) = map.next_entry::<String, serde_json::Value>()? else {
                    return Err(de::Error::custom("attributes object is empty"));
                };
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom(
                        "attributes object has more than one variant",
                    ));
                }
                Ok(EventAttributes { kind, fields })
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

/// One page of history as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    pub events: Vec<HistoryEvent>,
    pub next_page_token: ContinuationToken,
}

impl HistoryPage {
    /// Final page: no further token.
    pub fn last(events: Vec<HistoryEvent>) -> Self {
        Self {
            events,
            next_page_token: ContinuationToken::empty(),
        }
    }

    /// Page followed by more pages.
    pub fn with_next(events: Vec<HistoryEvent>, next_page_token: ContinuationToken) -> Self {
        Self {
            events,
            next_page_token,
        }
    }
}

/// Parameters for one backend fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPageRequest {
    pub identity: WorkflowIdentity,
    /// Empty for the first page.
    pub next_page_token: ContinuationToken,
    /// Upper bound on events per page; `None` leaves it to the backend.
    pub maximum_page_size: Option<u32>,
}
