//! Wire format of the backend's HTTP/JSON gateway.
//!
//! The gateway renders history in proto3 JSON: camelCase keys, 64-bit integers
//! as strings, enums by name, and the attributes oneof as one
//! `<variant>EventAttributes` field. These types translate that into
//! [`HistoryEvent`]'s schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de};
use serde_json::{Map, Value};

use crate::history::{ContinuationToken, EventAttributes, HistoryEvent, HistoryPage};

/// Event type names, indexed by their numeric value.
const EVENT_TYPE_NAMES: &[&str] = &[
    "EVENT_TYPE_UNSPECIFIED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_STARTED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_COMPLETED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_FAILED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_TIMED_OUT",
    "EVENT_TYPE_WORKFLOW_TASK_SCHEDULED",
    "EVENT_TYPE_WORKFLOW_TASK_STARTED",
    "EVENT_TYPE_WORKFLOW_TASK_COMPLETED",
    "EVENT_TYPE_WORKFLOW_TASK_TIMED_OUT",
    "EVENT_TYPE_WORKFLOW_TASK_FAILED",
    "EVENT_TYPE_ACTIVITY_TASK_SCHEDULED",
    "EVENT_TYPE_ACTIVITY_TASK_STARTED",
    "EVENT_TYPE_ACTIVITY_TASK_COMPLETED",
    "EVENT_TYPE_ACTIVITY_TASK_FAILED",
    "EVENT_TYPE_ACTIVITY_TASK_TIMED_OUT",
    "EVENT_TYPE_ACTIVITY_TASK_CANCEL_REQUESTED",
    "EVENT_TYPE_ACTIVITY_TASK_CANCELED",
    "EVENT_TYPE_TIMER_STARTED",
    "EVENT_TYPE_TIMER_FIRED",
    "EVENT_TYPE_TIMER_CANCELED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_CANCEL_REQUESTED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_CANCELED",
    "EVENT_TYPE_REQUEST_CANCEL_EXTERNAL_WORKFLOW_EXECUTION_INITIATED",
    "EVENT_TYPE_REQUEST_CANCEL_EXTERNAL_WORKFLOW_EXECUTION_FAILED",
    "EVENT_TYPE_EXTERNAL_WORKFLOW_EXECUTION_CANCEL_REQUESTED",
    "EVENT_TYPE_MARKER_RECORDED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_SIGNALED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_TERMINATED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_CONTINUED_AS_NEW",
    "EVENT_TYPE_START_CHILD_WORKFLOW_EXECUTION_INITIATED",
    "EVENT_TYPE_START_CHILD_WORKFLOW_EXECUTION_FAILED",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_STARTED",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_COMPLETED",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_FAILED",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_CANCELED",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_TIMED_OUT",
    "EVENT_TYPE_CHILD_WORKFLOW_EXECUTION_TERMINATED",
    "EVENT_TYPE_SIGNAL_EXTERNAL_WORKFLOW_EXECUTION_INITIATED",
    "EVENT_TYPE_SIGNAL_EXTERNAL_WORKFLOW_EXECUTION_FAILED",
    "EVENT_TYPE_EXTERNAL_WORKFLOW_EXECUTION_SIGNALED",
    "EVENT_TYPE_UPSERT_WORKFLOW_SEARCH_ATTRIBUTES",
    "EVENT_TYPE_WORKFLOW_EXECUTION_UPDATE_ACCEPTED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_UPDATE_REJECTED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_UPDATE_COMPLETED",
    "EVENT_TYPE_WORKFLOW_PROPERTIES_MODIFIED_EXTERNALLY",
    "EVENT_TYPE_ACTIVITY_PROPERTIES_MODIFIED_EXTERNALLY",
    "EVENT_TYPE_WORKFLOW_PROPERTIES_MODIFIED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_UPDATE_ADMITTED",
    "EVENT_TYPE_NEXUS_OPERATION_SCHEDULED",
    "EVENT_TYPE_NEXUS_OPERATION_STARTED",
    "EVENT_TYPE_NEXUS_OPERATION_COMPLETED",
    "EVENT_TYPE_NEXUS_OPERATION_FAILED",
    "EVENT_TYPE_NEXUS_OPERATION_CANCELED",
    "EVENT_TYPE_NEXUS_OPERATION_TIMED_OUT",
    "EVENT_TYPE_NEXUS_OPERATION_CANCEL_REQUESTED",
    "EVENT_TYPE_WORKFLOW_EXECUTION_OPTIONS_UPDATED",
    "EVENT_TYPE_NEXUS_OPERATION_CANCEL_REQUEST_COMPLETED",
    "EVENT_TYPE_NEXUS_OPERATION_CANCEL_REQUEST_FAILED",
];

const ATTRIBUTES_SUFFIX: &str = "EventAttributes";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireHistoryResponse {
    #[serde(default)]
    history: Option<WireHistory>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireHistory {
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default, deserialize_with = "int64")]
    event_id: i64,
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "event_type")]
    event_type: i32,
    #[serde(default, deserialize_with = "int64")]
    version: i64,
    #[serde(default, deserialize_with = "int64")]
    task_id: i64,
    #[serde(default)]
    worker_may_ignore: bool,
    #[serde(default)]
    user_metadata: Option<Value>,
    #[serde(default)]
    links: Vec<Value>,
    /// Everything else, including the attributes oneof.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl WireHistoryResponse {
    pub(crate) fn into_page(self) -> HistoryPage {
        let events = self
            .history
            .unwrap_or_default()
            .events
            .into_iter()
            .map(WireEvent::into_event)
            .collect();

        // Kept verbatim; the gateway expects the same string back.
        let next_page_token = self
            .next_page_token
            .map(|t| ContinuationToken::new(t.into_bytes()))
            .unwrap_or_default();

        HistoryPage {
            events,
            next_page_token,
        }
    }
}

impl WireEvent {
    fn into_event(self) -> HistoryEvent {
        let attributes = self.rest.into_iter().find_map(|(key, value)| {
            if !key.ends_with(ATTRIBUTES_SUFFIX) || value.is_null() {
                return None;
            }
            Some(EventAttributes::new(upper_first(&key), value))
        });

        HistoryEvent {
            event_id: self.event_id,
            event_time: self.event_time,
            event_type: self.event_type,
            version: self.version,
            task_id: self.task_id,
            worker_may_ignore: self.worker_may_ignore,
            user_metadata: self.user_metadata,
            links: self.links,
            attributes,
        }
    }
}

/// Error body returned by the gateway on non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireStatus {
    #[serde(default)]
    pub(crate) message: String,
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid int64 {s:?}"))),
    }
}

fn event_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => {
            i32::try_from(n).map_err(|_| de::Error::custom(format!("invalid event type {n}")))
        }
        NumberOrString::String(name) => Ok(event_type_from_name(&name)),
    }
}

/// Unknown names (event types newer than this table) map to unspecified.
fn event_type_from_name(name: &str) -> i32 {
    match EVENT_TYPE_NAMES.iter().position(|known| *known == name) {
        Some(i) => i as i32,
        None => {
            tracing::warn!(
                event_type = name,
                "unknown history event type, passing as unspecified"
            );
            0
        }
    }
}
