//! Payload types and serialization.

use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Event or profile properties.
pub type Properties = Map<String, Value>;

/// Get current Unix time in whole seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Remote endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Track,
    Engage,
}

impl Endpoint {
    /// Request path for this endpoint.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Track => "/track",
            Endpoint::Engage => "/engage",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Payload sent to `/track`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub event: String,
    pub properties: Properties,
}

/// Sticky identity applied to every tracked event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub distinct_id: Option<String>,
    pub name_tag: Option<String>,
}

/// Insert `value` under `key` unless the caller already supplied a non-null value.
pub(crate) fn insert_missing(properties: &mut Properties, key: &str, value: impl Into<Value>) {
    match properties.get(key) {
        Some(existing) if !existing.is_null() => {}
        _ => {
            properties.insert(key.to_string(), value.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_payload_structure() {
        let payload = EventPayload {
            event: "signup".into(),
            properties: Map::from_iter([("plan".to_string(), json!("pro"))]),
        };

        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json, json!({ "event": "signup", "properties": { "plan": "pro" } }));
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::Track.path(), "/track");
        assert_eq!(Endpoint::Engage.path(), "/engage");
        assert_eq!(Endpoint::Engage.to_string(), "/engage");
    }

    #[test]
    fn test_insert_missing_keeps_caller_value() {
        let mut props = Map::from_iter([("time".to_string(), json!(42))]);
        insert_missing(&mut props, "time", 100);
        insert_missing(&mut props, "token", "tok");

        assert_eq!(props["time"], 42);
        assert_eq!(props["token"], "tok");
    }

    #[test]
    fn test_insert_missing_replaces_null() {
        let mut props = Map::from_iter([("token".to_string(), Value::Null)]);
        insert_missing(&mut props, "token", "tok");

        assert_eq!(props["token"], "tok");
    }

    #[test]
    fn test_now_secs_is_seconds() {
        // Milliseconds would be thirteen digits for the foreseeable future.
        assert_eq!(now_secs().to_string().len(), 10);
    }
}
