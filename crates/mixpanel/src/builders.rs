//! Payload builders for fluent API.

use crate::types::{insert_missing, now_secs, EventPayload, Identity, Properties};
use serde_json::Value;

/// Event name used by funnel steps.
pub const FUNNEL_EVENT: &str = "mp_funnel";

// ============================================
// TRACK BUILDER
// ============================================

/// Builder for track events.
#[derive(Debug, Clone)]
pub struct TrackBuilder {
    event_name: String,
    properties: Properties,
    // Applied after caller properties so they always win.
    overrides: Properties,
}

impl TrackBuilder {
    pub(crate) fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            properties: Properties::new(),
            overrides: Properties::new(),
        }
    }

    /// Start from an existing property map.
    pub(crate) fn with_properties(event_name: impl Into<String>, properties: Properties) -> Self {
        Self {
            properties,
            ..Self::new(event_name)
        }
    }

    /// Funnel step: `funnel`, `step` and `goal` overwrite caller values.
    pub(crate) fn funnel(funnel: impl Into<String>, step: u32, goal: impl Into<String>) -> Self {
        let mut builder = Self::new(FUNNEL_EVENT);
        builder
            .overrides
            .insert("funnel".into(), Value::String(funnel.into()));
        builder.overrides.insert("step".into(), Value::from(step));
        builder
            .overrides
            .insert("goal".into(), Value::String(goal.into()));
        builder
    }

    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge a whole property map; later keys replace earlier ones.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Build the event for the given token and identity.
    pub(crate) fn build(self, token: &str, identity: &Identity) -> EventPayload {
        let mut properties = self.properties;
        properties.extend(self.overrides);

        insert_missing(&mut properties, "token", token);
        insert_missing(&mut properties, "time", now_secs());

        if let Some(distinct_id) = &identity.distinct_id {
            properties.insert("distinct_id".into(), Value::String(distinct_id.clone()));
        }
        if let Some(name_tag) = &identity.name_tag {
            properties.insert("mp_name_tag".into(), Value::String(name_tag.clone()));
        }

        EventPayload {
            event: self.event_name,
            properties,
        }
    }
}

// ============================================
// ENGAGE BUILDER
// ============================================

/// Builder for profile updates.
#[derive(Debug, Clone, Default)]
pub struct EngageBuilder {
    properties: Properties,
}

impl EngageBuilder {
    pub(crate) fn new(properties: Properties) -> Self {
        Self { properties }
    }

    /// Add a property, e.g. `$distinct_id` or `$set`.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Merge a whole property map.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Build the flat engage payload.
    pub(crate) fn build(self, token: &str) -> Properties {
        let mut properties = self.properties;
        insert_missing(&mut properties, "$token", token);
        properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn anonymous() -> Identity {
        Identity::default()
    }

    #[test]
    fn test_track_fills_token_and_time() {
        let before = now_secs();
        let payload = TrackBuilder::new("signup").build("tok", &anonymous());

        assert_eq!(payload.event, "signup");
        assert_eq!(payload.properties["token"], "tok");
        let time = payload.properties["time"].as_i64().unwrap();
        assert!(time >= before && time - before < 5);
    }

    #[test]
    fn test_track_preserves_caller_token_and_time() {
        let payload = TrackBuilder::new("signup")
            .property("token", "other")
            .property("time", 1_300_000_000)
            .build("tok", &anonymous());

        assert_eq!(payload.properties["token"], "other");
        assert_eq!(payload.properties["time"], 1_300_000_000);
    }

    #[test]
    fn test_identity_overrides_caller_distinct_id() {
        let identity = Identity {
            distinct_id: Some("u1".into()),
            name_tag: Some("Bob".into()),
        };

        let payload = TrackBuilder::new("click")
            .property("distinct_id", "someone-else")
            .build("tok", &identity);

        assert_eq!(payload.properties["distinct_id"], "u1");
        assert_eq!(payload.properties["mp_name_tag"], "Bob");
    }

    #[test]
    fn test_caller_distinct_id_kept_without_identity() {
        let payload = TrackBuilder::new("click")
            .property("distinct_id", "caller")
            .build("tok", &anonymous());

        assert_eq!(payload.properties["distinct_id"], "caller");
        assert!(payload.properties.get("mp_name_tag").is_none());
    }

    #[test]
    fn test_funnel_overrides_caller_values() {
        let payload = TrackBuilder::funnel("signup", 2, "confirmed")
            .property("step", 9)
            .property("source", "ad")
            .build("tok", &anonymous());

        assert_eq!(payload.event, FUNNEL_EVENT);
        assert_eq!(payload.properties["funnel"], "signup");
        assert_eq!(payload.properties["step"], 2);
        assert_eq!(payload.properties["goal"], "confirmed");
        assert_eq!(payload.properties["source"], "ad");
    }

    #[test]
    fn test_with_properties_keeps_map() {
        let props = Properties::from_iter([("plan".to_string(), json!("pro"))]);
        let payload = TrackBuilder::with_properties("upgrade", props).build("tok", &anonymous());

        assert_eq!(payload.properties["plan"], "pro");
    }

    #[test]
    fn test_engage_empty_has_only_token() {
        let payload = EngageBuilder::default().build("tok");

        assert_eq!(json!(payload), json!({ "$token": "tok" }));
    }

    #[test]
    fn test_engage_keeps_caller_token() {
        let payload = EngageBuilder::default()
            .property("$token", "mine")
            .property("$distinct_id", "u1")
            .build("tok");

        assert_eq!(payload["$token"], "mine");
        assert_eq!(payload["$distinct_id"], "u1");
        assert!(payload.get("time").is_none());
    }
}
