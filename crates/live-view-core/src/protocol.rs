//! Live view wire protocol.
//!
//! Every frame is a single JSON object. The client sends one of two shapes:
//!
//! - `{"subscribe": "<identifier>"}` declares interest in a view identifier.
//! - `{"event": "<trigger-name>"}` reports that a named interaction occurred.
//!
//! The server pushes render updates of the shape
//! `{"id": "<identifier>", "render": "<markup-fragment>"}`.

use serde::{Deserialize, Serialize};

/// Attribute declaring that an element tracks a view identifier.
pub const REGION_ATTRIBUTE: &str = "data-live-view";

/// Attribute declaring that clicks on an element report a named event.
pub const TRIGGER_ATTRIBUTE: &str = "live-click";

/// A client -> server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMessage {
    /// Declare interest in a view identifier.
    Subscribe(String),
    /// Report that the named interaction occurred. Carries no context.
    Event(String),
}

impl ClientMessage {
    pub fn subscribe(id: impl Into<String>) -> Self {
        Self::Subscribe(id.into())
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self::Event(name.into())
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn from_json(s: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// A server -> client render update.
///
/// `render` is markup, not text: it replaces the whole content of every
/// region whose identifier equals `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderUpdate {
    pub id: String,
    pub render: String,
}

impl RenderUpdate {
    pub fn new(id: impl Into<String>, render: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            render: render.into(),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_wire_shape() {
        let json = ClientMessage::subscribe("clock").to_json().unwrap();
        assert_eq!(json, r#"{"subscribe":"clock"}"#);
    }

    #[test]
    fn test_event_wire_shape() {
        let json = ClientMessage::event("ping").to_json().unwrap();
        assert_eq!(json, r#"{"event":"ping"}"#);
    }

    #[test]
    fn test_client_message_parse() {
        let msg = ClientMessage::from_json(r#"{"event":"increment"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Event("increment".into()));
    }

    #[test]
    fn test_render_update_parse() {
        let update = RenderUpdate::from_json(r#"{"id":"clock","render":"<b>12:00</b>"}"#).unwrap();
        assert_eq!(update.id, "clock");
        assert_eq!(update.render, "<b>12:00</b>");
    }

    #[test]
    fn test_render_update_ignores_extra_fields() {
        let update =
            RenderUpdate::from_json(r#"{"id":"a","render":"x","seq":4}"#).unwrap();
        assert_eq!(update, RenderUpdate::new("a", "x"));
    }

    #[test]
    fn test_render_update_missing_render_is_error() {
        assert!(RenderUpdate::from_json(r#"{"id":"a"}"#).is_err());
    }

    #[test]
    fn test_render_update_non_string_is_error() {
        assert!(RenderUpdate::from_json(r#"{"id":1,"render":"x"}"#).is_err());
        assert!(RenderUpdate::from_json("not json").is_err());
    }
}
