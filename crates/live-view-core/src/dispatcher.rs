//! Click dispatch.

use crate::document::Document;
use crate::protocol::ClientMessage;

/// Translate a click on `target` into an event message.
///
/// Only the target element itself is inspected. A missing or empty trigger
/// attribute produces nothing.
pub fn dispatch<D: Document>(doc: &D, target: &D::Element, trigger_attr: &str) -> Option<ClientMessage> {
    doc.attribute(target, trigger_attr)
        .filter(|name| !name.is_empty())
        .map(ClientMessage::Event)
}
