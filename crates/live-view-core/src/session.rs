//! Live view session state machine.
//!
//! A session owns the document it keeps in sync and moves along a single
//! forward path: `Disconnected -> Open -> Closed`. Transition methods return
//! the frames to send instead of sending them, so whatever drives the
//! connection decides how they reach the wire. Outbound frames are only ever
//! produced while `Open`.

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::announcer::announce;
use crate::applier::apply;
use crate::config::ProtocolConfig;
use crate::dispatcher::dispatch;
use crate::document::Document;
use crate::error::Result;
use crate::protocol::{ClientMessage, RenderUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Open,
    Closed,
}

pub struct LiveViewSession<D: Document> {
    session_id: String,
    state: SessionState,
    document: D,
    protocol: ProtocolConfig,
}

impl<D: Document> LiveViewSession<D> {
    pub fn new(document: D, protocol: ProtocolConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            state: SessionState::Disconnected,
            document,
            protocol,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    /// Connection opened. Announces every region exactly once.
    pub fn open(&mut self) -> Vec<ClientMessage> {
        if self.state != SessionState::Disconnected {
            debug!(session_id = %self.session_id, state = ?self.state, "Ignoring repeated open");
            return Vec::new();
        }
        self.state = SessionState::Open;

        let subscriptions = announce(&self.document, &self.protocol.region_attribute);
        info!(
            session_id = %self.session_id,
            subscriptions = subscriptions.len(),
            "Live view open"
        );
        subscriptions
    }

    /// Scan the document again, e.g. after the page inserted new regions.
    pub fn rediscover(&mut self) -> Vec<ClientMessage> {
        if self.state != SessionState::Open {
            return Vec::new();
        }
        let subscriptions = announce(&self.document, &self.protocol.region_attribute);
        debug!(
            session_id = %self.session_id,
            subscriptions = subscriptions.len(),
            "Rediscovered regions"
        );
        subscriptions
    }

    /// Handle an inbound text frame. Returns the number of regions replaced.
    ///
    /// A frame that does not parse as a render update is an error for that
    /// frame only; the session stays open.
    pub fn receive(&mut self, text: &str) -> Result<usize> {
        if self.state != SessionState::Open {
            trace!(session_id = %self.session_id, state = ?self.state, "Frame outside open state");
            return Ok(0);
        }
        let update = RenderUpdate::from_json(text)?;
        self.render(&update)
    }

    /// Apply an already-parsed render update.
    pub fn render(&mut self, update: &RenderUpdate) -> Result<usize> {
        if self.state != SessionState::Open {
            return Ok(0);
        }
        let regions = apply(&mut self.document, update, &self.protocol.region_attribute)?;
        trace!(session_id = %self.session_id, id = %update.id, regions, "Render applied");
        Ok(regions)
    }

    /// A click landed on `target`.
    pub fn click(&self, target: &D::Element) -> Option<ClientMessage> {
        if self.state != SessionState::Open {
            return None;
        }
        dispatch(&self.document, target, &self.protocol.trigger_attribute)
    }

    /// Connection closed. Terminal.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        info!(session_id = %self.session_id, "Live view closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HtmlDocument;
    use crate::error::LiveViewError;

    const PAGE: &str = concat!(
        r#"<div id="c1" data-live-view="clock">--</div>"#,
        r#"<div id="c2" data-live-view="clock">--</div>"#,
        r#"<button id="ping" live-click="ping">Ping</button>"#,
    );

    fn session() -> LiveViewSession<HtmlDocument> {
        LiveViewSession::new(HtmlDocument::parse(PAGE).unwrap(), ProtocolConfig::default())
    }

    fn content(session: &LiveViewSession<HtmlDocument>, id: &str) -> String {
        let doc = session.document();
        doc.content(&doc.element_by_id(id).unwrap())
    }

    #[test]
    fn test_open_announces_once() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Disconnected);

        let subs = session.open();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            subs,
            vec![ClientMessage::subscribe("clock"), ClientMessage::subscribe("clock")]
        );

        assert!(session.open().is_empty());
    }

    #[test]
    fn test_click_before_open_is_dropped() {
        let session = session();
        let ping = session.document().element_by_id("ping").unwrap();
        assert_eq!(session.click(&ping), None);
    }

    #[test]
    fn test_click_while_open() {
        let mut session = session();
        session.open();
        let ping = session.document().element_by_id("ping").unwrap();
        assert_eq!(session.click(&ping), Some(ClientMessage::event("ping")));
    }

    #[test]
    fn test_receive_updates_all_regions() {
        let mut session = session();
        session.open();

        let n = session.receive(r#"{"id":"clock","render":"12:00"}"#).unwrap();
        assert_eq!(n, 2);
        assert_eq!(content(&session, "c1"), "12:00");
        assert_eq!(content(&session, "c2"), "12:00");
    }

    #[test]
    fn test_malformed_frame_keeps_session_open() {
        let mut session = session();
        session.open();

        let err = session.receive("{oops").unwrap_err();
        assert!(matches!(err, LiveViewError::Malformed(_)));
        assert_eq!(session.state(), SessionState::Open);

        assert_eq!(session.receive(r#"{"id":"clock","render":"ok"}"#).unwrap(), 2);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut session = session();
        session.open();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        assert!(session.open().is_empty());
        assert!(session.rediscover().is_empty());
        assert_eq!(session.receive(r#"{"id":"clock","render":"late"}"#).unwrap(), 0);
        assert_eq!(content(&session, "c1"), "--");

        let ping = session.document().element_by_id("ping").unwrap();
        assert_eq!(session.click(&ping), None);
    }

    #[test]
    fn test_rediscover_picks_up_new_regions() {
        let mut session = session();
        session.open();
        session
            .receive(r#"{"id":"clock","render":"<span data-live-view=\"tick\">0</span>"}"#)
            .unwrap();

        let subs = session.rediscover();
        assert_eq!(
            subs,
            vec![
                ClientMessage::subscribe("clock"),
                ClientMessage::subscribe("tick"),
                ClientMessage::subscribe("clock"),
                ClientMessage::subscribe("tick"),
            ]
        );
    }
}
