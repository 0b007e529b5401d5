//! Core types, wire protocol, document access and session model for Live View.

pub mod announcer;
pub mod applier;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod dom;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod session;

pub use document::Document;
pub use dom::HtmlDocument;
pub use error::{LiveViewError, Result};
pub use protocol::{ClientMessage, RenderUpdate};
pub use session::{LiveViewSession, SessionState};
