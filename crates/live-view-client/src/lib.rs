//! Live view client runtime.
//!
//! Opens one WebSocket connection per page, announces the page's regions,
//! applies server-pushed renders and forwards clicks upstream. All protocol
//! work for a page runs on a single task.

pub mod connection;
pub mod transport;

pub use connection::{ClientEvent, ClientHandle, LiveViewClient, RunningClient};
pub use transport::{Transport, WebSocketTransport};
