//! Connection lifecycle: open, announce, read loop, close.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use live_view_core::config::ProtocolConfig;
use live_view_core::document::Document;
use live_view_core::endpoint::derive_endpoint_str;
use live_view_core::error::{LiveViewError, Result};
use live_view_core::protocol::{ClientMessage, RenderUpdate};
use live_view_core::session::LiveViewSession;

use crate::transport::{Transport, WebSocketTransport};

/// Lifecycle notifications emitted by a running client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connection open and `subscriptions` regions announced.
    Opened { subscriptions: usize },
    /// A render update for `id` replaced `regions` regions (possibly zero).
    Rendered { id: String, regions: usize },
    /// An inbound frame could not be applied. The connection stays up.
    Malformed { error: String },
    /// A frame went out on the wire.
    Sent(ClientMessage),
    /// Connection closed. Nothing follows this event.
    Closed { reason: String },
}

type Lookup<D> = Box<dyn FnOnce(&D) -> Option<<D as Document>::Element> + Send>;
type Inspect<D> = Box<dyn FnOnce(&D) + Send>;

enum Command<D: Document> {
    Click(D::Element),
    ClickBy(Lookup<D>),
    Inspect(Inspect<D>),
    Rediscover,
    Shutdown,
}

/// Handle for feeding page interactions into a running client.
pub struct ClientHandle<D: Document> {
    commands: mpsc::UnboundedSender<Command<D>>,
}

impl<D: Document> Clone for ClientHandle<D> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<D: Document> ClientHandle<D> {
    /// Report a click on `target`. Returns false once the client has stopped.
    pub fn click(&self, target: D::Element) -> bool {
        self.commands.send(Command::Click(target)).is_ok()
    }

    /// Report a click on the element `find` picks from the live document.
    ///
    /// Lets callers target elements that arrived in a render after load.
    pub fn click_by<F>(&self, find: F) -> bool
    where
        F: FnOnce(&D) -> Option<D::Element> + Send + 'static,
    {
        self.commands.send(Command::ClickBy(Box::new(find))).is_ok()
    }

    /// Run `f` against the live document between frames.
    pub fn with_document<F>(&self, f: F) -> bool
    where
        F: FnOnce(&D) + Send + 'static,
    {
        self.commands.send(Command::Inspect(Box::new(f))).is_ok()
    }

    /// Ask the client to scan the document for regions again.
    pub fn rediscover(&self) -> bool {
        self.commands.send(Command::Rediscover).is_ok()
    }

    /// Close the connection.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// A client whose connection loop is running.
pub struct RunningClient<D: Document> {
    pub handle: ClientHandle<D>,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    /// Resolves to the document once the connection has closed.
    pub task: JoinHandle<D>,
}

/// Live view client for a single page.
pub struct LiveViewClient<D: Document> {
    session: LiveViewSession<D>,
}

impl<D> LiveViewClient<D>
where
    D: Document + Send + 'static,
    D::Element: Send + 'static,
{
    pub fn new(document: D, protocol: ProtocolConfig) -> Self {
        Self {
            session: LiveViewSession::new(document, protocol),
        }
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Connect to the endpoint derived from `page_url` and start the loop.
    pub async fn connect(self, page_url: &str) -> Result<RunningClient<D>> {
        let endpoint = derive_endpoint_str(page_url, &self.session.protocol().endpoint_path)?;
        info!(session_id = %self.session.session_id(), endpoint = %endpoint, "Connecting live view");
        let transport = WebSocketTransport::connect(&endpoint).await?;
        Ok(self.run_with(transport))
    }

    /// Start the loop over an already-open transport.
    pub fn run_with<T: Transport>(self, transport: T) -> RunningClient<D> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_session(self.session, transport, cmd_rx, event_tx));

        RunningClient {
            handle: ClientHandle { commands: cmd_tx },
            events: event_rx,
            task,
        }
    }
}

async fn send_all<T: Transport>(
    transport: &mut T,
    events: &mpsc::UnboundedSender<ClientEvent>,
    messages: Vec<ClientMessage>,
) -> Result<()> {
    for msg in messages {
        transport.send(msg.to_json()?).await?;
        debug!(?msg, "Sent frame");
        let _ = events.send(ClientEvent::Sent(msg));
    }
    Ok(())
}

fn report_malformed<D: Document>(
    session: &LiveViewSession<D>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    error: &LiveViewError,
) {
    warn!(session_id = %session.session_id(), %error, "Malformed render update");
    let _ = events.send(ClientEvent::Malformed {
        error: error.to_string(),
    });
}

fn handle_frame<D: Document>(
    session: &mut LiveViewSession<D>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    text: &str,
) {
    let update = match RenderUpdate::from_json(text) {
        Ok(update) => update,
        Err(e) => return report_malformed(session, events, &e),
    };

    match session.render(&update) {
        Ok(regions) => {
            let _ = events.send(ClientEvent::Rendered {
                id: update.id,
                regions,
            });
        }
        Err(e) => {
            warn!(session_id = %session.session_id(), id = %update.id, %e, "Render failed");
            let _ = events.send(ClientEvent::Malformed {
                error: e.to_string(),
            });
        }
    }
}

/// Drive one session until the connection ends, then hand the document back.
async fn run_session<D, T>(
    mut session: LiveViewSession<D>,
    mut transport: T,
    mut commands: mpsc::UnboundedReceiver<Command<D>>,
    events: mpsc::UnboundedSender<ClientEvent>,
) -> D
where
    D: Document,
    T: Transport,
{
    let subscriptions = session.open();
    let _ = events.send(ClientEvent::Opened {
        subscriptions: subscriptions.len(),
    });

    let mut commands_open = true;
    let reason = match send_all(&mut transport, &events, subscriptions).await {
        Err(e) => format!("send failed: {e}"),
        Ok(()) => loop {
            tokio::select! {
                frame = transport.recv() => match frame {
                    Some(Ok(text)) => handle_frame(&mut session, &events, &text),
                    Some(Err(e @ LiveViewError::InvalidFrame(_))) => {
                        report_malformed(&session, &events, &e)
                    }
                    Some(Err(e)) => break format!("transport error: {e}"),
                    None => break "closed by server".to_string(),
                },
                cmd = commands.recv(), if commands_open => {
                    let outbound: Vec<ClientMessage> = match cmd {
                        Some(Command::Click(target)) => session.click(&target).into_iter().collect(),
                        Some(Command::ClickBy(find)) => match find(session.document()) {
                            Some(target) => session.click(&target).into_iter().collect(),
                            None => {
                                debug!(session_id = %session.session_id(), "Click target not found");
                                Vec::new()
                            }
                        },
                        Some(Command::Inspect(f)) => {
                            f(session.document());
                            Vec::new()
                        }
                        Some(Command::Rediscover) => session.rediscover(),
                        Some(Command::Shutdown) => {
                            if let Err(e) = transport.close().await {
                                debug!(%e, "Close handshake failed");
                            }
                            break "shutdown".to_string();
                        }
                        None => {
                            // Every handle dropped; keep applying renders.
                            commands_open = false;
                            Vec::new()
                        }
                    };
                    if let Err(e) = send_all(&mut transport, &events, outbound).await {
                        break format!("send failed: {e}");
                    }
                }
            }
        },
    };

    session.close();
    info!(session_id = %session.session_id(), %reason, "Live view connection ended");
    let _ = events.send(ClientEvent::Closed { reason });
    session.into_document()
}
