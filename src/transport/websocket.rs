//! WebSocket transport
//!
//! Accepts TCP connections, upgrades them to WebSocket and hands each peer to
//! a pair of pumps sharing one `Endpoint`:
//! - `read_pump` decodes envelopes and applies them to the hub
//! - `write_pump` drains the endpoint's queue and sends heartbeats
//!
//! The peer's identity comes from the `client-name` query parameter of the
//! upgrade request and is only used in logs.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tracing::{error, info, warn};
use tungstenite::Message as WsMessage;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::broker::Hub;
use crate::client::Endpoint;
use crate::config::Settings;
use crate::transport::inbound::read_pump;
use crate::transport::outbound::write_pump;
use crate::utils::Result;

/// Query parameter carrying the peer's display name.
pub const CLIENT_NAME_PARAM: &str = "client-name";

const ANONYMOUS: &str = "anonymous";

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of incoming TCP connections for `serve`.
pub trait Acceptor: Send + Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Binds `addr` and serves connections forever.
pub async fn start_websocket_server(addr: &str, hub: Arc<Hub>, settings: Settings) -> Result<()> {
    settings.validate()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, hub, settings).await
}

/// Runs the accept loop on an already bound listener.
///
/// Only returns early when `settings` fail validation. Accept errors such as
/// file descriptor exhaustion are logged and retried after a short pause.
pub async fn serve<L: Acceptor>(listener: L, hub: Arc<Hub>, settings: Settings) -> Result<()> {
    settings.validate()?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    let live = Arc::new(AtomicUsize::new(0));

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Failed to accept connection: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let hub = hub.clone();
        let settings = settings.clone();
        let live = live.clone();

        tokio::spawn(async move {
            handle_connection(stream, peer, hub, settings, live).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<Hub>,
    settings: Settings,
    live: Arc<AtomicUsize>,
) {
    let mut name = None;
    let ws_stream = match accept_hdr_async(stream, |req: &Request, res: Response| {
        name = client_name(req);
        Ok::<Response, ErrorResponse>(res)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake error from {peer}: {e}");
            return;
        }
    };
    let name = name.unwrap_or_else(|| ANONYMOUS.to_string());

    let (mut ws_sender, ws_receiver) = ws_stream.split();

    if live.fetch_add(1, Ordering::SeqCst) >= settings.broker.max_connections {
        live.fetch_sub(1, Ordering::SeqCst);
        warn!("Max connections reached, rejecting {name} ({peer})");
        let frame = CloseFrame {
            code: CloseCode::Policy,
            reason: "too many connections".into(),
        };
        let _ = ws_sender.send(WsMessage::Close(Some(frame))).await;
        return;
    }

    let (endpoint, queue) = Endpoint::new(name, settings.broker.queue_capacity);
    info!("new client {} ({}) from {peer}", endpoint.name(), endpoint.id());

    let heartbeat = settings.heartbeat;
    let writer = tokio::spawn(write_pump(
        ws_sender,
        queue,
        endpoint.clone(),
        hub.clone(),
        heartbeat,
    ));
    let reader = tokio::spawn(read_pump(
        ws_receiver,
        endpoint,
        hub,
        heartbeat,
        settings.broker.max_read_errors,
    ));

    let _ = tokio::join!(writer, reader);
    live.fetch_sub(1, Ordering::SeqCst);
}

/// Extracts the `client-name` query parameter from the upgrade request.
pub fn client_name(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CLIENT_NAME_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Builds the upgrade URL for `base`, carrying `name` as `client-name`.
pub fn connect_url(base: &str, name: &str) -> String {
    let name: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{}/?{CLIENT_NAME_PARAM}={name}", base.trim_end_matches('/'))
}
