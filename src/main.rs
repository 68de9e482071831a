//! CLI for topichub
//!
//! Subcommands:
//! - `server`: run the WebSocket broker
//! - `client`: subscribe to a topic, publish one message to it and print
//!   what comes back (useful for smoke tests)

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use serde_json::value::RawValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

use topichub::broker::Hub;
use topichub::config::load_config;
use topichub::transport::message::{Action, Envelope};
use topichub::transport::start_websocket_server;
use topichub::transport::websocket::connect_url;
use topichub::utils::{Result, logging};

#[derive(Parser)]
#[command(name = "topichub")]
enum Command {
    /// Start the WebSocket broker
    Server,
    /// Run the example client
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Name reported to the server
        #[arg(long, default_value = "cli")]
        name: String,
        #[arg(long, default_value = "chat")]
        topic: String,
        #[arg(long, default_value = "Hello from topichub")]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                logging::init("info");
                error!("Server failed: {e}");
            }
        }
        Command::Client {
            url,
            name,
            topic,
            message,
        } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &name, &topic, &message).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_server() -> Result<()> {
    let config = load_config()?;
    logging::init(&config.log.level);

    let addr = config.addr();
    let hub = Arc::new(Hub::new());

    tokio::select! {
        res = start_websocket_server(&addr, hub, config.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(url: &str, name: &str, topic: &str, message: &str) -> Result<()> {
    let (mut ws_stream, _response) = connect_async(connect_url(url, name)).await?;

    let subscribe = Envelope::new(Action::Subscribe, topic, None);
    ws_stream.send(WsMessage::text(subscribe.encode()?)).await?;

    let payload = RawValue::from_string(serde_json::to_string(message)?)?;
    let publish = Envelope::new(Action::Publish, topic, Some(payload));
    ws_stream.send(WsMessage::text(publish.encode()?)).await?;

    while let Ok(Some(frame)) = tokio::time::timeout(Duration::from_secs(2), ws_stream.next()).await {
        match frame? {
            WsMessage::Text(text) => {
                for line in text.as_str().lines() {
                    println!("Incoming: {line}");
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    ws_stream.close(None).await?;
    Ok(())
}
