//! WebSocket client for the job server's event channel.
//!
//! [`EventClient`] holds the endpoint; [`EventClient::connect`] yields a
//! live [`EventConnection`] whose frames are decoded into [`JobEvent`]s.

use cookbook_core::protocol::JobEvent;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ObserverError;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection handle for the event channel.
pub struct EventClient {
    ws_url: String,
}

/// A live event-channel connection.
pub struct EventConnection {
    ws_stream: WsStream,
}

/// What [`EventConnection::next_event`] read.
#[derive(Debug)]
pub enum Frame {
    /// A decoded job event.
    Event(JobEvent),
    /// A control or undecodable frame; keep reading.
    Skip,
    /// The server closed the connection or the stream failed.
    Closed,
}

impl EventClient {
    /// * `ws_url` - full event channel URL, e.g. `ws://host:3000/api/v1/ws`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open the WebSocket.
    pub async fn connect(&self) -> Result<EventConnection, ObserverError> {
        let (ws_stream, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            ObserverError::Connection(format!(
                "Failed to connect to event channel at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(ws_url = %self.ws_url, "Connected to event channel");
        Ok(EventConnection { ws_stream })
    }
}

impl EventConnection {
    /// Read the next frame. Pings are answered by tungstenite itself.
    pub async fn next_event(&mut self) -> Frame {
        match self.ws_stream.next().await {
            Some(Ok(Message::Text(text))) => match decode_event(&text) {
                Ok(event) => Frame::Event(event),
                Err(e) => {
                    tracing::warn!(error = %e, raw_message = %text, "Failed to decode event");
                    Frame::Skip
                }
            },
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Event channel closed by server");
                Frame::Closed
            }
            Some(Ok(
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_),
            )) => Frame::Skip,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Event channel receive error");
                Frame::Closed
            }
            None => Frame::Closed,
        }
    }
}

/// Decode one `{"event", "data"}` text frame.
pub fn decode_event(text: &str) -> Result<JobEvent, ObserverError> {
    Ok(serde_json::from_str(text)?)
}
