//! Output transports
//!
//! A bot answers either through the inbound HTTP request (`HttpTransport`)
//! or over a streaming socket (`SocketTransport`).

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use crate::error::{BotError, Result};

/// Completion channel of the inbound HTTP request
pub trait ResponseSink: Send + Sync {
    /// Write the response body
    fn send(&self, payload: Value) -> Result<()>;
}

/// One-shot response slot.
///
/// The request handler keeps the receiver and answers the HTTP request with
/// whatever the bot writes into the slot.
pub struct ResponseSlot {
    sender: Mutex<Option<oneshot::Sender<Value>>>,
}

impl ResponseSlot {
    /// Create a slot and the receiver the request handler waits on
    pub fn channel() -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl ResponseSink for ResponseSlot {
    fn send(&self, payload: Value) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| BotError::ResponseClosed)?
            .take()
            .ok_or(BotError::ResponseAlreadySent)?;

        sender.send(payload).map_err(|_| BotError::ResponseClosed)
    }
}

/// Raw frame sender of a streaming connection
#[async_trait]
pub trait SocketHandle: Send + Sync {
    /// Send one serialized frame, resolving once the socket accepted it
    async fn send_frame(&self, frame: String) -> Result<()>;
}

/// `SocketHandle` over the write half of a WebSocket stream
pub struct WsSocket<S> {
    sink: tokio::sync::Mutex<S>,
}

impl<S> WsSocket<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: tokio::sync::Mutex::new(sink),
        }
    }

    pub fn into_inner(self) -> S {
        self.sink.into_inner()
    }
}

#[async_trait]
impl<S> SocketHandle for WsSocket<S>
where
    S: Sink<WsMessage> + Unpin + Send,
    S::Error: Display,
{
    async fn send_frame(&self, frame: String) -> Result<()> {
        debug!("Sending socket frame ({} bytes)", frame.len());

        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(frame.into()))
            .await
            .map_err(|e| BotError::WebSocket(e.to_string()))
    }
}

/// HTTP-callback mode: replies may also complete the inbound request
#[derive(Clone)]
pub struct HttpTransport {
    pub(crate) sink: Arc<dyn ResponseSink>,
}

impl HttpTransport {
    pub fn new(sink: impl ResponseSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn from_arc(sink: Arc<dyn ResponseSink>) -> Self {
        Self { sink }
    }
}

/// Streaming mode: control frames go over the socket
#[derive(Clone)]
pub struct SocketTransport {
    pub(crate) socket: Arc<dyn SocketHandle>,
}

impl SocketTransport {
    pub fn new(socket: impl SocketHandle + 'static) -> Self {
        Self {
            socket: Arc::new(socket),
        }
    }

    pub fn from_arc(socket: Arc<dyn SocketHandle>) -> Self {
        Self { socket }
    }
}
