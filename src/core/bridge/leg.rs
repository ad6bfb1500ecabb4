//! Transport-neutral view of the two sockets a bridge owns.
//!
//! Both legs are WebSockets in production (axum on the call side,
//! tokio-tungstenite on the AI side). The bridge only sees a [`LegSink`] to
//! write text frames to and a stream of [`LegInbound`] items, so the actor
//! can be driven by in-memory legs in tests.

use std::fmt::Display;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// One item read from a leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegInbound {
    Text(String),
    Binary(Bytes),
    /// The peer closed the socket or the stream ended
    Closed,
    /// Transport failure; the leg is unusable afterwards
    Error(String),
}

impl LegInbound {
    /// Whether nothing more will be read after this item.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LegInbound::Closed | LegInbound::Error(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LegError {
    #[error("leg already closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
}

/// Write half of a leg.
#[async_trait]
pub trait LegSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), LegError>;

    /// Close the leg. Calling it again is a no-op.
    async fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// WebSocket message types a [`SinkLeg`] can carry.
pub trait LegMessage: Send + 'static {
    fn text(text: String) -> Self;
    fn close() -> Self;
    /// Map a received message; `None` for control frames the bridge ignores.
    fn into_inbound(self) -> Option<LegInbound>;
}

impl LegMessage for axum::extract::ws::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn close() -> Self {
        Self::Close(None)
    }

    fn into_inbound(self) -> Option<LegInbound> {
        match self {
            Self::Text(text) => Some(LegInbound::Text(text.as_str().to_owned())),
            Self::Binary(data) => Some(LegInbound::Binary(data)),
            Self::Close(_) => Some(LegInbound::Closed),
            Self::Ping(_) | Self::Pong(_) => None,
        }
    }
}

impl LegMessage for tokio_tungstenite::tungstenite::Message {
    fn text(text: String) -> Self {
        Self::Text(text.into())
    }

    fn close() -> Self {
        Self::Close(None)
    }

    fn into_inbound(self) -> Option<LegInbound> {
        match self {
            Self::Text(text) => Some(LegInbound::Text(text.as_str().to_owned())),
            Self::Binary(data) => Some(LegInbound::Binary(data)),
            Self::Close(_) => Some(LegInbound::Closed),
            Self::Ping(_) | Self::Pong(_) | Self::Frame(_) => None,
        }
    }
}

/// [`LegSink`] over the write half of a split WebSocket.
pub struct SinkLeg<S, M> {
    sink: S,
    open: bool,
    _message: PhantomData<fn(M)>,
}

impl<S, M> SinkLeg<S, M> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            open: true,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<S, M> LegSink for SinkLeg<S, M>
where
    S: Sink<M> + Unpin + Send,
    S::Error: Display,
    M: LegMessage,
{
    async fn send_text(&mut self, text: String) -> Result<(), LegError> {
        if !self.open {
            return Err(LegError::Closed);
        }
        if let Err(e) = self.sink.send(M::text(text)).await {
            self.open = false;
            return Err(LegError::Send(e.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = self.sink.send(M::close()).await {
            debug!("Close frame not delivered: {}", e);
        }
        let _ = self.sink.close().await;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Adapt the read half of a WebSocket into a stream of [`LegInbound`].
///
/// Transport errors surface as a single [`LegInbound::Error`].
pub fn inbound_stream<St, M, E>(stream: St) -> BoxStream<'static, LegInbound>
where
    St: Stream<Item = Result<M, E>> + Send + 'static,
    M: LegMessage,
    E: Display,
{
    stream
        .filter_map(|item| {
            future::ready(match item {
                Ok(message) => message.into_inbound(),
                Err(e) => Some(LegInbound::Error(e.to_string())),
            })
        })
        .boxed()
}

/// Forward every item of `inbound` into the bridge queue until the leg
/// terminates. Always ends with a terminal item, synthesizing `Closed` when
/// the stream simply runs dry.
pub async fn pump<T, F>(
    mut inbound: BoxStream<'static, LegInbound>,
    events: mpsc::Sender<T>,
    wrap: F,
) where
    F: Fn(LegInbound) -> T,
{
    while let Some(item) = inbound.next().await {
        let terminal = item.is_terminal();
        if events.send(wrap(item)).await.is_err() || terminal {
            return;
        }
    }
    let _ = events.send(wrap(LegInbound::Closed)).await;
}
