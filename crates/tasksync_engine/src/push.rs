use std::sync::mpsc;
use std::sync::Arc;

use futures_util::StreamExt;
use tasksync_core::{CloseKind, ConnectionId, EventDispatcher};
use tasksync_logging::{sync_debug, sync_info, sync_trace};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::{ApiSettings, EngineEvent};

/// Close codes after which reconnecting is pointless: normal closure, and
/// the backend's forbidden / task-not-found codes.
const NORMAL_CLOSE_CODES: [u16; 3] = [1000, 4403, 4404];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("invalid push url: {0}")]
    InvalidUrl(String),
    #[error("push connect failed: {0}")]
    Connect(String),
    #[error("push transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    Text(String),
    Closed(CloseKind),
}

#[async_trait::async_trait]
pub trait PushStream: Send {
    /// `None` once the transport is gone without a close frame.
    async fn next_frame(&mut self) -> Option<Result<PushFrame, PushError>>;
    async fn close(&mut self);
}

/// Opens the live connection for one task.
#[async_trait::async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, task_id: &str) -> Result<Box<dyn PushStream>, PushError>;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    settings: ApiSettings,
}

impl WsConnector {
    pub fn new(settings: ApiSettings) -> Self {
        Self { settings }
    }

    /// `ws(s)://{base}/ws/tasks/{task_id}[?session=..]`
    pub fn stream_url(&self, task_id: &str) -> Result<url::Url, PushError> {
        let mut url = self
            .settings
            .endpoint(&["ws", "tasks", task_id])
            .map_err(|err| PushError::InvalidUrl(err.message))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| PushError::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        if let Some(session) = &self.settings.session {
            url.query_pairs_mut().append_pair("session", session);
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, task_id: &str) -> Result<Box<dyn PushStream>, PushError> {
        let url = self.stream_url(task_id)?;
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|err| PushError::Connect(err.to_string()))?;
        Ok(Box::new(WsStream { socket }))
    }
}

struct WsStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl PushStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<PushFrame, PushError>> {
        loop {
            let message = match self.socket.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(PushError::Transport(err.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(PushFrame::Text(text))),
                Message::Close(frame) => {
                    return Some(Ok(PushFrame::Closed(classify_close(frame.as_ref()))))
                }
                // Pings are answered by tungstenite itself.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.close(None).await;
    }
}

pub fn classify_close(frame: Option<&CloseFrame<'_>>) -> CloseKind {
    match frame {
        Some(frame) if NORMAL_CLOSE_CODES.contains(&u16::from(frame.code)) => CloseKind::Normal,
        _ => CloseKind::Abnormal,
    }
}

/// Drives one connection until it ends or `cancel` fires.
///
/// Frames go through a dedicated dispatcher whose only observer forwards
/// them tagged with `connection`. Cancellation clears that observer first,
/// so nothing read afterwards is forwarded.
pub(crate) async fn run_connection(
    connector: Arc<dyn PushConnector>,
    connection: ConnectionId,
    task_id: String,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut dispatcher = EventDispatcher::new();
    let forward = event_tx.clone();
    dispatcher.subscribe(move |event| {
        let _ = forward.send(EngineEvent::PushEvent {
            connection,
            event: event.clone(),
        });
    });

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            dispatcher.close();
            return;
        }
        result = connector.connect(&task_id) => result,
    };
    let mut stream = match connected {
        Ok(stream) => stream,
        Err(err) => {
            sync_info!("Push connection {:?} for {} failed: {}", connection, task_id, err);
            dispatcher.close();
            let _ = event_tx.send(EngineEvent::PushClosed {
                connection,
                kind: CloseKind::Abnormal,
            });
            return;
        }
    };
    sync_debug!("Push connection {:?} open for {}", connection, task_id);
    let _ = event_tx.send(EngineEvent::PushOpened { connection });

    let kind = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                dispatcher.close();
                stream.close().await;
                sync_trace!("Push connection {:?} cancelled", connection);
                return;
            }
            frame = stream.next_frame() => frame,
        };
        match frame {
            Some(Ok(PushFrame::Text(text))) => {
                dispatcher.deliver_raw(&text);
            }
            Some(Ok(PushFrame::Closed(kind))) => break kind,
            Some(Err(err)) => {
                sync_info!("Push connection {:?} dropped: {}", connection, err);
                break CloseKind::Abnormal;
            }
            None => break CloseKind::Abnormal,
        }
    };

    dispatcher.close();
    let _ = event_tx.send(EngineEvent::PushClosed { connection, kind });
}
