//! WebSocket transport.
//!
//! Each dial runs in its own task. The task reports back to the driver over
//! one shared channel, tagged with the [`AttemptId`] it was started for, so
//! the session can discard results of superseded dials.

use futures_util::{SinkExt, StreamExt};
use rescuewatch_core::{AttemptId, ConsoleError, Link};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum TransportEvent {
    Opened { attempt: AttemptId, link: ChannelLink },
    Text { attempt: AttemptId, text: String },
    Closed { attempt: AttemptId, reason: String },
}

/// Outbound half handed to the session once the handshake completes.
#[derive(Debug)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Link for ChannelLink {
    fn send(&mut self, text: String) -> Result<(), ConsoleError> {
        self.tx
            .send(text)
            .map_err(|_| ConsoleError::Transport("connection task has stopped".into()))
    }

    fn close(&mut self) {
        self.cancel.cancel();
    }
}

/// Start one dial for `attempt`. `parent` cancels every connection at
/// shutdown.
pub fn dial(
    url: String,
    attempt: AttemptId,
    events: mpsc::UnboundedSender<TransportEvent>,
    parent: &CancellationToken,
) {
    let cancel = parent.child_token();
    tokio::spawn(async move {
        let reason = match run_connection(&url, attempt, &events, cancel).await {
            Ok(()) => "closed".to_owned(),
            Err(e) => e,
        };
        // The driver may already be gone at shutdown.
        let _ = events.send(TransportEvent::Closed { attempt, reason });
    });
}

async fn run_connection(
    url: &str,
    attempt: AttemptId,
    events: &mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) -> Result<(), String> {
    tracing::debug!(%url, %attempt, "dialing");
    let connect = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(url) => result,
    };
    let (ws_stream, _response) = connect.map_err(|e| format!("connect failed: {e}"))?;
    tracing::info!(%url, %attempt, "transport connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let link = ChannelLink {
        tx: out_tx,
        cancel: cancel.clone(),
    };
    if events.send(TransportEvent::Opened { attempt, link }).is_err() {
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return Ok(());
            }
            outbound = out_rx.recv() => {
                let Some(text) = outbound else {
                    // Session dropped the link.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(());
                };
                ws_tx
                    .send(Message::Text(text))
                    .await
                    .map_err(|e| format!("send failed: {e}"))?;
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Text { attempt, text }).is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(%attempt, ?frame, "server closed connection");
                        return Err("closed by server".into());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(format!("read failed: {e}")),
                    None => return Err("stream ended".into()),
                }
            }
        }
    }
}
