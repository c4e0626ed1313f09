//! Per-connection viewer socket loop.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::ViewerError,
    services::live_service,
    state::{SharedState, ViewerSession},
};

/// Handle the full lifecycle of an individual viewer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = ViewerSession::new(outbound_tx.clone());
    let session_id = session.id();
    info!(session_id = %session_id, "viewer connected");

    while let Some(message) = receiver.next().await {
        let outcome = match message {
            Ok(Message::Text(text)) => {
                debug!(session_id = %session_id, payload = %text, "received viewer message");
                live_service::handle_text(&state, &mut session, text.as_str()).await
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
                Ok(())
            }
            Ok(Message::Close(frame)) => {
                info!(session_id = %session_id, "viewer closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => Err(ViewerError::UnsupportedFrame("binary")),
            Ok(Message::Pong(_)) => Ok(()),
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "websocket error");
                break;
            }
        };

        if let Err(err) = outcome {
            warn!(
                session_id = %session_id,
                match_id = session.current_match().map(String::as_str),
                error = %err,
                "viewer message dropped"
            );
        }
    }

    live_service::handle_disconnect(&state, &mut session).await;
    info!(session_id = %session_id, "viewer disconnected");

    drop(session);
    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
