//! WebSocket relay endpoint
//!
//! Every connection receives every broadcast frame. Clients may ask the
//! relay to rebroadcast `new_post` and `new_like` messages; anything else
//! they send is ignored.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::AppState;
use crate::relay::{ConnectionId, ConnectionRegistry, RelayMessage};

/// Create relay router
///
/// Exposes the `/ws` endpoint.
pub fn relay_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let relay = state.relay.clone();
    let max_message_bytes = state.config.relay.max_message_bytes;
    ws.on_upgrade(move |socket| handle_socket(socket, relay, max_message_bytes))
}

async fn handle_socket(socket: WebSocket, relay: Arc<ConnectionRegistry>, max_message_bytes: usize) {
    let (id, outbound) = relay.register();
    tracing::info!(connection_id = id, "Relay client connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(outbound);
        while let Some(frame) = outbound.next().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    let inbound_relay = relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    handle_inbound(&inbound_relay, id, &text, max_message_bytes)
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(connection_id = id, %error, "Relay socket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    relay.unregister(id);
    tracing::info!(connection_id = id, "Relay client disconnected");
}

fn handle_inbound(relay: &ConnectionRegistry, id: ConnectionId, text: &str, max_message_bytes: usize) {
    if let Some(message) = parse_inbound(id, text, max_message_bytes) {
        relay.broadcast(&message);
    }
}

/// Decode a client frame
///
/// # Returns
/// The message when it should be rebroadcast
fn parse_inbound(id: ConnectionId, text: &str, max_message_bytes: usize) -> Option<RelayMessage> {
    if text.len() > max_message_bytes {
        tracing::warn!(
            connection_id = id,
            size = text.len(),
            limit = max_message_bytes,
            "Dropped oversized relay frame"
        );
        return None;
    }

    let message: RelayMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(error) => {
            tracing::warn!(connection_id = id, %error, "Dropped malformed relay frame");
            return None;
        }
    };

    if message.is_rebroadcast() {
        Some(message)
    } else {
        tracing::debug!(connection_id = id, kind = %message.kind, "Ignored relay frame");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rebroadcast_types_pass_through() {
        let message = parse_inbound(1, r#"{"type":"new_post","data":{"id":7}}"#, 1024).unwrap();
        assert_eq!(message.kind, "new_post");
        assert_eq!(message.data, json!({"id": 7}));

        assert!(parse_inbound(1, r#"{"type":"new_like"}"#, 1024).is_some());
    }

    #[test]
    fn other_frames_are_dropped() {
        assert!(parse_inbound(1, r#"{"type":"join_room","data":"lobby"}"#, 1024).is_none());
        assert!(parse_inbound(1, r#"{"type":"typing"}"#, 1024).is_none());
        assert!(parse_inbound(1, "not json", 1024).is_none());
        assert!(parse_inbound(1, r#"{"data":{}}"#, 1024).is_none());
    }

    #[test]
    fn oversized_frames_are_dropped() {
        let frame = json!({"type": "new_post", "data": "x".repeat(64)}).to_string();
        assert!(parse_inbound(1, &frame, 32).is_none());
        assert!(parse_inbound(1, &frame, frame.len()).is_some());
    }

    #[test]
    fn inbound_frame_reaches_every_connection() {
        let relay = ConnectionRegistry::new();
        let (sender, mut sender_rx) = relay.register();
        let (_other, mut other_rx) = relay.register();

        handle_inbound(&relay, sender, r#"{"type":"new_like","data":{"postId":1}}"#, 1024);

        let expected: serde_json::Value =
            serde_json::from_str(&sender_rx.try_recv().unwrap()).unwrap();
        assert_eq!(expected["type"], "new_like");
        assert_eq!(expected["data"]["postId"], 1);
        assert!(other_rx.try_recv().is_ok());
    }
}
