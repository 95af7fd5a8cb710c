use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    AppState,
    services::realtime_service::{ConnectionState, Delivery},
};

/// Live per-poll event stream. Streams `vote_inserted` and
/// `poll_status_changed` events as they are published; a `resync` control
/// message tells the client its view has a gap and the counts must be
/// re-queried rather than patched.
pub async fn poll_updates(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, poll_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, poll_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = state.hub.subscribe(poll_id);
    let mut connection_state = state.hub.connection_state();

    let welcome = json!({
        "type": "connected",
        "poll_id": poll_id,
    });
    if sender
        .send(Message::Text(welcome.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            delivery = subscription.recv() => match delivery {
                Delivery::Event(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to encode poll event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Delivery::Lagged => {
                    // Missed events are not replayed.
                    if send_resync(&mut sender).await.is_err() {
                        break;
                    }
                }
                Delivery::Closed => break,
            },
            changed = connection_state.changed() => {
                if changed.is_err() {
                    break;
                }
                // The cross-instance bridge came back after a gap; remote
                // votes may have been missed while it was down.
                let reconnected =
                    *connection_state.borrow_and_update() == ConnectionState::Connected;
                if reconnected && send_resync(&mut sender).await.is_err() {
                    break;
                }
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    // Dropping the subscription unsubscribes promptly; no leaked
    // subscriptions accumulate across poll navigations.
    tracing::debug!(poll_id = %poll_id, "Live subscription closed");
}

async fn send_resync(sender: &mut SplitSink<WebSocket, Message>) -> Result<(), axum::Error> {
    let resync = json!({ "type": "resync" });
    sender.send(Message::Text(resync.to_string().into())).await
}
