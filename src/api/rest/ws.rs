use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::tracker::TrackerState;
use crate::state::AppState;

pub async fn track_delivery(
    ws: WebSocketUpgrade,
    Path(delivery_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, delivery_id))
}

/// Streams tracker state for one delivery until the client goes away.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, delivery_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let (on_update, mut updates_rx) = latest_state();

    let handle = state.tracker.attach(&delivery_id, on_update);

    info!(delivery_id = %delivery_id, "tracking client connected");

    let send_task = tokio::spawn(async move {
        while updates_rx.changed().await.is_ok() {
            let Some(update) = updates_rx.borrow_and_update().clone() else {
                continue;
            };
            let json = match serde_json::to_string(&update) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize tracker state for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(delivery_id = %handle.delivery_id(), "tracking client disconnected");
    handle.detach().await;
}

/// A slow client only ever needs the newest state; older ones are replaced.
fn latest_state() -> (
    impl FnMut(&TrackerState) + Send + 'static,
    watch::Receiver<Option<TrackerState>>,
) {
    let (tx, rx) = watch::channel(None);
    (
        move |update: &TrackerState| {
            tx.send_replace(Some(update.clone()));
        },
        rx,
    )
}

#[cfg(test)]
mod tests {
    use super::latest_state;
    use crate::engine::timeline::TimeFormatter;
    use crate::engine::tracker::TimelineTracker;

    #[tokio::test]
    async fn unread_states_are_replaced_by_the_newest() {
        let (mut on_update, mut rx) = latest_state();

        for id in ["d-1", "d-2", "d-3"] {
            on_update(&TimelineTracker::new(id, TimeFormatter::default()).state());
        }

        rx.changed().await.unwrap();
        let latest = rx.borrow_and_update().clone().unwrap();
        assert_eq!(latest.delivery_id, "d-3");
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn receiver_ends_when_the_tracker_goes_away() {
        let (on_update, mut rx) = latest_state();
        drop(on_update);
        assert!(rx.changed().await.is_err());
    }
}
