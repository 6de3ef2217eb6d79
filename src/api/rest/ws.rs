use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, Stream};
use futures::SinkExt;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::tracking::TrackingState;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let updates = state
        .active
        .get(&id)
        .map(|active| active.observer.follow())
        .ok_or_else(|| AppError::NotFound(format!("no tracking for booking {}", id)))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, id, updates)))
}

async fn handle_socket<S>(socket: WebSocket, booking_id: Uuid, updates: S)
where
    S: Stream<Item = TrackingState> + Send + 'static,
{
    let (mut sender, mut receiver) = socket.split();

    info!(%booking_id, "tracking observer connected");

    let send_task = tokio::spawn(async move {
        let mut updates = Box::pin(updates);
        while let Some(state) = updates.next().await {
            if !send_state(&mut sender, &state).await {
                return;
            }
        }
        let _ = sender.close().await;
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(%booking_id, "tracking observer disconnected");
}

async fn send_state(sender: &mut SplitSink<WebSocket, Message>, state: &TrackingState) -> bool {
    let json = match serde_json::to_string(state) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize tracking state for ws");
            return true;
        }
    };

    sender.send(Message::Text(json.into())).await.is_ok()
}
