//! WebSocket upgrade handler for relay sessions.
//!
//! `GET /api/v1/ws` upgrades the connection and runs one sequential relay
//! session over it until the client disconnects.

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use chatrelay_core::run_session;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws_channel::WsChannel;

/// `GET /api/v1/ws`
pub async fn chat_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_ws(socket, state))
}

async fn handle_chat_ws(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    let span = info_span!("ws_session", %session_id);

    async move {
        info!("WebSocket connection accepted");
        let mut channel = WsChannel::new(socket);
        let summary = run_session(&state.relay, &mut channel).await;
        info!(handled = summary.handled, "WebSocket connection closed");
    }
    .instrument(span)
    .await;
}
