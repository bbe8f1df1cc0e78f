//! WebSocket route handler
//!
//! One research run per connection: the client sends a research request as
//! its first text frame, then receives every progress event as a JSON text
//! frame. The socket is closed after the terminal event. A client disconnect
//! drops the running pipeline.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use legis_core::{ProgressEvent, ProgressSink, ResearchRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws/research", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Research WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Error reported before the pipeline starts
fn rejection(message: impl Into<String>) -> ProgressEvent {
    ProgressEvent::Error {
        step: 0,
        step_name: "Request".to_string(),
        message: message.into(),
    }
}

/// Wait for the request frame. `None` means the client went away first.
async fn read_request(
    receiver: &mut SplitStream<WebSocket>,
) -> Option<Result<ResearchRequest, serde_json::Error>> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => return Some(serde_json::from_str(text.as_str())),
            Message::Binary(data) => return Some(serde_json::from_slice(&data)),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return None,
        }
    }
    None
}

/// Send one event as a JSON text frame. Returns false once the client is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ProgressEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.kind(), e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let request = match read_request(&mut receiver).await {
        Some(Ok(request)) => request,
        Some(Err(e)) => {
            send_event(&mut sender, &rejection(format!("Invalid research request: {}", e))).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
        None => {
            debug!("Client disconnected before sending a request");
            return;
        }
    };

    let Some(service) = state.research_service.clone() else {
        send_event(&mut sender, &rejection("Research service not available")).await;
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    info!("Research over WebSocket: {}", request.query);

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let sink: Arc<dyn ProgressSink> = Arc::new(tx);
    let pipeline = async move { service.run(&request, Some(sink)).await };
    tokio::pin!(pipeline);

    let mut pipeline_done = false;
    loop {
        tokio::select! {
            result = &mut pipeline, if !pipeline_done => {
                pipeline_done = true;
                if let Err(e) = result {
                    debug!("Research run ended with error: {}", e);
                }
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                if !send_event(&mut sender, &event).await {
                    info!("Client disconnected; cancelling research");
                    return;
                }
                if event.is_terminal() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {
                        info!("Client disconnected; cancelling research");
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
