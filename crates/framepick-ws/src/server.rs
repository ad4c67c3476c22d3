/*!
WebSocket server implementation.
*/

use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
  },
  response::Response,
  routing::get,
  Router,
};
use framepick::{ControllerEvent, FrameHandle, SelectorController};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Default WebSocket server port.
pub const DEFAULT_WS_PORT: u16 = 3031;
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Handler for app-specific RPC methods.
pub type CustomRpcHandler = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// WebSocket state.
pub struct WebSocketState<F: FrameHandle> {
  controller: SelectorController<F>,
  json_sender: Arc<broadcast::Sender<String>>,
  custom_handler: Option<CustomRpcHandler>,
  port: u16,
}

impl<F: FrameHandle> Clone for WebSocketState<F> {
  fn clone(&self) -> Self {
    Self {
      controller: self.controller.clone(),
      json_sender: Arc::clone(&self.json_sender),
      custom_handler: self.custom_handler.clone(),
      port: self.port,
    }
  }
}

impl<F: FrameHandle> std::fmt::Debug for WebSocketState<F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebSocketState")
      .field("port", &self.port)
      .finish_non_exhaustive()
  }
}

impl<F: FrameHandle> WebSocketState<F> {
  /// Create with default port.
  pub fn new(controller: SelectorController<F>) -> Self {
    Self::with_port(controller, DEFAULT_WS_PORT)
  }

  /// Create with custom port.
  pub fn with_port(controller: SelectorController<F>, port: u16) -> Self {
    let (json_tx, _) = broadcast::channel::<String>(DEFAULT_CHANNEL_CAPACITY);
    Self {
      controller,
      json_sender: Arc::new(json_tx),
      custom_handler: None,
      port,
    }
  }

  /// Add a custom RPC handler.
  #[must_use]
  pub fn with_custom_handler(mut self, handler: CustomRpcHandler) -> Self {
    self.custom_handler = Some(handler);
    self
  }

  /// Port the server binds to.
  pub const fn port(&self) -> u16 {
    self.port
  }
}

/// Start the WebSocket server. Returns only if binding or serving fails.
pub async fn start_server<F: FrameHandle>(ws_state: WebSocketState<F>) -> std::io::Result<()> {
  let port = ws_state.port;
  let sender = ws_state.json_sender.clone();
  let mut rx = ws_state.controller.subscribe();
  tokio::spawn(async move {
    loop {
      match rx.recv().await {
        Ok(event) => {
          if let Ok(json) = serde_json::to_string(&event) {
            drop(sender.send(json));
          }
        }
        Err(async_broadcast::RecvError::Overflowed(n)) => {
          log::warn!("[ws] Controller events overflowed, {n} dropped");
        }
        Err(async_broadcast::RecvError::Closed) => break,
      }
    }
  });

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

  let app = Router::new()
    .route("/ws", get(websocket_handler::<F>))
    .layer(cors)
    .with_state(ws_state);

  let addr = format!("127.0.0.1:{port}");
  let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
    log::error!("Failed to bind WebSocket server to {addr}: {e}");
    e
  })?;

  log::info!("WebSocket server: ws://{addr}/ws");

  axum::serve(listener, app).await
}

async fn websocket_handler<F: FrameHandle>(
  ws: WebSocketUpgrade,
  State(ws_state): State<WebSocketState<F>>,
) -> Response {
  ws.on_upgrade(|socket| handle_websocket(socket, ws_state))
}

async fn handle_websocket<F: FrameHandle>(mut socket: WebSocket, ws_state: WebSocketState<F>) {
  let mut rx = ws_state.json_sender.subscribe();

  let event = ControllerEvent::SyncInit(ws_state.controller.snapshot());
  if let Ok(msg) = serde_json::to_string(&event) {
    if socket.send(Message::Text(msg)).await.is_err() {
      return;
    }
  }

  loop {
    tokio::select! {
        msg = socket.recv() => {
            match msg {
                Some(Ok(Message::Text(text))) => {
                    let response = handle_request(&text, &ws_state);
                    while let Ok(event_json) = rx.try_recv() {
                        drop(socket.send(Message::Text(event_json)).await);
                    }
                    drop(socket.send(Message::Text(response)).await);
                }
                Some(Ok(Message::Close(_))) => {
                    log::debug!("[client] closed connection");
                    break;
                }
                Some(Err(e)) => {
                    log::warn!("WebSocket error: {e}");
                    break;
                }
                None => {
                    log::debug!("[client] disconnected");
                    break;
                }
                _ => {}
            }
        }

        broadcast = rx.recv() => {
            match broadcast {
                Ok(event_json) => {
                    if socket.send(Message::Text(event_json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("[ws] Client lagged, dropped {n} events - client needs resync");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
  }
}

/// Answer one JSON-RPC request. Custom methods are tried first.
fn handle_request<F: FrameHandle>(request: &str, ws_state: &WebSocketState<F>) -> String {
  let parsed: Result<Value, _> = serde_json::from_str(request);

  let req = match parsed {
    Ok(v) => v,
    Err(e) => return json!({ "error": format!("Invalid JSON: {e}") }).to_string(),
  };

  let id = req.get("id").cloned().unwrap_or(Value::Null);
  let method = req.get("method").and_then(Value::as_str).unwrap_or("");
  let args = req.get("args").cloned().unwrap_or(Value::Null);

  if let Some(ref handler) = ws_state.custom_handler {
    if let Some(mut response) = handler(method, &args) {
      if let Some(obj) = response.as_object_mut() {
        obj.insert("id".to_string(), id);
      }
      return response.to_string();
    }
  }

  let mut response = crate::rpc::dispatch_json(&ws_state.controller, method, &args);
  if let Some(obj) = response.as_object_mut() {
    obj.insert("id".to_string(), id);
  }
  response.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use framepick::LocalFrame;

  fn state() -> WebSocketState<LocalFrame> {
    let frame = LocalFrame::new();
    frame.load_html("<p>hi</p>", "/");
    let controller = SelectorController::new();
    controller.initialize(frame);
    WebSocketState::with_port(controller, 0)
  }

  fn parse(response: &str) -> Value {
    serde_json::from_str(response).unwrap()
  }

  #[test]
  fn echoes_request_id() {
    let response = parse(&handle_request(
      r#"{"id": 7, "method": "snapshot", "args": null}"#,
      &state(),
    ));
    assert_eq!(response["id"], 7);
    assert_eq!(response["result"]["initialized"], true);
  }

  #[test]
  fn rejects_invalid_json() {
    let response = parse(&handle_request("{not json", &state()));
    assert!(response["error"].as_str().unwrap().starts_with("Invalid JSON"));
  }

  #[test]
  fn custom_handler_takes_precedence() {
    let handler: CustomRpcHandler = Arc::new(|method, args| {
      (method == "echo").then(|| json!({ "result": args.clone() }))
    });
    let ws_state = state().with_custom_handler(handler);

    let custom = parse(&handle_request(
      r#"{"id": "a", "method": "echo", "args": {"x": 1}}"#,
      &ws_state,
    ));
    assert_eq!(custom, json!({ "id": "a", "result": { "x": 1 } }));

    let builtin = parse(&handle_request(
      r#"{"id": "b", "method": "sync_state"}"#,
      &ws_state,
    ));
    assert_eq!(builtin, json!({ "id": "b", "result": null }));
  }

  #[test]
  fn default_port() {
    let frame = LocalFrame::new();
    let controller: SelectorController<LocalFrame> = SelectorController::new();
    controller.initialize(frame);
    assert_eq!(WebSocketState::new(controller).port(), DEFAULT_WS_PORT);
  }
}
