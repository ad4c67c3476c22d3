/*!
RPC request/response types and dispatch.
*/

#![allow(missing_docs)]

use framepick::{ControllerSnapshot, FrameHandle, SelectorController};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use ts_rs::TS;

/// RPC request.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
#[ts(export)]
pub enum RpcRequest {
  /// Get the controller's current state.
  Snapshot,
  /// Turn selection on (agent injected after the settling delay).
  EnableEditMode,
  /// Turn selection off and clear every effect.
  DisableEditMode,
  /// Flip edit mode; responds with the new state.
  ToggleEditMode,
  /// Clear stale effects when edit mode is off.
  SyncState,
  /// Drop the selection highlight.
  ClearSelection,
  /// The frame finished loading a new document.
  FrameLoaded,
  /// Relay a raw message the embedded document posted to its parent.
  HandleMessage {
    #[ts(type = "unknown")]
    message: JsonValue,
  },
}

/// RPC response.
#[derive(Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RpcResponse {
  /// Full controller state.
  Snapshot(Box<ControllerSnapshot>),
  /// Edit mode after the call.
  EditMode(bool),
  /// No data.
  Null,
}

pub fn dispatch_json<F: FrameHandle>(
  controller: &SelectorController<F>,
  method: &str,
  args: &JsonValue,
) -> JsonValue {
  let request_value = json!({ "method": method, "args": args });

  match serde_json::from_value::<RpcRequest>(request_value) {
    Ok(request) => json!({ "result": dispatch(controller, request) }),
    Err(e) => {
      log::warn!("[rpc] Invalid request for {method}: {e}");
      json!({ "error": format!("Invalid request: {e}") })
    }
  }
}

/// Controller operations never fail; a missing frame makes them no-ops.
pub fn dispatch<F: FrameHandle>(
  controller: &SelectorController<F>,
  request: RpcRequest,
) -> RpcResponse {
  match request {
    RpcRequest::Snapshot => RpcResponse::Snapshot(Box::new(controller.snapshot())),

    RpcRequest::EnableEditMode => {
      controller.enable_edit_mode();
      RpcResponse::EditMode(controller.is_edit_mode())
    }

    RpcRequest::DisableEditMode => {
      controller.disable_edit_mode();
      RpcResponse::EditMode(controller.is_edit_mode())
    }

    RpcRequest::ToggleEditMode => RpcResponse::EditMode(controller.toggle_edit_mode()),

    RpcRequest::SyncState => {
      controller.sync_state();
      RpcResponse::Null
    }

    RpcRequest::ClearSelection => {
      controller.clear_selection();
      RpcResponse::Null
    }

    RpcRequest::FrameLoaded => {
      controller.on_frame_loaded();
      RpcResponse::Null
    }

    RpcRequest::HandleMessage { message } => {
      controller.handle_incoming_json(&message);
      RpcResponse::Null
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use framepick::{AgentMessage, ElementDescriptor, LocalFrame, Rect};

  fn controller() -> SelectorController<LocalFrame> {
    let frame = LocalFrame::new();
    frame.load_html("<p>hi</p>", "/");
    let controller = SelectorController::new();
    controller.initialize(frame);
    controller
  }

  #[test]
  fn snapshot_reports_state() {
    let controller = controller();
    let response = dispatch_json(&controller, "snapshot", &JsonValue::Null);
    assert_eq!(response["result"]["initialized"], true);
    assert_eq!(response["result"]["editModeEnabled"], false);
  }

  #[test]
  fn toggle_returns_new_state() {
    let controller = controller();
    assert_eq!(
      dispatch_json(&controller, "toggle_edit_mode", &JsonValue::Null),
      json!({ "result": true })
    );
    assert_eq!(
      dispatch_json(&controller, "disable_edit_mode", &JsonValue::Null),
      json!({ "result": false })
    );
  }

  #[test]
  fn void_methods_return_null() {
    let controller = controller();
    for method in ["sync_state", "clear_selection", "frame_loaded"] {
      assert_eq!(
        dispatch_json(&controller, method, &JsonValue::Null),
        json!({ "result": null }),
        "{method}"
      );
    }
  }

  #[test]
  fn relayed_message_updates_selection() {
    let controller = controller();
    let message = AgentMessage::selected(ElementDescriptor {
      tag_name: "P".into(),
      element_id: String::new(),
      class_names: String::new(),
      text_snippet: "hi".into(),
      css_path: "body > p:nth-child(1)".into(),
      page_locator: String::new(),
      bounding_box: Rect::default(),
    });
    let args = json!({ "message": message });

    dispatch_json(&controller, "handle_message", &args);

    assert_eq!(
      controller.last_selected().map(|d| d.css_path),
      Some("body > p:nth-child(1)".to_string())
    );
  }

  #[test]
  fn unknown_method_is_an_error() {
    let controller = controller();
    let response = dispatch_json(&controller, "explode", &JsonValue::Null);
    assert!(response["error"]
      .as_str()
      .unwrap()
      .starts_with("Invalid request"));
  }
}
