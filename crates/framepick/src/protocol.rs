/*!
Message protocol between the host document and the embedded document.

Both directions are JSON objects discriminated by a `type` field:

| Direction | Kind | Payload |
|---|---|---|
| host → embedded | `TOGGLE_EDIT_MODE` | `{ editMode: boolean }` |
| host → embedded | `CLEAR_SELECTION` | none |
| host → embedded | `CLEAR_ALL_EFFECTS` | none |
| embedded → host | `ELEMENT_SELECTED` | `{ data: { elementInfo } }` |
| embedded → host | `ELEMENT_HOVER` | `{ data: { elementInfo } }` |

Raw payloads go through [`AgentMessage::decode`] / [`ControlMessage::decode`],
which keep "kind we don't speak" apart from "kind we speak, broken payload".
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::types::ElementDescriptor;

/// Host → embedded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ControlMessage {
  /// Turn selection on or off.
  ToggleEditMode {
    #[serde(rename = "editMode")]
    edit_mode: bool,
  },
  /// Drop the selection highlight only.
  ClearSelection,
  /// Force edit mode off and drop every highlight and the banner.
  ClearAllEffects,
}

impl ControlMessage {
  const KINDS: &'static [&'static str] = &["TOGGLE_EDIT_MODE", "CLEAR_SELECTION", "CLEAR_ALL_EFFECTS"];

  pub const fn enable() -> Self {
    Self::ToggleEditMode { edit_mode: true }
  }

  pub const fn disable() -> Self {
    Self::ToggleEditMode { edit_mode: false }
  }

  /// Wire name of this message kind.
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::ToggleEditMode { .. } => "TOGGLE_EDIT_MODE",
      Self::ClearSelection => "CLEAR_SELECTION",
      Self::ClearAllEffects => "CLEAR_ALL_EFFECTS",
    }
  }

  /// Decode a raw control message.
  pub fn decode(value: &Value) -> Decoded<Self> {
    decode_tagged(value, Self::KINDS)
  }
}

/// Payload wrapper for element events: `{ elementInfo }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ElementPayload {
  #[serde(default)]
  pub element_info: Option<ElementDescriptor>,
}

/// Embedded document → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum AgentMessage {
  /// The user clicked an element.
  ElementSelected {
    #[serde(default)]
    data: ElementPayload,
  },
  /// The pointer entered an element.
  ElementHover {
    #[serde(default)]
    data: ElementPayload,
  },
}

impl AgentMessage {
  const KINDS: &'static [&'static str] = &["ELEMENT_SELECTED", "ELEMENT_HOVER"];

  pub fn selected(descriptor: ElementDescriptor) -> Self {
    Self::ElementSelected {
      data: ElementPayload {
        element_info: Some(descriptor),
      },
    }
  }

  pub fn hovered(descriptor: ElementDescriptor) -> Self {
    Self::ElementHover {
      data: ElementPayload {
        element_info: Some(descriptor),
      },
    }
  }

  /// Wire name of this message kind.
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::ElementSelected { .. } => "ELEMENT_SELECTED",
      Self::ElementHover { .. } => "ELEMENT_HOVER",
    }
  }

  /// The attached descriptor, if the sender included one.
  pub const fn descriptor(&self) -> Option<&ElementDescriptor> {
    match self {
      Self::ElementSelected { data } | Self::ElementHover { data } => data.element_info.as_ref(),
    }
  }

  /// Decode a raw message posted by the embedded document.
  pub fn decode(value: &Value) -> Decoded<Self> {
    decode_tagged(value, Self::KINDS)
  }
}

/// Outcome of decoding a raw protocol message.
#[derive(Debug)]
pub enum Decoded<T> {
  /// A message this side understands.
  Message(T),
  /// No `type`, or a `type` outside the protocol. Carries the kind, if any.
  Unknown(Option<String>),
  /// Known `type`, but the payload did not fit it.
  Malformed {
    kind: String,
    error: serde_json::Error,
  },
}

fn decode_tagged<T: DeserializeOwned>(value: &Value, kinds: &[&str]) -> Decoded<T> {
  let Some(kind) = value.get("type").and_then(Value::as_str) else {
    return Decoded::Unknown(None);
  };
  if !kinds.contains(&kind) {
    return Decoded::Unknown(Some(kind.to_string()));
  }
  match serde_json::from_value(value.clone()) {
    Ok(message) => Decoded::Message(message),
    Err(error) => Decoded::Malformed {
      kind: kind.to_string(),
      error,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Rect;
  use serde_json::json;

  fn descriptor() -> ElementDescriptor {
    ElementDescriptor {
      tag_name: "SPAN".into(),
      element_id: String::new(),
      class_names: "a b".into(),
      text_snippet: "hi".into(),
      css_path: "div#x > span.a.b:nth-child(1)".into(),
      page_locator: String::new(),
      bounding_box: Rect::new(1.0, 2.0, 3.0, 4.0),
    }
  }

  #[test]
  fn control_messages_use_wire_names() {
    assert_eq!(
      serde_json::to_value(ControlMessage::enable()).unwrap(),
      json!({ "type": "TOGGLE_EDIT_MODE", "editMode": true })
    );
    assert_eq!(
      serde_json::to_value(ControlMessage::ClearSelection).unwrap(),
      json!({ "type": "CLEAR_SELECTION" })
    );
    assert_eq!(
      serde_json::to_value(ControlMessage::ClearAllEffects).unwrap(),
      json!({ "type": "CLEAR_ALL_EFFECTS" })
    );
  }

  #[test]
  fn selected_message_nests_element_info_under_data() {
    let json = serde_json::to_value(AgentMessage::selected(descriptor())).unwrap();
    assert_eq!(json["type"], "ELEMENT_SELECTED");
    assert_eq!(json["data"]["elementInfo"]["tagName"], "SPAN");
    assert_eq!(json["data"]["elementInfo"]["textSnippet"], "hi");
  }

  #[test]
  fn decode_accepts_message_without_descriptor() {
    let Decoded::Message(message) = AgentMessage::decode(&json!({ "type": "ELEMENT_HOVER" })) else {
      panic!("expected a hover message");
    };
    assert_eq!(message.kind(), "ELEMENT_HOVER");
    assert!(message.descriptor().is_none());
  }

  #[test]
  fn decode_reads_browser_payload() {
    let raw = json!({
      "type": "ELEMENT_SELECTED",
      "data": { "elementInfo": {
        "tagName": "BUTTON",
        "elementId": "save",
        "classNames": "btn",
        "textSnippet": "Save",
        "cssPath": "button#save",
        "pageLocator": "?id=3",
        "boundingBox": { "top": 10.0, "left": 20.0, "width": 80.0, "height": 24.0 }
      }}
    });
    let Decoded::Message(message) = AgentMessage::decode(&raw) else {
      panic!("expected a selection message");
    };
    let descriptor = message.descriptor().unwrap();
    assert_eq!(descriptor.element_id, "save");
    assert_eq!(descriptor.bounding_box, Rect::new(20.0, 10.0, 80.0, 24.0));
  }

  #[test]
  fn decode_separates_unknown_from_malformed() {
    assert!(matches!(
      AgentMessage::decode(&json!({ "type": "webpackOk" })),
      Decoded::Unknown(Some(kind)) if kind == "webpackOk"
    ));
    assert!(matches!(
      AgentMessage::decode(&json!("just a string")),
      Decoded::Unknown(None)
    ));
    assert!(matches!(
      AgentMessage::decode(&json!({ "type": "ELEMENT_SELECTED", "data": { "elementInfo": 42 } })),
      Decoded::Malformed { kind, .. } if kind == "ELEMENT_SELECTED"
    ));
  }

  #[test]
  fn decode_control_requires_edit_mode_flag() {
    assert!(matches!(
      ControlMessage::decode(&json!({ "type": "TOGGLE_EDIT_MODE", "editMode": false })),
      Decoded::Message(ControlMessage::ToggleEditMode { edit_mode: false })
    ));
    assert!(matches!(
      ControlMessage::decode(&json!({ "type": "TOGGLE_EDIT_MODE" })),
      Decoded::Malformed { .. }
    ));
  }
}
