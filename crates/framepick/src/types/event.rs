/*! Events the controller broadcasts to host-side consumers. */

use super::ElementDescriptor;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Controller state as seen by a newly connected consumer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ControllerSnapshot {
  /// Whether a frame is bound.
  pub initialized: bool,
  pub edit_mode_enabled: bool,
  pub last_selected: Option<ElementDescriptor>,
  pub last_hovered: Option<ElementDescriptor>,
}

/// Events emitted when controller state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum ControllerEvent {
  // Initial sync (on connection)
  #[serde(rename = "sync:init")]
  SyncInit(ControllerSnapshot),

  #[serde(rename = "edit_mode:changed")]
  EditModeChanged { enabled: bool },

  // Relayed from the agent
  #[serde(rename = "element:selected")]
  ElementSelected { element: ElementDescriptor },
  #[serde(rename = "element:hovered")]
  ElementHovered { element: ElementDescriptor },
  #[serde(rename = "selection:cleared")]
  SelectionCleared,
}
