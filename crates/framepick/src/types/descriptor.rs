/*! Element descriptors reported by the agent. */

use super::Rect;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Maximum number of characters kept in [`ElementDescriptor::text_snippet`].
pub const TEXT_SNIPPET_LIMIT: usize = 100;

/// Structured summary of a hovered or selected element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ElementDescriptor {
  /// Tag name, uppercase as the DOM reports it (`"DIV"`, `"BUTTON"`).
  pub tag_name: String,
  /// Element id, empty when absent.
  pub element_id: String,
  /// Space-joined class list without the agent's highlight classes.
  pub class_names: String,
  /// Trimmed text content, at most [`TEXT_SNIPPET_LIMIT`] characters.
  pub text_snippet: String,
  /// Selector path that resolves back to this element.
  pub css_path: String,
  /// Query string plus fragment of the embedded document.
  ///
  /// Single-page apps route through these, so this tells the host which
  /// logical page the element belongs to.
  pub page_locator: String,
  pub bounding_box: Rect,
}

/// Trim `text` and keep at most `limit` characters.
pub fn truncate_text(text: &str, limit: usize) -> String {
  text.trim().chars().take(limit).collect()
}
