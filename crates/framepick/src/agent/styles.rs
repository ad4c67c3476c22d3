/*! Class names, element ids and CSS the agent injects into the page. */

use std::time::Duration;

/// Applied to the element under the pointer.
pub const HOVER_CLASS: &str = "edit-hover";

/// Applied to the clicked element.
pub const SELECTED_CLASS: &str = "edit-selected";

/// Id of the injected `<style>` element.
pub const STYLE_ID: &str = "edit-mode-styles";

/// Id of the transient edit-mode banner.
pub const BANNER_ID: &str = "edit-tip";

pub const BANNER_TEXT: &str = "Edit mode on: hover to inspect, click to select";

/// How long the banner stays up.
pub const BANNER_DURATION: Duration = Duration::from_secs(3);

/// Highlight rules plus the banner's look.
pub const STYLESHEET: &str = r"
.edit-hover {
  outline: 2px dashed #1890ff !important;
  outline-offset: 2px !important;
  cursor: crosshair !important;
  position: relative !important;
}
.edit-hover::before {
  content: '' !important;
  position: absolute !important;
  inset: -4px !important;
  background: rgba(24, 144, 255, 0.02) !important;
  pointer-events: none !important;
  z-index: -1 !important;
}
.edit-selected {
  outline: 3px solid #52c41a !important;
  outline-offset: 2px !important;
  cursor: default !important;
  position: relative !important;
}
.edit-selected::before {
  content: '' !important;
  position: absolute !important;
  inset: -4px !important;
  background: rgba(82, 196, 26, 0.03) !important;
  pointer-events: none !important;
  z-index: -1 !important;
}
#edit-tip {
  position: fixed;
  top: 20px;
  right: 20px;
  background: #1890ff;
  color: white;
  padding: 12px 16px;
  border-radius: 6px;
  font-size: 14px;
  z-index: 9999;
  box-shadow: 0 4px 12px rgba(0, 0, 0, 0.15);
}
";

/// Classes the agent owns. They never appear in descriptors or paths.
pub fn is_reserved_class(class: &str) -> bool {
  class == HOVER_CLASS || class == SELECTED_CLASS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_highlight_classes_are_reserved() {
    assert!(is_reserved_class("edit-hover"));
    assert!(is_reserved_class("edit-selected"));
    assert!(!is_reserved_class("edit-button"));
    assert!(!is_reserved_class("hover"));
  }

  #[test]
  fn stylesheet_covers_both_highlights() {
    assert!(STYLESHEET.contains(&format!(".{HOVER_CLASS} {{")));
    assert!(STYLESHEET.contains(&format!(".{SELECTED_CLASS} {{")));
    assert!(STYLESHEET.contains(&format!("#{BANNER_ID} {{")));
  }
}
