/*!
Browser form of the agent.

Hosts that embed a real web view append this script to the frame's `<head>`.
It speaks the same protocol and builds the same paths as [`Agent`](super::Agent).
*/

use serde_json::Value;

use super::styles::{
  BANNER_DURATION, BANNER_ID, BANNER_TEXT, HOVER_CLASS, SELECTED_CLASS, STYLESHEET, STYLE_ID,
};
use super::AgentOptions;
use crate::types::TEXT_SNIPPET_LIMIT;

/// Id of the `<script>` element carrying the agent. Its presence means the
/// agent is already running in that document.
pub const SENTINEL_ID: &str = "visual-edit-script";

const TEMPLATE: &str = include_str!("agent.js");

/// Rendered agent script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentScript {
  options: AgentOptions,
  source: String,
}

impl Default for AgentScript {
  fn default() -> Self {
    Self::new(AgentOptions::default())
  }
}

impl AgentScript {
  pub fn new(options: AgentOptions) -> Self {
    Self {
      options,
      source: render(options),
    }
  }

  /// Id to give the `<script>` element.
  pub const fn id(&self) -> &'static str {
    SENTINEL_ID
  }

  /// JavaScript source.
  pub fn source(&self) -> &str {
    &self.source
  }

  pub const fn options(&self) -> AgentOptions {
    self.options
  }
}

/// JSON string literal, safe to splice into JavaScript.
fn literal(text: &str) -> String {
  Value::from(text).to_string()
}

fn render(options: AgentOptions) -> String {
  let banner_ms = BANNER_DURATION.as_millis().to_string();
  let text_limit = TEXT_SNIPPET_LIMIT.to_string();
  let replacements = [
    ("__HOVER_CLASS__", literal(HOVER_CLASS)),
    ("__SELECTED_CLASS__", literal(SELECTED_CLASS)),
    ("__STYLE_ID__", literal(STYLE_ID)),
    ("__BANNER_ID__", literal(BANNER_ID)),
    ("__BANNER_TEXT__", literal(BANNER_TEXT)),
    ("__BANNER_MS__", banner_ms),
    ("__STYLESHEET__", literal(STYLESHEET)),
    ("__REPORT_HOVER__", options.report_hover.to_string()),
    ("__TEXT_LIMIT__", text_limit),
  ];
  replacements
    .iter()
    .fold(TEMPLATE.to_string(), |source, (placeholder, value)| {
      source.replace(placeholder, value)
    })
}
