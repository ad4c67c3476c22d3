/*!
Selector agent: the half of framepick that runs inside the embedded document.

One `Agent` exists per document load. It highlights the element under the
pointer, marks the clicked element as selected, reports selections to the
parent with an `ELEMENT_SELECTED` message, and obeys control messages from the
host. All DOM access goes through [`Dom`], so the same state machine drives
the in-memory [`Document`](crate::dom::Document) and any browser binding.

# Module Structure

- `mod.rs` - `Agent` state machine
- `path.rs` - selector paths and descriptors
- `styles.rs` - reserved classes, ids and the injected stylesheet
- `script.rs` - `AgentScript`, the JavaScript form of the agent
*/

mod path;
mod script;
mod styles;

pub use path::{css_path, describe};
pub use script::{AgentScript, SENTINEL_ID};
pub use styles::{
  is_reserved_class, BANNER_DURATION, BANNER_ID, BANNER_TEXT, HOVER_CLASS, SELECTED_CLASS,
  STYLESHEET, STYLE_ID,
};

use async_broadcast::{Sender, TrySendError};
use tokio::time::Instant;

use crate::dom::Dom;
use crate::protocol::{AgentMessage, ControlMessage};

/// Agent behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentOptions {
  /// Post `ELEMENT_HOVER` whenever the hover highlight moves. Default: off.
  pub report_hover: bool,
}

/// What happened to a DOM event after the agent saw it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventDisposition {
  pub default_prevented: bool,
  pub propagation_stopped: bool,
}

impl EventDisposition {
  /// Untouched: the page's own handlers run as usual.
  pub const PASS: Self = Self {
    default_prevented: false,
    propagation_stopped: false,
  };

  /// Swallowed by the agent.
  pub const CONSUMED: Self = Self {
    default_prevented: true,
    propagation_stopped: true,
  };
}

/// In-document selector agent.
pub struct Agent<D: Dom> {
  options: AgentOptions,
  parent: Sender<AgentMessage>,
  is_edit_mode: bool,
  current_hover: Option<D::Node>,
  current_selected: Option<D::Node>,
  listeners_attached: bool,
  banner_deadline: Option<Instant>,
}

impl<D: Dom> std::fmt::Debug for Agent<D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Agent")
      .field("is_edit_mode", &self.is_edit_mode)
      .field("current_hover", &self.current_hover)
      .field("current_selected", &self.current_selected)
      .field("listeners_attached", &self.listeners_attached)
      .finish_non_exhaustive()
  }
}

impl<D: Dom> Agent<D> {
  /// Create an agent that posts to `parent`. Nothing touches the document
  /// until [`inject`](Self::inject).
  pub fn new(parent: Sender<AgentMessage>, options: AgentOptions) -> Self {
    Self {
      options,
      parent,
      is_edit_mode: false,
      current_hover: None,
      current_selected: None,
      listeners_attached: false,
      banner_deadline: None,
    }
  }

  /// Start up in a freshly loaded document: styles, listeners, banner, and
  /// edit mode on.
  pub fn inject(&mut self, dom: &mut D) {
    self.is_edit_mode = true;
    inject_styles(dom);
    self.attach_listeners(dom);
    self.show_banner(dom);
  }

  pub const fn is_edit_mode(&self) -> bool {
    self.is_edit_mode
  }

  pub const fn current_hover(&self) -> Option<D::Node> {
    self.current_hover
  }

  pub const fn current_selected(&self) -> Option<D::Node> {
    self.current_selected
  }

  pub const fn listeners_attached(&self) -> bool {
    self.listeners_attached
  }

  /// When the banner is due to be dismissed, if one is up.
  pub const fn banner_deadline(&self) -> Option<Instant> {
    self.banner_deadline
  }

  pub const fn options(&self) -> AgentOptions {
    self.options
  }

  /// React to a message from the host.
  pub fn handle_control(&mut self, dom: &mut D, message: ControlMessage) {
    match message {
      ControlMessage::ToggleEditMode { edit_mode: true } => {
        self.is_edit_mode = true;
        inject_styles(dom);
        self.attach_listeners(dom);
        self.show_banner(dom);
      }
      ControlMessage::ToggleEditMode { edit_mode: false } => {
        self.is_edit_mode = false;
        self.clear_hover(dom);
        self.clear_selected(dom);
      }
      ControlMessage::ClearSelection => self.clear_selected(dom),
      ControlMessage::ClearAllEffects => {
        self.is_edit_mode = false;
        self.clear_hover(dom);
        self.clear_selected(dom);
        self.remove_banner(dom);
      }
    }
  }

  /// Pointer entered `target` (delegated, capture phase).
  pub fn pointer_over(&mut self, dom: &mut D, target: D::Node) {
    if !self.listeners_attached || !self.is_edit_mode {
      return;
    }
    if Some(target) == self.current_hover || Some(target) == self.current_selected {
      return;
    }
    if !is_eligible(dom, target) {
      return;
    }
    self.clear_hover(dom);
    dom.add_class(target, HOVER_CLASS);
    self.current_hover = Some(target);

    if self.options.report_hover {
      self.post(AgentMessage::hovered(describe(dom, target)));
    }
  }

  /// Pointer left `target` for `related` (None when it left the document).
  ///
  /// Moving into a descendant of the hovered element keeps the highlight.
  pub fn pointer_out(&mut self, dom: &mut D, _target: D::Node, related: Option<D::Node>) {
    if !self.listeners_attached || !self.is_edit_mode {
      return;
    }
    let Some(hover) = self.current_hover else {
      return;
    };
    if related.is_none_or(|related| !dom.contains(hover, related)) {
      self.clear_hover(dom);
    }
  }

  /// Click on `target`. In edit mode an eligible target becomes the
  /// selection and the event is swallowed; anything else passes through.
  pub fn click(&mut self, dom: &mut D, target: D::Node) -> EventDisposition {
    if !self.listeners_attached || !self.is_edit_mode || !is_eligible(dom, target) {
      return EventDisposition::PASS;
    }

    self.clear_selected(dom);
    self.clear_hover(dom);
    dom.add_class(target, SELECTED_CLASS);
    self.current_selected = Some(target);

    self.post(AgentMessage::selected(describe(dom, target)));
    EventDisposition::CONSUMED
  }

  /// Remove the banner if its deadline has passed. Returns whether it was
  /// removed.
  pub fn expire_banner(&mut self, dom: &mut D, now: Instant) -> bool {
    match self.banner_deadline {
      Some(deadline) if now >= deadline => {
        self.remove_banner(dom);
        true
      }
      _ => false,
    }
  }

  fn attach_listeners(&mut self, dom: &D) {
    if self.listeners_attached {
      return;
    }
    if dom.body().is_none() {
      log::warn!("No <body> to attach agent listeners to");
      return;
    }
    self.listeners_attached = true;
  }

  fn show_banner(&mut self, dom: &mut D) {
    if dom.get_element_by_id(BANNER_ID).is_some() {
      return;
    }
    let Some(body) = dom.body() else {
      return;
    };
    let banner = dom.create_element("div");
    dom.set_attribute(banner, "id", BANNER_ID);
    dom.set_text_content(banner, BANNER_TEXT);
    dom.append_child(body, banner);
    self.banner_deadline = Some(Instant::now() + BANNER_DURATION);
  }

  fn remove_banner(&mut self, dom: &mut D) {
    if let Some(banner) = dom.get_element_by_id(BANNER_ID) {
      dom.remove(banner);
    }
    self.banner_deadline = None;
  }

  fn clear_hover(&mut self, dom: &mut D) {
    if let Some(hover) = self.current_hover.take() {
      dom.remove_class(hover, HOVER_CLASS);
    }
  }

  fn clear_selected(&mut self, dom: &mut D) {
    for node in dom.elements_with_class(SELECTED_CLASS) {
      dom.remove_class(node, SELECTED_CLASS);
    }
    self.current_selected = None;
  }

  fn post(&self, message: AgentMessage) {
    match self.parent.try_broadcast(message) {
      Ok(_) => {}
      Err(TrySendError::Inactive(message)) => {
        log::debug!("No host listening, dropped {}", message.kind());
      }
      Err(e) => log::error!("Failed to post to host: {e}"),
    }
  }
}

/// Add the highlight stylesheet once per document.
fn inject_styles<D: Dom>(dom: &mut D) {
  if dom.get_element_by_id(STYLE_ID).is_some() {
    return;
  }
  let Some(container) = dom.head().or_else(|| dom.document_element()) else {
    log::warn!("No <head> to hold agent styles");
    return;
  };
  let style = dom.create_element("style");
  dom.set_attribute(style, "id", STYLE_ID);
  dom.set_text_content(style, STYLESHEET);
  dom.append_child(container, style);
}

/// Targets the agent never highlights.
fn is_eligible<D: Dom>(dom: &D, node: D::Node) -> bool {
  if Some(node) == dom.body() || Some(node) == dom.document_element() {
    return false;
  }
  !matches!(dom.tag_name(node).as_str(), "SCRIPT" | "STYLE")
}
