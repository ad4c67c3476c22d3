/*!
Cross-frame controller: the host half of framepick.

Owns the on/off lifecycle of selection inside one embedded frame and relays
the agent's reports to the host. It never touches the embedded DOM beyond
checking for the agent's sentinel and appending the agent script; everything
else goes through [`ControlMessage`]s.

No operation returns an error or panics. A missing frame, an unreachable
document or a malformed message all degrade to a logged no-op.

# Module Structure

- `mod.rs` - `SelectorController`, builder, state, message dispatch, events
- `inject.rs` - settling delays and the injection poll loop

# Example

```ignore
let controller = SelectorController::<LocalFrame>::builder()
    .on_element_selected(|element| println!("picked {}", element.css_path))
    .build();

controller.initialize(frame.clone());
let _listener = controller.listen(frame.subscribe());
controller.enable_edit_mode();
```
*/

mod inject;

use std::sync::Arc;
use std::time::Duration;

use async_broadcast::{InactiveReceiver, Receiver, RecvError, Sender};
use parking_lot::Mutex;
use serde_json::Value;

use crate::agent::{AgentOptions, AgentScript};
use crate::config::ControllerConfig;
use crate::frame::FrameHandle;
use crate::protocol::{AgentMessage, ControlMessage, Decoded};
use crate::types::{ControllerEvent, ControllerSnapshot, ElementDescriptor};

/// Host callback for element reports.
pub type ElementCallback = Arc<dyn Fn(&ElementDescriptor) + Send + Sync>;

/// Mutable controller state. Only the controller's own methods touch it.
struct ControllerState<F> {
  frame: Option<F>,
  edit_mode_enabled: bool,
  last_hovered: Option<ElementDescriptor>,
  last_selected: Option<ElementDescriptor>,
  /// Bumped by `initialize` and `teardown`; delayed work from an older
  /// session is dropped.
  session: u64,
}

impl<F> Default for ControllerState<F> {
  fn default() -> Self {
    Self {
      frame: None,
      edit_mode_enabled: false,
      last_hovered: None,
      last_selected: None,
      session: 0,
    }
  }
}

/// Builder for a [`SelectorController`].
///
/// # Example
///
/// ```ignore
/// let controller = SelectorController::<LocalFrame>::builder()
///     .inject_delay(Duration::from_millis(100))
///     .report_hover(true)
///     .on_element_hover(|element| log::info!("over {}", element.tag_name))
///     .build();
/// ```
#[derive(Default)]
#[must_use = "Builder does nothing until .build() is called"]
pub struct SelectorControllerBuilder {
  config: ControllerConfig,
  on_selected: Option<ElementCallback>,
  on_hover: Option<ElementCallback>,
}

impl std::fmt::Debug for SelectorControllerBuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SelectorControllerBuilder")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl SelectorControllerBuilder {
  /// Replace the whole configuration.
  pub fn config(mut self, config: ControllerConfig) -> Self {
    self.config = config;
    self
  }

  /// Settling delay before injecting on enable. Default: 300ms.
  pub fn inject_delay(mut self, delay: Duration) -> Self {
    self.config.inject_delay = delay;
    self
  }

  /// Settling delay after a frame load. Default: 500ms.
  pub fn reload_delay(mut self, delay: Duration) -> Self {
    self.config.reload_delay = delay;
    self
  }

  /// Interval between document accessibility checks. Default: 100ms.
  pub fn poll_interval(mut self, interval: Duration) -> Self {
    self.config.poll_interval = interval;
    self
  }

  /// Accessibility checks per injection attempt. Default: 50.
  pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
    self.config.max_poll_attempts = attempts;
    self
  }

  /// Have the injected agent report hover changes. Default: false.
  pub fn report_hover(mut self, report: bool) -> Self {
    self.config.agent = AgentOptions {
      report_hover: report,
    };
    self
  }

  /// Called with the descriptor of every selected element.
  pub fn on_element_selected(
    mut self,
    callback: impl Fn(&ElementDescriptor) + Send + Sync + 'static,
  ) -> Self {
    self.on_selected = Some(Arc::new(callback));
    self
  }

  /// Called with the descriptor of every hovered element, when the agent
  /// reports hovers.
  pub fn on_element_hover(
    mut self,
    callback: impl Fn(&ElementDescriptor) + Send + Sync + 'static,
  ) -> Self {
    self.on_hover = Some(Arc::new(callback));
    self
  }

  /// Build the controller. It does nothing until initialized with a frame.
  pub fn build<F: FrameHandle>(self) -> SelectorController<F> {
    let (mut tx, rx) = async_broadcast::broadcast(self.config.event_capacity.max(1));
    tx.set_overflow(true); // Drop oldest messages when full

    SelectorController {
      state: Arc::new(Mutex::new(ControllerState::default())),
      script: Arc::new(AgentScript::new(self.config.agent)),
      config: self.config,
      on_selected: self.on_selected,
      on_hover: self.on_hover,
      events_tx: tx,
      events_keepalive: rx.deactivate(),
    }
  }
}

/// Host-side controller for one embedded frame.
///
/// Clone is cheap (Arc bumps); clones share state.
pub struct SelectorController<F: FrameHandle> {
  state: Arc<Mutex<ControllerState<F>>>,
  script: Arc<AgentScript>,
  config: ControllerConfig,
  on_selected: Option<ElementCallback>,
  on_hover: Option<ElementCallback>,
  events_tx: Sender<ControllerEvent>,
  events_keepalive: InactiveReceiver<ControllerEvent>,
}

impl<F: FrameHandle> Clone for SelectorController<F> {
  fn clone(&self) -> Self {
    Self {
      state: Arc::clone(&self.state),
      script: Arc::clone(&self.script),
      config: self.config,
      on_selected: self.on_selected.clone(),
      on_hover: self.on_hover.clone(),
      events_tx: self.events_tx.clone(),
      events_keepalive: self.events_keepalive.clone(),
    }
  }
}

impl<F: FrameHandle> std::fmt::Debug for SelectorController<F> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SelectorController")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl<F: FrameHandle> Default for SelectorController<F> {
  fn default() -> Self {
    Self::new()
  }
}

impl<F: FrameHandle> SelectorController<F> {
  /// Controller with default configuration and no callbacks.
  pub fn new() -> Self {
    Self::builder().build()
  }

  /// Start configuring a controller.
  pub fn builder() -> SelectorControllerBuilder {
    SelectorControllerBuilder::default()
  }

  /// Timing and agent configuration.
  pub const fn config(&self) -> &ControllerConfig {
    &self.config
  }

  /// Subscribe to controller events.
  pub fn subscribe(&self) -> Receiver<ControllerEvent> {
    self.events_keepalive.activate_cloned()
  }

  /// Bind to a frame. Only the first call takes effect.
  pub fn initialize(&self, frame: F) {
    let mut state = self.state.lock();
    if state.frame.is_some() {
      log::warn!("SelectorController already initialized, ignoring");
      return;
    }
    state.frame = Some(frame);
    state.session += 1;
  }

  /// Forget the frame. Pending injections and delayed syncs are dropped,
  /// and the controller goes back to its uninitialized state.
  pub fn teardown(&self) {
    let was_enabled = {
      let mut state = self.state.lock();
      let session = state.session + 1;
      let was_enabled = state.edit_mode_enabled;
      *state = ControllerState {
        session,
        ..ControllerState::default()
      };
      was_enabled
    };
    if was_enabled {
      self.emit(ControllerEvent::EditModeChanged { enabled: false });
    }
  }

  /// Whether a frame is bound.
  pub fn is_initialized(&self) -> bool {
    self.state.lock().frame.is_some()
  }

  pub fn is_edit_mode(&self) -> bool {
    self.state.lock().edit_mode_enabled
  }

  /// Turn selection on. The agent is injected (or re-enabled) after the
  /// settling delay.
  pub fn enable_edit_mode(&self) {
    let changed = {
      let mut state = self.state.lock();
      if state.frame.is_none() {
        log::debug!("enable_edit_mode before initialize, ignoring");
        return;
      }
      let changed = !state.edit_mode_enabled;
      state.edit_mode_enabled = true;
      changed
    };
    if changed {
      self.emit(ControllerEvent::EditModeChanged { enabled: true });
    }
    self.schedule_injection(self.config.inject_delay);
  }

  /// Turn selection off and tell the agent to drop every visual effect.
  pub fn disable_edit_mode(&self) {
    let (frame, changed) = {
      let mut state = self.state.lock();
      let Some(frame) = state.frame.clone() else {
        log::debug!("disable_edit_mode before initialize, ignoring");
        return;
      };
      let changed = state.edit_mode_enabled;
      state.edit_mode_enabled = false;
      state.last_hovered = None;
      state.last_selected = None;
      (frame, changed)
    };
    send(&frame, ControlMessage::disable());
    send(&frame, ControlMessage::ClearAllEffects);
    if changed {
      self.emit(ControllerEvent::EditModeChanged { enabled: false });
    }
  }

  /// Flip edit mode. Returns the new state.
  pub fn toggle_edit_mode(&self) -> bool {
    if self.is_edit_mode() {
      self.disable_edit_mode();
    } else {
      self.enable_edit_mode();
    }
    self.is_edit_mode()
  }

  /// When edit mode is off, tell the agent to clear everything, in case a
  /// previous disable never arrived.
  pub fn sync_state(&self) {
    let frame = {
      let state = self.state.lock();
      if state.edit_mode_enabled {
        return;
      }
      state.frame.clone()
    };
    if let Some(frame) = frame {
      send(&frame, ControlMessage::ClearAllEffects);
    }
  }

  /// Drop the selection highlight, keeping edit mode on.
  pub fn clear_selection(&self) {
    let (frame, had_selection) = {
      let mut state = self.state.lock();
      let Some(frame) = state.frame.clone() else {
        return;
      };
      (frame, state.last_selected.take().is_some())
    };
    send(&frame, ControlMessage::ClearSelection);
    if had_selection {
      self.emit(ControllerEvent::SelectionCleared);
    }
  }

  /// The frame finished loading a document. Its agent, if any, is gone:
  /// re-inject when edit mode is on, otherwise make sure it is clean.
  pub fn on_frame_loaded(&self) {
    let edit_mode = {
      let mut state = self.state.lock();
      if state.frame.is_none() {
        return;
      }
      state.last_hovered = None;
      state.last_selected = None;
      state.edit_mode_enabled
    };
    if edit_mode {
      self.schedule_injection(self.config.reload_delay);
    } else {
      self.schedule_sync(self.config.reload_delay);
    }
  }

  /// Handle a message posted by the embedded document.
  pub fn handle_incoming_message(&self, message: &AgentMessage) {
    let Some(descriptor) = message.descriptor() else {
      log::debug!("{} without element info, ignoring", message.kind());
      return;
    };
    {
      let mut state = self.state.lock();
      if state.frame.is_none() {
        log::debug!("{} before initialize, ignoring", message.kind());
        return;
      }
      match message {
        AgentMessage::ElementSelected { .. } => state.last_selected = Some(descriptor.clone()),
        AgentMessage::ElementHover { .. } => state.last_hovered = Some(descriptor.clone()),
      }
    }

    match message {
      AgentMessage::ElementSelected { .. } => {
        if let Some(callback) = &self.on_selected {
          callback(descriptor);
        }
        self.emit(ControllerEvent::ElementSelected {
          element: descriptor.clone(),
        });
      }
      AgentMessage::ElementHover { .. } => {
        if let Some(callback) = &self.on_hover {
          callback(descriptor);
        }
        self.emit(ControllerEvent::ElementHovered {
          element: descriptor.clone(),
        });
      }
    }
  }

  /// Decode and handle a raw message. Unknown kinds are logged at debug,
  /// malformed payloads at warn; neither reaches the callbacks.
  pub fn handle_incoming_json(&self, value: &Value) {
    match AgentMessage::decode(value) {
      Decoded::Message(message) => self.handle_incoming_message(&message),
      Decoded::Unknown(Some(kind)) => log::debug!("Ignoring message of unknown kind {kind}"),
      Decoded::Unknown(None) => log::debug!("Ignoring message without a type"),
      Decoded::Malformed { kind, error } => log::warn!("Malformed {kind} message: {error}"),
    }
  }

  /// Most recent selection reported by the agent.
  pub fn last_selected(&self) -> Option<ElementDescriptor> {
    self.state.lock().last_selected.clone()
  }

  pub fn last_hovered(&self) -> Option<ElementDescriptor> {
    self.state.lock().last_hovered.clone()
  }

  /// Current state, as sent to newly connected clients.
  pub fn snapshot(&self) -> ControllerSnapshot {
    let state = self.state.lock();
    ControllerSnapshot {
      initialized: state.frame.is_some(),
      edit_mode_enabled: state.edit_mode_enabled,
      last_selected: state.last_selected.clone(),
      last_hovered: state.last_hovered.clone(),
    }
  }

  /// Pump a frame's outbound messages into
  /// [`handle_incoming_message`](Self::handle_incoming_message) until the
  /// channel closes or the handle is dropped.
  pub fn listen(&self, mut messages: Receiver<AgentMessage>) -> ListenerHandle {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      log::warn!("listen called outside a tokio runtime, messages will not be handled");
      return ListenerHandle { task: None };
    };
    let controller = self.clone();
    let task = runtime.spawn(async move {
      loop {
        match messages.recv().await {
          Ok(message) => controller.handle_incoming_message(&message),
          Err(RecvError::Overflowed(skipped)) => {
            log::warn!("Frame message channel overflowed, {skipped} messages lost");
          }
          Err(RecvError::Closed) => break,
        }
      }
    });
    ListenerHandle { task: Some(task) }
  }

  fn emit(&self, event: ControllerEvent) {
    if let Err(e) = self.events_tx.try_broadcast(event) {
      if e.is_full() {
        log::error!(
          "Event channel overflow - events are being dropped. \
           Consider increasing event_capacity or processing events faster."
        );
      }
    }
  }
}

/// Post a control message, logging when the frame has no window.
fn send<F: FrameHandle>(frame: &F, message: ControlMessage) {
  if !frame.post_message(&message) {
    log::debug!("Frame has no window, dropped {}", message.kind());
  }
}

/// Handle to a [`SelectorController::listen`] task. Stops on drop.
pub struct ListenerHandle {
  task: Option<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for ListenerHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ListenerHandle").finish_non_exhaustive()
  }
}

impl ListenerHandle {
  /// Whether the listener task is still pumping messages.
  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|task| !task.is_finished())
  }
}

impl Drop for ListenerHandle {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}
