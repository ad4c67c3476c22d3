/*!
Agent injection.

After a settling delay the controller polls the frame until its document is
reachable. If the agent's sentinel script is already there, the running
agent only needs a `TOGGLE_EDIT_MODE`; otherwise the agent script is appended
to the document head.

Only [`AccessError::NotLoaded`] keeps the poll going. Cross-origin, detached
and navigated-away documents end the attempt quietly. Polling also stops once
edit mode is turned off, the controller is torn down, or the poll budget runs
out.
*/

use std::future::Future;
use std::time::Duration;

use super::SelectorController;
use crate::agent::SENTINEL_ID;
use crate::frame::{FrameDocument, FrameHandle};
use crate::protocol::ControlMessage;
use crate::types::AccessError;

/// How an injection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InjectOutcome {
  /// The agent was already running and was told to turn on.
  Reenabled,
  /// The agent script was appended.
  Injected,
  /// The document will never be reachable for this attempt.
  Abandoned(AccessError),
  /// The document stayed unloaded for the whole poll budget.
  TimedOut,
  /// Edit mode went off or the controller was torn down meanwhile.
  Cancelled,
}

impl<F: FrameHandle> SelectorController<F> {
  pub(super) fn schedule_injection(&self, delay: Duration) {
    let session = self.state.lock().session;
    let controller = self.clone();
    spawn_after(delay, async move {
      let outcome = controller.inject(session).await;
      log::debug!("Agent injection finished: {outcome:?}");
    });
  }

  pub(super) fn schedule_sync(&self, delay: Duration) {
    let session = self.state.lock().session;
    let controller = self.clone();
    spawn_after(delay, async move {
      if controller.state.lock().session == session {
        controller.sync_state();
      }
    });
  }

  /// The frame to inject into, while the attempt is still wanted.
  fn injection_target(&self, session: u64) -> Option<F> {
    let state = self.state.lock();
    if state.session != session || !state.edit_mode_enabled {
      return None;
    }
    state.frame.clone()
  }

  pub(super) async fn inject(&self, session: u64) -> InjectOutcome {
    let mut attempts = 0;
    loop {
      let Some(frame) = self.injection_target(session) else {
        return InjectOutcome::Cancelled;
      };
      match frame.try_access_document() {
        Ok(document) => return self.inject_into(&frame, &document),
        Err(e) if e.is_transient() => {
          attempts += 1;
          if attempts >= self.config.max_poll_attempts {
            return InjectOutcome::TimedOut;
          }
          tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(e) => return InjectOutcome::Abandoned(e),
      }
    }
  }

  fn inject_into(&self, frame: &F, document: &F::Document) -> InjectOutcome {
    document
      .contains_element(SENTINEL_ID)
      .and_then(|present| {
        if present {
          frame.post_message(&ControlMessage::enable());
          Ok(InjectOutcome::Reenabled)
        } else {
          document
            .append_script(&self.script)
            .map(|()| InjectOutcome::Injected)
        }
      })
      .unwrap_or_else(InjectOutcome::Abandoned)
  }
}

/// Run `task` after `delay` on the current tokio runtime.
fn spawn_after(delay: Duration, task: impl Future<Output = ()> + Send + 'static) {
  let Ok(runtime) = tokio::runtime::Handle::try_current() else {
    log::warn!("No tokio runtime, delayed controller work skipped");
    return;
  };
  runtime.spawn(async move {
    tokio::time::sleep(delay).await;
    task.await;
  });
}

#[cfg(test)]
mod tests {
  use super::super::tests::RecordingFrame;
  use super::*;
  use crate::agent::{HOVER_CLASS, SELECTED_CLASS};
  use crate::frame::LocalFrame;
  use crate::types::ControllerEvent;
  use tokio::time::sleep;

  const PAGE: &str = r#"<div id="x"><span class="a b">hi</span></div><p>para</p>"#;

  fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
  }

  fn setup() -> (SelectorController<LocalFrame>, LocalFrame) {
    let frame = LocalFrame::new();
    frame.load_html(PAGE, "/preview?app=1");
    let controller = SelectorController::new();
    controller.initialize(frame.clone());
    (controller, frame)
  }

  fn sentinel_count(frame: &LocalFrame) -> usize {
    frame
      .with_document(|doc| {
        doc
          .elements()
          .into_iter()
          .filter(|&n| doc.id_of(n) == Some(SENTINEL_ID))
          .count()
      })
      .unwrap_or(0)
  }

  #[tokio::test(start_paused = true)]
  async fn enable_injects_after_settling_delay() {
    let (controller, frame) = setup();

    controller.enable_edit_mode();
    sleep(ms(299)).await;
    assert!(!frame.has_agent());

    sleep(ms(2)).await;
    assert!(frame.has_agent());
    assert_eq!(sentinel_count(&frame), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn enable_before_initialize_does_nothing() {
    let frame = LocalFrame::new();
    frame.load_html(PAGE, "/");
    let controller: SelectorController<LocalFrame> = SelectorController::new();

    controller.enable_edit_mode();
    sleep(ms(1000)).await;

    assert!(!controller.is_edit_mode());
    assert!(!frame.has_agent());
  }

  #[tokio::test(start_paused = true)]
  async fn polls_until_document_loads() {
    let (controller, frame) = setup();
    frame.begin_navigation();

    controller.enable_edit_mode();
    sleep(ms(450)).await;
    frame.load_html(PAGE, "/next");
    assert!(!frame.has_agent());

    sleep(ms(100)).await;
    assert!(frame.has_agent());
  }

  #[tokio::test(start_paused = true)]
  async fn polling_gives_up_after_budget() {
    let frame = LocalFrame::new();
    let controller = SelectorController::<LocalFrame>::builder()
      .max_poll_attempts(3)
      .build();
    controller.initialize(frame.clone());

    controller.enable_edit_mode();
    sleep(ms(1000)).await;
    frame.load_html(PAGE, "/");
    sleep(ms(1000)).await;

    assert!(!frame.has_agent());
    assert!(controller.is_edit_mode());
  }

  #[tokio::test(start_paused = true)]
  async fn cross_origin_frame_fails_softly() {
    let (controller, frame) = setup();
    frame.set_cross_origin(true);

    controller.enable_edit_mode();
    sleep(ms(1000)).await;

    assert!(!frame.has_agent());
    assert!(controller.is_edit_mode());
    controller.disable_edit_mode();
    assert!(!controller.is_edit_mode());
  }

  #[tokio::test(start_paused = true)]
  async fn reload_triggers_reinjection() {
    let (controller, frame) = setup();
    controller.enable_edit_mode();
    sleep(ms(400)).await;
    assert!(frame.has_agent());

    frame.reload();
    assert_eq!(sentinel_count(&frame), 0);
    controller.on_frame_loaded();

    sleep(ms(499)).await;
    assert!(!frame.has_agent());
    sleep(ms(2)).await;
    assert!(frame.has_agent());
    assert_eq!(sentinel_count(&frame), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn running_agent_is_reenabled_not_reinjected() {
    let (controller, frame) = setup();
    controller.enable_edit_mode();
    sleep(ms(400)).await;

    controller.disable_edit_mode();
    assert_eq!(frame.with_agent(|agent, _| agent.is_edit_mode()), Some(false));

    controller.enable_edit_mode();
    sleep(ms(400)).await;

    assert_eq!(frame.with_agent(|agent, _| agent.is_edit_mode()), Some(true));
    assert_eq!(sentinel_count(&frame), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn disable_during_poll_cancels_injection() {
    let (controller, frame) = setup();
    frame.begin_navigation();

    controller.enable_edit_mode();
    sleep(ms(350)).await;
    controller.disable_edit_mode();
    frame.load_html(PAGE, "/");
    sleep(ms(1000)).await;

    assert!(!frame.has_agent());
  }

  #[tokio::test(start_paused = true)]
  async fn teardown_during_delay_cancels_injection() {
    let (controller, frame) = setup();

    controller.enable_edit_mode();
    sleep(ms(100)).await;
    controller.teardown();
    sleep(ms(1000)).await;

    assert!(!frame.has_agent());
  }

  #[tokio::test(start_paused = true)]
  async fn load_while_off_resyncs() {
    let frame = RecordingFrame::default();
    let controller = SelectorController::new();
    controller.initialize(frame.clone());

    controller.on_frame_loaded();
    sleep(ms(499)).await;
    assert!(frame.posted.lock().is_empty());

    sleep(ms(2)).await;
    assert_eq!(*frame.posted.lock(), vec![ControlMessage::ClearAllEffects]);
  }

  #[tokio::test(start_paused = true)]
  async fn listener_relays_selection() {
    let (controller, frame) = setup();
    let mut events = controller.subscribe();
    let listener = controller.listen(frame.subscribe());
    assert!(listener.is_running());

    controller.enable_edit_mode();
    sleep(ms(400)).await;
    frame.click_selector("span").unwrap();
    sleep(ms(1)).await;

    let selected = controller.last_selected().unwrap();
    assert_eq!(selected.css_path, "div#x > span.a.b:nth-child(1)");
    assert_eq!(selected.text_snippet, "hi");
    assert_eq!(selected.tag_name, "SPAN");
    assert_eq!(selected.page_locator, "?app=1");

    assert_eq!(
      events.recv().await.unwrap(),
      ControllerEvent::EditModeChanged { enabled: true }
    );
    assert!(matches!(
      events.recv().await.unwrap(),
      ControllerEvent::ElementSelected { element } if element == selected
    ));
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_listener_stops_relaying() {
    let (controller, frame) = setup();
    let listener = controller.listen(frame.subscribe());
    controller.enable_edit_mode();
    sleep(ms(400)).await;

    drop(listener);
    frame.click_selector("p").unwrap();
    sleep(ms(1)).await;

    assert_eq!(controller.last_selected(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn toggle_off_and_on_leaves_no_residue() {
    let (controller, frame) = setup();
    controller.enable_edit_mode();
    sleep(ms(400)).await;
    frame.click_selector("span").unwrap();
    frame.hover_selector("p").unwrap();

    assert!(!controller.toggle_edit_mode());
    assert!(controller.toggle_edit_mode());
    sleep(ms(400)).await;

    let residue = frame
      .with_document(|doc| {
        doc.elements_with_class(HOVER_CLASS).len() + doc.elements_with_class(SELECTED_CLASS).len()
      })
      .unwrap();
    assert_eq!(residue, 0);
    assert_eq!(frame.with_agent(|agent, _| agent.is_edit_mode()), Some(true));
  }
}
