/*!
In-process embedded frame.

`LocalFrame` behaves like a browser `<iframe>` from the host's point of view.
Each load creates a new [`Document`]; while a navigation is in flight the
document is unreachable; a detached frame has no window at all. Appending the
agent script instantiates a native [`Agent`] for the current document, and
the frame feeds it synthesized pointer events and the host's control
messages. Messages the agent posts come out of [`LocalFrame::subscribe`].

Clone is cheap (Arc bump); clones share the same frame.
*/

use std::sync::Arc;

use async_broadcast::{InactiveReceiver, Receiver, Sender};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::traits::{FrameDocument, FrameHandle};
use crate::agent::{Agent, AgentScript, EventDisposition, SENTINEL_ID};
use crate::dom::Document;
use crate::protocol::{AgentMessage, ControlMessage};
use crate::types::{AccessError, FramepickError, FramepickResult, NodeId, Point};

const PARENT_CHANNEL_CAPACITY: usize = 256;

struct Loaded {
  document: Document,
  agent: Option<Agent<Document>>,
  /// Element currently under the synthesized pointer.
  pointer: Option<NodeId>,
  /// Banner deadline a dismissal task already exists for.
  banner_scheduled: Option<Instant>,
}

impl Loaded {
  fn new(document: Document) -> Self {
    Self {
      document,
      agent: None,
      pointer: None,
      banner_scheduled: None,
    }
  }

  /// Run `f` against the agent, if one was injected.
  fn dispatch<R>(&mut self, f: impl FnOnce(&mut Agent<Document>, &mut Document) -> R) -> Option<R> {
    let agent = self.agent.as_mut()?;
    Some(f(agent, &mut self.document))
  }

  /// A banner deadline nobody is waiting on yet.
  fn unscheduled_banner(&mut self) -> Option<Instant> {
    let deadline = self.agent.as_ref()?.banner_deadline()?;
    if self.banner_scheduled == Some(deadline) {
      return None;
    }
    self.banner_scheduled = Some(deadline);
    Some(deadline)
  }
}

enum Content {
  /// Never loaded.
  Blank,
  /// Navigation in flight.
  Loading,
  Loaded(Box<Loaded>),
  Detached,
}

struct FrameInner {
  content: Content,
  /// Bumped on every load, navigation and detach.
  generation: u64,
  cross_origin: bool,
  /// Last loaded markup and URL, for `reload`.
  source: Option<(String, String)>,
}

impl FrameInner {
  fn check(&self, generation: u64) -> Result<(), AccessError> {
    if matches!(self.content, Content::Detached) {
      return Err(AccessError::Detached);
    }
    if self.generation != generation {
      return Err(AccessError::Navigated);
    }
    if self.cross_origin {
      return Err(AccessError::CrossOrigin);
    }
    Ok(())
  }
}

/// An embedded frame living in this process.
pub struct LocalFrame {
  inner: Arc<Mutex<FrameInner>>,
  parent_tx: Sender<AgentMessage>,
  parent_keepalive: InactiveReceiver<AgentMessage>,
}

impl Clone for LocalFrame {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      parent_tx: self.parent_tx.clone(),
      parent_keepalive: self.parent_keepalive.clone(),
    }
  }
}

impl std::fmt::Debug for LocalFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let inner = self.inner.lock();
    f.debug_struct("LocalFrame")
      .field("generation", &inner.generation)
      .field("cross_origin", &inner.cross_origin)
      .finish_non_exhaustive()
  }
}

impl Default for LocalFrame {
  fn default() -> Self {
    Self::new()
  }
}

impl LocalFrame {
  /// A frame with no document yet.
  pub fn new() -> Self {
    let (mut tx, rx) = async_broadcast::broadcast(PARENT_CHANNEL_CAPACITY);
    tx.set_overflow(true);
    Self {
      inner: Arc::new(Mutex::new(FrameInner {
        content: Content::Blank,
        generation: 0,
        cross_origin: false,
        source: None,
      })),
      parent_tx: tx,
      parent_keepalive: rx.deactivate(),
    }
  }

  /// Messages posted by the frame's agent to its parent.
  pub fn subscribe(&self) -> Receiver<AgentMessage> {
    self.parent_keepalive.activate_cloned()
  }

  /// Load a new document. Any agent in the previous document is gone.
  pub fn load_html(&self, markup: &str, url: &str) {
    let mut inner = self.inner.lock();
    if matches!(inner.content, Content::Detached) {
      log::warn!("load_html on a detached frame");
      return;
    }
    inner.generation += 1;
    inner.content = Content::Loaded(Box::new(Loaded::new(Document::parse_html_at(markup, url))));
    inner.source = Some((markup.to_string(), url.to_string()));
  }

  /// Start navigating away. The current document becomes unreachable until
  /// the next load.
  pub fn begin_navigation(&self) {
    let mut inner = self.inner.lock();
    if matches!(inner.content, Content::Detached) {
      return;
    }
    inner.generation += 1;
    inner.content = Content::Loading;
  }

  /// Load the last markup again as a fresh document. False if nothing was
  /// ever loaded or the frame is detached.
  pub fn reload(&self) -> bool {
    let source = self.inner.lock().source.clone();
    let Some((markup, url)) = source else {
      return false;
    };
    if self.is_detached() {
      return false;
    }
    self.load_html(&markup, &url);
    true
  }

  /// Remove the frame from the host page.
  pub fn detach(&self) {
    let mut inner = self.inner.lock();
    inner.generation += 1;
    inner.content = Content::Detached;
  }

  /// Mark the frame's content as belonging to another origin. Its document
  /// can no longer be reached, but messages still flow.
  pub fn set_cross_origin(&self, cross_origin: bool) {
    self.inner.lock().cross_origin = cross_origin;
  }

  pub fn is_detached(&self) -> bool {
    matches!(self.inner.lock().content, Content::Detached)
  }

  /// Whether the current document runs an agent.
  pub fn has_agent(&self) -> bool {
    self.with_loaded(|loaded| loaded.agent.is_some()).unwrap_or(false)
  }

  /// Read the current document.
  pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> Option<R> {
    self.with_loaded(|loaded| f(&loaded.document))
  }

  /// Change the current document, e.g. to lay out elements.
  pub fn with_document_mut<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Option<R> {
    self.with_loaded(|loaded| f(&mut loaded.document))
  }

  /// Inspect the agent alongside its document.
  pub fn with_agent<R>(&self, f: impl FnOnce(&Agent<Document>, &Document) -> R) -> Option<R> {
    self.with_loaded(|loaded| loaded.agent.as_ref().map(|agent| f(agent, &loaded.document)))
      .flatten()
  }

  /// First element matching `selector` in the current document.
  pub fn query(&self, selector: &str) -> FramepickResult<NodeId> {
    self
      .with_document(|doc| doc.query_selector(selector))
      .ok_or(FramepickError::Access(AccessError::NotLoaded))??
      .ok_or_else(|| FramepickError::NoMatch(selector.to_string()))
  }

  /// Pointer enters `target`.
  pub fn pointer_over(&self, target: NodeId) {
    self.with_loaded(|loaded| {
      loaded.pointer = Some(target);
      loaded.dispatch(|agent, doc| agent.pointer_over(doc, target));
    });
  }

  /// Pointer leaves `target` for `related` (None: left the document).
  pub fn pointer_out(&self, target: NodeId, related: Option<NodeId>) {
    self.with_loaded(|loaded| {
      loaded.pointer = related;
      loaded.dispatch(|agent, doc| agent.pointer_out(doc, target, related));
    });
  }

  /// Move the pointer to `point`, firing out/over when the element under it
  /// changes. Returns the element now under the pointer.
  pub fn move_pointer(&self, point: Point) -> Option<NodeId> {
    self
      .with_loaded(|loaded| {
        let previous = loaded.pointer;
        let next = loaded.document.element_from_point(point);
        if previous == next {
          return next;
        }
        loaded.pointer = next;
        loaded.dispatch(|agent, doc| {
          if let Some(previous) = previous {
            agent.pointer_out(doc, previous, next);
          }
          if let Some(next) = next {
            agent.pointer_over(doc, next);
          }
        });
        next
      })
      .flatten()
  }

  /// Click `target`. Without an agent the click passes through.
  pub fn click(&self, target: NodeId) -> EventDisposition {
    self
      .with_loaded(|loaded| loaded.dispatch(|agent, doc| agent.click(doc, target)))
      .flatten()
      .unwrap_or(EventDisposition::PASS)
  }

  /// Click whatever is painted at `point`.
  pub fn click_at(&self, point: Point) -> Option<EventDisposition> {
    let target = self.with_document(|doc| doc.element_from_point(point)).flatten()?;
    Some(self.click(target))
  }

  /// Move the pointer onto the first element matching `selector`.
  pub fn hover_selector(&self, selector: &str) -> FramepickResult<NodeId> {
    let target = self.query(selector)?;
    let previous = self.with_loaded(|loaded| loaded.pointer).flatten();
    if let Some(previous) = previous.filter(|&p| p != target) {
      self.pointer_out(previous, Some(target));
    }
    self.pointer_over(target);
    Ok(target)
  }

  /// Click the first element matching `selector`.
  pub fn click_selector(&self, selector: &str) -> FramepickResult<EventDisposition> {
    let target = self.query(selector)?;
    Ok(self.click(target))
  }

  /// Run `f` on the loaded document, then arm the banner timer if the agent
  /// showed a new banner.
  fn with_loaded<R>(&self, f: impl FnOnce(&mut Loaded) -> R) -> Option<R> {
    let mut inner = self.inner.lock();
    let generation = inner.generation;
    let Content::Loaded(loaded) = &mut inner.content else {
      return None;
    };
    let result = f(loaded);
    let banner = loaded.unscheduled_banner();
    drop(inner);

    if let Some(deadline) = banner {
      self.schedule_banner_dismissal(generation, deadline);
    }
    Some(result)
  }

  fn schedule_banner_dismissal(&self, generation: u64, deadline: Instant) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      log::warn!("No tokio runtime, edit-mode banner will not auto-dismiss");
      return;
    };
    let frame = self.clone();
    runtime.spawn(async move {
      tokio::time::sleep_until(deadline).await;
      frame.expire_banner(generation);
    });
  }

  fn expire_banner(&self, generation: u64) {
    let mut inner = self.inner.lock();
    if inner.generation != generation {
      return;
    }
    if let Content::Loaded(loaded) = &mut inner.content {
      loaded.dispatch(|agent, doc| agent.expire_banner(doc, Instant::now()));
    }
  }

  fn append_script(&self, generation: u64, script: &AgentScript) -> Result<(), AccessError> {
    let parent_tx = self.parent_tx.clone();
    let mut inner = self.inner.lock();
    inner.check(generation)?;
    let Content::Loaded(loaded) = &mut inner.content else {
      return Err(AccessError::NotLoaded);
    };

    let document = &mut loaded.document;
    let Some(head) = document.head().or_else(|| document.document_element()) else {
      return Err(AccessError::NotLoaded);
    };
    let element = document.create_element("script");
    document.set_attribute(element, "id", script.id());
    document.set_text_content(element, script.source());
    document.append_child(head, element);

    if script.id() == SENTINEL_ID {
      if loaded.agent.is_some() {
        log::debug!("Agent script appended twice, keeping the running agent");
      } else {
        let mut agent = Agent::new(parent_tx, script.options());
        agent.inject(&mut loaded.document);
        loaded.agent = Some(agent);
      }
    }
    let banner = loaded.unscheduled_banner();
    drop(inner);

    if let Some(deadline) = banner {
      self.schedule_banner_dismissal(generation, deadline);
    }
    Ok(())
  }
}

impl FrameHandle for LocalFrame {
  type Document = LocalFrameDocument;

  fn try_access_document(&self) -> Result<LocalFrameDocument, AccessError> {
    let inner = self.inner.lock();
    inner.check(inner.generation)?;
    match inner.content {
      Content::Loaded(_) => Ok(LocalFrameDocument {
        frame: self.clone(),
        generation: inner.generation,
      }),
      Content::Blank | Content::Loading => Err(AccessError::NotLoaded),
      Content::Detached => Err(AccessError::Detached),
    }
  }

  fn post_message(&self, message: &ControlMessage) -> bool {
    if self.is_detached() {
      return false;
    }
    let delivered = self
      .with_loaded(|loaded| loaded.dispatch(|agent, doc| agent.handle_control(doc, *message)))
      .flatten();
    if delivered.is_none() {
      log::trace!("{} posted to a frame without an agent", message.kind());
    }
    true
  }
}

/// Handle to one specific document of a [`LocalFrame`].
#[derive(Debug, Clone)]
pub struct LocalFrameDocument {
  frame: LocalFrame,
  generation: u64,
}

impl FrameDocument for LocalFrameDocument {
  fn contains_element(&self, id: &str) -> Result<bool, AccessError> {
    let inner = self.frame.inner.lock();
    inner.check(self.generation)?;
    match &inner.content {
      Content::Loaded(loaded) => Ok(loaded.document.get_element_by_id(id).is_some()),
      Content::Blank | Content::Loading => Err(AccessError::NotLoaded),
      Content::Detached => Err(AccessError::Detached),
    }
  }

  fn append_script(&self, script: &AgentScript) -> Result<(), AccessError> {
    self.frame.append_script(self.generation, script)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::agent::{AgentOptions, BANNER_ID, HOVER_CLASS, SELECTED_CLASS};
  use crate::types::Rect;
  use std::time::Duration;

  const PAGE: &str = r#"<div id="x"><span class="a b">hi</span></div><p>para</p>"#;

  fn loaded_frame() -> LocalFrame {
    let frame = LocalFrame::new();
    frame.load_html(PAGE, "/preview?app=1");
    frame
  }

  fn inject(frame: &LocalFrame) {
    let doc = frame.try_access_document().unwrap();
    doc.append_script(&AgentScript::default()).unwrap();
  }

  #[test]
  fn blank_and_loading_frames_are_not_loaded() {
    let frame = LocalFrame::new();
    assert_eq!(frame.try_access_document().unwrap_err(), AccessError::NotLoaded);

    frame.load_html(PAGE, "/");
    frame.begin_navigation();
    assert_eq!(frame.try_access_document().unwrap_err(), AccessError::NotLoaded);
  }

  #[test]
  fn cross_origin_and_detached_frames_refuse_access() {
    let frame = loaded_frame();
    frame.set_cross_origin(true);
    assert_eq!(frame.try_access_document().unwrap_err(), AccessError::CrossOrigin);

    frame.detach();
    assert_eq!(frame.try_access_document().unwrap_err(), AccessError::Detached);
    assert!(!frame.post_message(&ControlMessage::ClearSelection));
  }

  #[test]
  fn stale_document_handle_reports_navigation() {
    let frame = loaded_frame();
    let doc = frame.try_access_document().unwrap();

    frame.load_html(PAGE, "/other");

    assert_eq!(doc.contains_element("x").unwrap_err(), AccessError::Navigated);
    assert_eq!(
      doc.append_script(&AgentScript::default()).unwrap_err(),
      AccessError::Navigated
    );
  }

  #[test]
  fn sentinel_script_starts_an_agent() {
    let frame = loaded_frame();
    let doc = frame.try_access_document().unwrap();
    assert!(!doc.contains_element(SENTINEL_ID).unwrap());

    doc.append_script(&AgentScript::default()).unwrap();

    assert!(doc.contains_element(SENTINEL_ID).unwrap());
    assert!(frame.has_agent());
    assert_eq!(frame.with_agent(|agent, _| agent.is_edit_mode()), Some(true));
  }

  #[test]
  fn reload_drops_agent() {
    let frame = loaded_frame();
    inject(&frame);

    assert!(frame.reload());

    assert!(!frame.has_agent());
    let doc = frame.try_access_document().unwrap();
    assert!(!doc.contains_element(SENTINEL_ID).unwrap());
    assert!(doc.contains_element("x").unwrap());
  }

  #[test]
  fn click_reaches_parent() {
    let frame = loaded_frame();
    let mut rx = frame.subscribe();
    inject(&frame);

    let disposition = frame.click_selector("span").unwrap();

    assert_eq!(disposition, EventDisposition::CONSUMED);
    let message = rx.try_recv().unwrap();
    let descriptor = message.descriptor().unwrap();
    assert_eq!(descriptor.css_path, "div#x > span.a.b:nth-child(1)");
    assert_eq!(descriptor.page_locator, "?app=1");
  }

  #[test]
  fn click_without_agent_passes_through() {
    let frame = loaded_frame();
    assert_eq!(frame.click_selector("span").unwrap(), EventDisposition::PASS);
  }

  #[test]
  fn unknown_selector_is_no_match() {
    let frame = loaded_frame();
    assert!(matches!(frame.query("table"), Err(FramepickError::NoMatch(_))));
    assert!(matches!(
      LocalFrame::new().query("p"),
      Err(FramepickError::Access(AccessError::NotLoaded))
    ));
  }

  #[test]
  fn control_messages_reach_agent() {
    let frame = loaded_frame();
    inject(&frame);
    frame.click_selector("p").unwrap();

    assert!(frame.post_message(&ControlMessage::ClearAllEffects));

    let (edit_mode, selected) = frame
      .with_agent(|agent, doc| (agent.is_edit_mode(), doc.elements_with_class(SELECTED_CLASS)))
      .unwrap();
    assert!(!edit_mode);
    assert!(selected.is_empty());
  }

  #[test]
  fn pointer_movement_hovers_hit_element() {
    let frame = loaded_frame();
    inject(&frame);
    let (span, p) = frame
      .with_document_mut(|doc| {
        let span = doc.query_selector("span").unwrap().unwrap();
        let p = doc.query_selector("p").unwrap().unwrap();
        doc.set_rect(span, Rect::new(0.0, 0.0, 100.0, 20.0));
        doc.set_rect(p, Rect::new(0.0, 40.0, 100.0, 20.0));
        (span, p)
      })
      .unwrap();

    assert_eq!(frame.move_pointer(Point::new(10.0, 10.0)), Some(span));
    assert_eq!(frame.move_pointer(Point::new(10.0, 50.0)), Some(p));

    let hovered = frame.with_document(|doc| doc.elements_with_class(HOVER_CLASS)).unwrap();
    assert_eq!(hovered, vec![p]);

    frame.move_pointer(Point::new(500.0, 500.0));
    let hovered = frame.with_document(|doc| doc.elements_with_class(HOVER_CLASS)).unwrap();
    assert!(hovered.is_empty());
  }

  #[test]
  fn click_at_selects_painted_element() {
    let frame = loaded_frame();
    inject(&frame);
    let mut rx = frame.subscribe();
    let p = frame
      .with_document_mut(|doc| {
        let p = doc.query_selector("p").unwrap().unwrap();
        doc.set_rect(p, Rect::new(0.0, 40.0, 100.0, 20.0));
        p
      })
      .unwrap();

    assert_eq!(frame.click_at(Point::new(500.0, 500.0)), None);
    assert_eq!(frame.click_at(Point::new(10.0, 50.0)), Some(EventDisposition::CONSUMED));

    let selected = frame.with_document(|doc| doc.elements_with_class(SELECTED_CLASS)).unwrap();
    assert_eq!(selected, vec![p]);
    assert_eq!(rx.try_recv().unwrap().kind(), "ELEMENT_SELECTED");
  }

  #[test]
  fn hover_reporting_follows_script_options() {
    let frame = loaded_frame();
    let mut rx = frame.subscribe();
    let doc = frame.try_access_document().unwrap();
    doc
      .append_script(&AgentScript::new(AgentOptions { report_hover: true }))
      .unwrap();

    frame.hover_selector("span").unwrap();

    assert_eq!(rx.try_recv().unwrap().kind(), "ELEMENT_HOVER");
  }

  #[tokio::test(start_paused = true)]
  async fn banner_dismisses_itself() {
    let frame = loaded_frame();
    inject(&frame);
    let has_banner = || {
      frame
        .with_document(|doc| doc.get_element_by_id(BANNER_ID).is_some())
        .unwrap()
    };
    assert!(has_banner());

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert!(has_banner());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!has_banner());
  }

  #[tokio::test(start_paused = true)]
  async fn banner_timer_ignores_replaced_document() {
    let frame = loaded_frame();
    inject(&frame);
    tokio::time::sleep(Duration::from_secs(2)).await;

    frame.reload();
    inject(&frame);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let has_banner = frame
      .with_document(|doc| doc.get_element_by_id(BANNER_ID).is_some())
      .unwrap();
    assert!(has_banner, "old timer must not dismiss the new banner");
  }
}
