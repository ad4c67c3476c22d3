/*!
What the controller needs from an embedded frame.

A frame is reached in two ways: through its document, when the host is
allowed to touch it, and through message posting, which always works while
the frame has a window.
*/

use crate::agent::AgentScript;
use crate::protocol::ControlMessage;
use crate::types::AccessError;

/// Reference to an embedded frame owned by the rendering surface.
pub trait FrameHandle: Clone + Send + Sync + 'static {
  type Document: FrameDocument;

  /// Reach the frame's current document.
  ///
  /// [`AccessError::NotLoaded`] means "try again shortly"; every other error
  /// means this document will never be reachable.
  fn try_access_document(&self) -> Result<Self::Document, AccessError>;

  /// Post a message to the frame's window. False when there is no window
  /// (detached frame); the message is then dropped.
  fn post_message(&self, message: &ControlMessage) -> bool;
}

/// A reachable frame document. Operations fail once the frame has moved on
/// to another document.
pub trait FrameDocument: Send {
  /// Whether an element with this id exists.
  fn contains_element(&self, id: &str) -> Result<bool, AccessError>;

  /// Append the agent script to the document's `<head>`.
  fn append_script(&self, script: &AgentScript) -> Result<(), AccessError>;
}
