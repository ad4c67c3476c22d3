/*! Error types for framepick operations. */

use super::NodeId;

/// Why a frame's document could not be reached.
///
/// `NotLoaded` is the only transient case: the document may appear later and
/// callers poll for it. Every other variant means this attempt will never
/// succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
  #[error("Frame document is not loaded yet")]
  NotLoaded,

  #[error("Frame document is cross-origin")]
  CrossOrigin,

  #[error("Frame is detached from the host document")]
  Detached,

  #[error("Frame navigated away from this document")]
  Navigated,
}

impl AccessError {
  /// Whether polling again may succeed.
  pub const fn is_transient(self) -> bool {
    matches!(self, Self::NotLoaded)
  }
}

/// Errors that can occur during framepick operations.
#[derive(Debug, thiserror::Error)]
pub enum FramepickError {
  #[error(transparent)]
  Access(#[from] AccessError),

  #[error("Invalid selector '{selector}': {reason}")]
  InvalidSelector { selector: String, reason: String },

  #[error("Node not found: {0}")]
  NodeNotFound(NodeId),

  #[error("No element matches selector '{0}'")]
  NoMatch(String),

  #[error("Malformed message: {0}")]
  Protocol(#[from] serde_json::Error),
}

/// Result type for framepick operations.
pub type FramepickResult<T> = Result<T, FramepickError>;
