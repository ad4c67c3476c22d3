/*! Branded ID types for type-safe node references. */

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Node identifier within a single in-memory document.
///
/// Only meaningful for the document that issued it. A reload creates a new
/// document, and ids from the old one must not be reused.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct NodeId(pub u32);

impl NodeId {
  pub(crate) const fn index(self) -> usize {
    self.0 as usize
  }
}
