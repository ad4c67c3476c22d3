/*! Core types for framepick.

Regenerate TypeScript types: `cargo test -p framepick export_bindings`
*/

#![allow(missing_docs)]

mod descriptor;
mod error;
mod event;
mod geometry;
mod ids;

pub use descriptor::{truncate_text, ElementDescriptor, TEXT_SNIPPET_LIMIT};
pub use error::{AccessError, FramepickError, FramepickResult};
pub use event::{ControllerEvent, ControllerSnapshot};
pub use geometry::{Point, Rect};
pub use ids::NodeId;
