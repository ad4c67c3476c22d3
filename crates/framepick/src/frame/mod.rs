/*!
Embedded frames.

- `traits.rs` - `FrameHandle` / `FrameDocument`, the controller's view of a frame
- `local.rs` - `LocalFrame`, an in-process frame backed by a `Document`
*/

mod local;
mod traits;

pub use local::{LocalFrame, LocalFrameDocument};
pub use traits::{FrameDocument, FrameHandle};
