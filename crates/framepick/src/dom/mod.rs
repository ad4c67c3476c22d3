/*!
DOM model the agent works against.

- `traits.rs` - `Dom`, the operations the agent needs from a document
- `document.rs` - `Document`, an in-memory arena implementation
- `tree.rs` - `NodeTree`, parent/child links for `Document`
- `selector.rs` - CSS selector matching for `Document`
- `html.rs` - building a `Document` from HTML markup
*/

mod document;
mod html;
mod selector;
mod traits;
mod tree;

pub use document::{Document, Location};
pub use selector::{css_escape, Selector};
pub use traits::Dom;
