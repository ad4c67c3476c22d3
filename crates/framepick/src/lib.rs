/*!
Framepick - visual element selection across a frame boundary

A host page embeds a document in a frame and wants the user to point at
elements inside it. Two halves cooperate through structured messages only:

- the **agent** ([`Agent`]) lives in the embedded document, highlights what the
  pointer is over, and reports the clicked element as an [`ElementDescriptor`]
  whose `css_path` resolves back to that element;
- the **controller** ([`SelectorController`]) lives in the host, injects the
  agent when edit mode turns on, re-injects after reloads, and relays the
  agent's reports to callbacks and an event stream.

```ignore
use framepick::{LocalFrame, SelectorController};

let frame = LocalFrame::new();
frame.load_html(&markup, "/preview?app=1");

let controller = SelectorController::<LocalFrame>::builder()
    .on_element_selected(|element| println!("{}", element.css_path))
    .build();
controller.initialize(frame.clone());
let _listener = controller.listen(frame.subscribe());

controller.enable_edit_mode();   // agent injected after the settling delay
frame.click_selector("span")?;   // ELEMENT_SELECTED reaches the callback
controller.disable_edit_mode();  // agent clears every highlight
```
*/

mod agent;
mod config;
mod controller;
mod frame;
mod protocol;

pub mod dom;

mod types;
pub use types::*;

pub use crate::agent::{
  css_path, describe, is_reserved_class, Agent, AgentOptions, AgentScript, EventDisposition,
  BANNER_DURATION, BANNER_ID, BANNER_TEXT, HOVER_CLASS, SELECTED_CLASS, SENTINEL_ID, STYLESHEET,
  STYLE_ID,
};
pub use crate::config::{
  ControllerConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_INJECT_DELAY, DEFAULT_MAX_POLL_ATTEMPTS,
  DEFAULT_POLL_INTERVAL, DEFAULT_RELOAD_DELAY,
};
pub use crate::controller::{
  ElementCallback, ListenerHandle, SelectorController, SelectorControllerBuilder,
};
pub use crate::frame::{FrameDocument, FrameHandle, LocalFrame, LocalFrameDocument};
pub use crate::protocol::{AgentMessage, ControlMessage, Decoded, ElementPayload};
