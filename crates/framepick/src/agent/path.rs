/*!
Selector paths and element descriptors.

A path walks from the target up through its ancestors and stops at `<body>`.
An ancestor (or the target) with an id anchors the path as `tag#id`.
Every other step is `tag.class1.class2:nth-child(n)`, with the agent's own
highlight classes left out.

When the walk reaches `<body>` without an id anchor the path is rooted at
`body`. This is a deliberate departure from the unrooted form of the plain
ancestor walk: `div:nth-child(1) > p:nth-child(2)` can also match a deeper
element of the same shape, `body > div:nth-child(1) > p:nth-child(2)` cannot.
*/

use super::styles::is_reserved_class;
use crate::dom::{css_escape, Dom};
use crate::types::{truncate_text, ElementDescriptor, TEXT_SNIPPET_LIMIT};

/// Class list without highlight classes.
pub(crate) fn visible_classes<D: Dom>(dom: &D, node: D::Node) -> Vec<String> {
  dom
    .class_list(node)
    .into_iter()
    .filter(|class| !is_reserved_class(class))
    .collect()
}

/// Build the selector path for `node`.
pub fn css_path<D: Dom>(dom: &D, node: D::Node) -> String {
  let body = dom.body();
  let mut segments = Vec::new();
  let mut current = Some(node);
  let mut anchored = false;

  while let Some(element) = current {
    if Some(element) == body {
      break;
    }
    let tag = dom.tag_name(element).to_ascii_lowercase();
    let id = dom.element_id(element);
    if !id.is_empty() {
      segments.push(format!("{tag}#{}", css_escape(&id)));
      anchored = true;
      break;
    }

    let mut segment = tag;
    for class in visible_classes(dom, element) {
      segment.push('.');
      segment.push_str(&css_escape(&class));
    }
    segment.push_str(&format!(":nth-child({})", dom.element_index(element)));
    segments.push(segment);
    current = dom.parent_element(element);
  }

  if !anchored && current.is_some() {
    segments.push("body".to_string());
  }
  segments.reverse();
  segments.join(" > ")
}

/// Summarize `node` for the host.
pub fn describe<D: Dom>(dom: &D, node: D::Node) -> ElementDescriptor {
  ElementDescriptor {
    tag_name: dom.tag_name(node),
    element_id: dom.element_id(node),
    class_names: visible_classes(dom, node).join(" "),
    text_snippet: truncate_text(&dom.text_content(node), TEXT_SNIPPET_LIMIT),
    css_path: css_path(dom, node),
    page_locator: dom.page_locator(),
    bounding_box: dom.bounding_client_rect(node),
  }
}
