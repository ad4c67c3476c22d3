/*!
In-memory document.

Nodes live in an arena indexed by [`NodeId`]; relationships live in
[`NodeTree`]. Removing a node drops its whole subtree, and the removed ids
stay invalid for the rest of the document's lifetime.
*/

use std::collections::BTreeMap;

use url::Url;

use super::selector::Selector;
use super::traits::Dom;
use super::tree::NodeTree;
use crate::types::{FramepickResult, NodeId, Point, Rect};

const ROOT: NodeId = NodeId(0);

/// Base for resolving relative document URLs.
const BASE_URL: &str = "http://localhost/";

/// URL parts the agent reports as the page locator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
  /// `pathname`, percent-encoded.
  pub path: String,
  /// `?query`, or empty.
  pub search: String,
  /// `#fragment`, or empty.
  pub hash: String,
}

impl Location {
  /// Split a URL into path, search and hash, the way `window.location` does.
  /// Relative URLs resolve against `http://localhost/`; components come back
  /// percent-encoded, and a bare `?` or `#` yields an empty component.
  pub fn parse(url: &str) -> Self {
    let parsed =
      Url::parse(BASE_URL).and_then(|base| Url::options().base_url(Some(&base)).parse(url));
    let parsed = match parsed {
      Ok(parsed) => parsed,
      Err(e) => {
        log::warn!("Unparseable document URL {url:?}: {e}");
        return Self::default();
      }
    };
    let prefixed = |sigil: char, part: Option<&str>| {
      part
        .filter(|p| !p.is_empty())
        .map(|p| format!("{sigil}{p}"))
        .unwrap_or_default()
    };
    Self {
      path: parsed.path().to_string(),
      search: prefixed('?', parsed.query()),
      hash: prefixed('#', parsed.fragment()),
    }
  }

  /// `search + hash`.
  pub fn page_locator(&self) -> String {
    format!("{}{}", self.search, self.hash)
  }
}

#[derive(Debug, Clone)]
struct ElementData {
  /// Lowercase local name.
  local_name: String,
  id: String,
  classes: Vec<String>,
  attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
  Document,
  Element(ElementData),
  Text(String),
}

#[derive(Debug, Clone)]
pub(super) struct NodeData {
  kind: NodeKind,
  rect: Rect,
  live: bool,
}

/// An in-memory DOM document.
#[derive(Debug)]
pub struct Document {
  nodes: Vec<NodeData>,
  tree: NodeTree,
  location: Location,
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

impl Document {
  /// An empty document: a document node and nothing else.
  pub fn new() -> Self {
    Self {
      nodes: vec![NodeData {
        kind: NodeKind::Document,
        rect: Rect::default(),
        live: true,
      }],
      tree: NodeTree::new(),
      location: Location::default(),
    }
  }

  /// A document with the usual `<html><head></head><body></body></html>` skeleton.
  pub fn blank() -> Self {
    let mut doc = Self::new();
    let html = doc.create_element("html");
    let head = doc.create_element("head");
    let body = doc.create_element("body");
    doc.append_child(ROOT, html);
    doc.append_child(html, head);
    doc.append_child(html, body);
    doc
  }

  /// The document node itself (parent of the root element).
  pub const fn root(&self) -> NodeId {
    ROOT
  }

  pub const fn location(&self) -> &Location {
    &self.location
  }

  pub fn set_location(&mut self, location: Location) {
    self.location = location;
  }

  pub(super) fn node(&self, id: NodeId) -> Option<&NodeData> {
    self.nodes.get(id.index()).filter(|n| n.live)
  }

  fn element(&self, id: NodeId) -> Option<&ElementData> {
    match &self.node(id)?.kind {
      NodeKind::Element(data) => Some(data),
      NodeKind::Document | NodeKind::Text(_) => None,
    }
  }

  fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
    let node = self.nodes.get_mut(id.index()).filter(|n| n.live)?;
    match &mut node.kind {
      NodeKind::Element(data) => Some(data),
      NodeKind::Document | NodeKind::Text(_) => None,
    }
  }

  fn push_node(&mut self, kind: NodeKind) -> NodeId {
    let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
    self.nodes.push(NodeData {
      kind,
      rect: Rect::default(),
      live: true,
    });
    id
  }

  /// Create a detached element. The tag is stored lowercase.
  pub fn create_element(&mut self, tag: &str) -> NodeId {
    self.push_node(NodeKind::Element(ElementData {
      local_name: tag.to_ascii_lowercase(),
      id: String::new(),
      classes: Vec::new(),
      attributes: BTreeMap::new(),
    }))
  }

  /// Create a detached text node.
  pub fn create_text(&mut self, text: &str) -> NodeId {
    self.push_node(NodeKind::Text(text.to_string()))
  }

  /// Append `child` as the last child of `parent`. Returns false if either
  /// node is gone or `child` is already attached elsewhere.
  pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
    if self.node(parent).is_none() || self.node(child).is_none() {
      return false;
    }
    if self.tree.is_inclusive_ancestor(child, parent) {
      log::error!("append_child: {child} is an ancestor of {parent}");
      return false;
    }
    self.tree.append_child(parent, child)
  }

  /// Remove a node and its subtree. Removed ids become invalid.
  pub fn remove(&mut self, id: NodeId) {
    if id == ROOT {
      return;
    }
    for removed in self.tree.remove_subtree(id) {
      if let Some(node) = self.nodes.get_mut(removed.index()) {
        node.live = false;
      }
    }
  }

  pub fn is_live(&self, id: NodeId) -> bool {
    self.node(id).is_some()
  }

  pub fn is_element(&self, id: NodeId) -> bool {
    self.element(id).is_some()
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.tree.parent(id)
  }

  pub fn children(&self, id: NodeId) -> &[NodeId] {
    self.tree.children(id)
  }

  /// Element children in document order.
  pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
    self
      .children(id)
      .iter()
      .copied()
      .filter(|&child| self.is_element(child))
      .collect()
  }

  /// Lowercase local name of an element.
  pub fn local_name(&self, id: NodeId) -> Option<&str> {
    self.element(id).map(|e| e.local_name.as_str())
  }

  /// The element's `id`, if it has a non-empty one.
  pub fn id_of(&self, id: NodeId) -> Option<&str> {
    self
      .element(id)
      .map(|e| e.id.as_str())
      .filter(|s| !s.is_empty())
  }

  pub fn classes(&self, id: NodeId) -> &[String] {
    self.element(id).map_or(&[], |e| e.classes.as_slice())
  }

  /// Read an attribute. `id` and `class` reflect the element's current state.
  pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
    let element = self.element(id)?;
    match name {
      "id" => Some(element.id.clone()).filter(|s| !s.is_empty()),
      "class" => Some(element.classes.join(" ")).filter(|s| !s.is_empty()),
      _ => element.attributes.get(name).cloned(),
    }
  }

  pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
    let Some(element) = self.element_mut(id) else {
      return;
    };
    match name {
      "id" => element.id = value.to_string(),
      "class" => {
        element.classes = value.split_ascii_whitespace().map(str::to_string).collect();
      }
      _ => {
        element.attributes.insert(name.to_string(), value.to_string());
      }
    }
  }

  pub fn has_class(&self, id: NodeId, class: &str) -> bool {
    self.classes(id).iter().any(|c| c == class)
  }

  pub fn add_class(&mut self, id: NodeId, class: &str) {
    if let Some(element) = self.element_mut(id) {
      if !element.classes.iter().any(|c| c == class) {
        element.classes.push(class.to_string());
      }
    }
  }

  pub fn remove_class(&mut self, id: NodeId, class: &str) {
    if let Some(element) = self.element_mut(id) {
      element.classes.retain(|c| c != class);
    }
  }

  pub fn rect(&self, id: NodeId) -> Rect {
    self.node(id).map(|n| n.rect).unwrap_or_default()
  }

  /// Record an element's layout rectangle. There is no layout engine, so
  /// hosts and tests place elements explicitly.
  pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
    if let Some(node) = self.nodes.get_mut(id.index()).filter(|n| n.live) {
      node.rect = rect;
    }
  }

  /// Concatenated text of every descendant text node.
  pub fn text_content(&self, id: NodeId) -> String {
    let mut text = String::new();
    for node in self.descendants(id) {
      if let Some(NodeData {
        kind: NodeKind::Text(content),
        ..
      }) = self.node(node)
      {
        text.push_str(content);
      }
    }
    text
  }

  /// Replace all children with a single text node (nothing for empty text).
  pub fn set_text_content(&mut self, id: NodeId, text: &str) {
    if !self.is_element(id) {
      return;
    }
    for removed in self.tree.clear_children(id) {
      if let Some(node) = self.nodes.get_mut(removed.index()) {
        node.live = false;
      }
    }
    if !text.is_empty() {
      let text_node = self.create_text(text);
      self.append_child(id, text_node);
    }
  }

  /// `id` and all its descendants, in document (pre-)order.
  pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    if self.node(id).is_none() {
      return out;
    }
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
      out.push(current);
      stack.extend(self.children(current).iter().rev().copied());
    }
    out
  }

  /// Every attached element in document order.
  pub fn elements(&self) -> Vec<NodeId> {
    self
      .descendants(ROOT)
      .into_iter()
      .filter(|&id| self.is_element(id))
      .collect()
  }

  pub fn document_element(&self) -> Option<NodeId> {
    self.element_children(ROOT).first().copied()
  }

  fn root_child(&self, name: &str) -> Option<NodeId> {
    let html = self.document_element()?;
    self
      .element_children(html)
      .into_iter()
      .find(|&child| self.local_name(child) == Some(name))
  }

  pub fn head(&self) -> Option<NodeId> {
    self.root_child("head")
  }

  pub fn body(&self) -> Option<NodeId> {
    self.root_child("body")
  }

  /// Parent, if it is an element.
  pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
    self.parent(id).filter(|&p| self.is_element(p))
  }

  /// 1-based position among the parent's element children. Detached
  /// elements report 1.
  pub fn element_index(&self, id: NodeId) -> usize {
    let Some(parent) = self.parent(id) else {
      return 1;
    };
    self
      .element_children(parent)
      .iter()
      .position(|&sibling| sibling == id)
      .map_or(1, |i| i + 1)
  }

  /// First element in document order with this id.
  pub fn get_element_by_id(&self, element_id: &str) -> Option<NodeId> {
    if element_id.is_empty() {
      return None;
    }
    self
      .elements()
      .into_iter()
      .find(|&id| self.id_of(id) == Some(element_id))
  }

  pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
    self
      .elements()
      .into_iter()
      .filter(|&id| self.has_class(id, class))
      .collect()
  }

  /// Hit test: the element painted at `point`.
  ///
  /// Without a layout engine, "painted on top" means the last element in
  /// document order under `<body>` whose rect contains the point, which
  /// favors descendants over ancestors and later siblings over earlier ones.
  /// Elements without a rect never hit.
  pub fn element_from_point(&self, point: Point) -> Option<NodeId> {
    let body = self.body()?;
    self
      .descendants(body)
      .into_iter()
      .rev()
      .find(|&id| {
        let rect = self.rect(id);
        id != body && self.is_element(id) && !rect.is_empty() && rect.contains(point)
      })
  }

  /// First element matching `selector`, in document order.
  pub fn query_selector(&self, selector: &str) -> FramepickResult<Option<NodeId>> {
    let selector = Selector::parse(selector)?;
    Ok(selector.select(self).first().copied())
  }

  /// Every element matching `selector`, in document order.
  pub fn query_selector_all(&self, selector: &str) -> FramepickResult<Vec<NodeId>> {
    Ok(Selector::parse(selector)?.select(self))
  }
}

impl Dom for Document {
  type Node = NodeId;

  fn document_element(&self) -> Option<NodeId> {
    Document::document_element(self)
  }

  fn head(&self) -> Option<NodeId> {
    Document::head(self)
  }

  fn body(&self) -> Option<NodeId> {
    Document::body(self)
  }

  fn parent_element(&self, node: NodeId) -> Option<NodeId> {
    Document::parent_element(self, node)
  }

  fn element_index(&self, node: NodeId) -> usize {
    Document::element_index(self, node)
  }

  fn tag_name(&self, node: NodeId) -> String {
    self.local_name(node).unwrap_or_default().to_ascii_uppercase()
  }

  fn element_id(&self, node: NodeId) -> String {
    self.id_of(node).unwrap_or_default().to_string()
  }

  fn class_list(&self, node: NodeId) -> Vec<String> {
    self.classes(node).to_vec()
  }

  fn has_class(&self, node: NodeId, class: &str) -> bool {
    Document::has_class(self, node, class)
  }

  fn add_class(&mut self, node: NodeId, class: &str) {
    Document::add_class(self, node, class);
  }

  fn remove_class(&mut self, node: NodeId, class: &str) {
    Document::remove_class(self, node, class);
  }

  fn text_content(&self, node: NodeId) -> String {
    Document::text_content(self, node)
  }

  fn set_text_content(&mut self, node: NodeId, text: &str) {
    Document::set_text_content(self, node, text);
  }

  fn bounding_client_rect(&self, node: NodeId) -> Rect {
    self.rect(node)
  }

  fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
    self.is_live(ancestor) && self.is_live(node) && self.tree.is_inclusive_ancestor(ancestor, node)
  }

  fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
    Document::get_element_by_id(self, id)
  }

  fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
    Document::elements_with_class(self, class)
  }

  fn create_element(&mut self, tag: &str) -> NodeId {
    Document::create_element(self, tag)
  }

  fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
    Document::set_attribute(self, node, name, value);
  }

  fn append_child(&mut self, parent: NodeId, child: NodeId) {
    Document::append_child(self, parent, child);
  }

  fn remove(&mut self, node: NodeId) {
    Document::remove(self, node);
  }

  fn page_locator(&self) -> String {
    self.location.page_locator()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn element(doc: &mut Document, parent: NodeId, tag: &str) -> NodeId {
    let id = doc.create_element(tag);
    assert!(doc.append_child(parent, id));
    id
  }

  #[test]
  fn blank_document_has_head_and_body() {
    let doc = Document::blank();
    let html = doc.document_element().unwrap();
    assert_eq!(doc.local_name(html), Some("html"));
    assert_eq!(doc.parent_element(doc.head().unwrap()), Some(html));
    assert_eq!(doc.parent_element(doc.body().unwrap()), Some(html));
    assert_eq!(doc.parent_element(html), None, "document node is not an element");
  }

  #[test]
  fn element_index_counts_elements_only() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let text = doc.create_text("leading text");
    doc.append_child(body, text);
    let first = element(&mut doc, body, "p");
    let second = element(&mut doc, body, "p");

    assert_eq!(doc.element_index(first), 1);
    assert_eq!(doc.element_index(second), 2);
    assert_eq!(doc.element_index(doc.document_element().unwrap()), 1);
  }

  #[test]
  fn text_content_concatenates_descendants() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let div = element(&mut doc, body, "div");
    let a = doc.create_text("Hello, ");
    doc.append_child(div, a);
    let b = element(&mut doc, div, "b");
    doc.set_text_content(b, "world");

    assert_eq!(doc.text_content(div), "Hello, world");
  }

  #[test]
  fn set_text_content_replaces_children() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let div = element(&mut doc, body, "div");
    let inner = element(&mut doc, div, "span");

    doc.set_text_content(div, "plain");

    assert!(!doc.is_live(inner));
    assert_eq!(doc.element_children(div), Vec::<NodeId>::new());
    assert_eq!(doc.text_content(div), "plain");
  }

  #[test]
  fn class_list_operations_are_idempotent() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let div = element(&mut doc, body, "div");
    doc.set_attribute(div, "class", "  a   b ");

    doc.add_class(div, "c");
    doc.add_class(div, "c");
    assert_eq!(doc.classes(div), ["a", "b", "c"]);

    doc.remove_class(div, "a");
    doc.remove_class(div, "a");
    assert_eq!(doc.attribute(div, "class").as_deref(), Some("b c"));
  }

  #[test]
  fn removed_subtree_is_gone() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let div = element(&mut doc, body, "div");
    let span = element(&mut doc, div, "span");
    doc.set_attribute(span, "id", "inner");

    doc.remove(div);

    assert!(!doc.is_live(span));
    assert_eq!(doc.get_element_by_id("inner"), None);
    assert!(!Dom::contains(&doc, body, span));
  }

  #[test]
  fn append_rejects_cycles() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let div = element(&mut doc, body, "div");
    let html = doc.document_element().unwrap();

    assert!(!doc.append_child(div, html));
  }

  #[test]
  fn element_from_point_prefers_innermost() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let outer = element(&mut doc, body, "div");
    let inner = element(&mut doc, outer, "span");
    doc.set_rect(outer, Rect::new(0.0, 0.0, 200.0, 200.0));
    doc.set_rect(inner, Rect::new(50.0, 50.0, 20.0, 20.0));

    assert_eq!(doc.element_from_point(Point::new(60.0, 60.0)), Some(inner));
    assert_eq!(doc.element_from_point(Point::new(10.0, 10.0)), Some(outer));
    assert_eq!(doc.element_from_point(Point::new(500.0, 500.0)), None);
  }

  #[test]
  fn location_splits_search_and_hash() {
    let location = Location::parse("https://app.local/preview?appId=7#/about");
    assert_eq!(location.path, "/preview");
    assert_eq!(location.search, "?appId=7");
    assert_eq!(location.hash, "#/about");
    assert_eq!(location.page_locator(), "?appId=7#/about");
  }

  #[test]
  fn location_drops_empty_components() {
    assert_eq!(Location::parse("/index.html?#").page_locator(), "");
    assert_eq!(Location::parse("/index.html#top").page_locator(), "#top");
    assert_eq!(Location::parse("").page_locator(), "");
  }

  #[test]
  fn location_is_percent_encoded_like_window_location() {
    let location = Location::parse("/p?q=a b#x y");
    assert_eq!(location.path, "/p");
    assert_eq!(location.page_locator(), "?q=a%20b#x%20y");
  }

  #[test]
  fn class_attribute_splits_on_ascii_whitespace_only() {
    let mut doc = Document::blank();
    let body = doc.body().unwrap();
    let span = element(&mut doc, body, "span");
    doc.set_attribute(span, "class", "a\u{a0}b\tc\nd");

    assert_eq!(doc.classes(span), ["a\u{a0}b", "c", "d"]);
  }
}
