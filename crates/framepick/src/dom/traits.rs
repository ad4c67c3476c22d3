/*!
DOM abstraction.

The agent only talks to a document through this trait. `Document` is the
in-memory implementation; a browser binding would implement it over real
DOM nodes.
*/

use std::fmt::Debug;
use std::hash::Hash;

use crate::types::Rect;

/// Operations the agent performs on the embedded document.
pub trait Dom {
  /// Element reference. Cheap to copy, stable for the document's lifetime.
  type Node: Copy + Eq + Hash + Debug + Send + Sync + 'static;

  /// The root element (`<html>`).
  fn document_element(&self) -> Option<Self::Node>;

  fn head(&self) -> Option<Self::Node>;

  fn body(&self) -> Option<Self::Node>;

  /// Parent element. None for the root element and detached nodes.
  fn parent_element(&self, node: Self::Node) -> Option<Self::Node>;

  /// 1-based position among the parent's element children, as `:nth-child`
  /// counts. The root element is 1.
  fn element_index(&self, node: Self::Node) -> usize;

  /// Tag name, uppercase.
  fn tag_name(&self, node: Self::Node) -> String;

  /// The `id` attribute, empty when absent.
  fn element_id(&self, node: Self::Node) -> String;

  /// Class list in attribute order.
  fn class_list(&self, node: Self::Node) -> Vec<String>;

  fn has_class(&self, node: Self::Node, class: &str) -> bool;

  fn add_class(&mut self, node: Self::Node, class: &str);

  fn remove_class(&mut self, node: Self::Node, class: &str);

  /// Concatenated text of all descendant text nodes.
  fn text_content(&self, node: Self::Node) -> String;

  /// Replace all children with a single text node.
  fn set_text_content(&mut self, node: Self::Node, text: &str);

  fn bounding_client_rect(&self, node: Self::Node) -> Rect;

  /// Inclusive: a node contains itself.
  fn contains(&self, ancestor: Self::Node, node: Self::Node) -> bool;

  fn get_element_by_id(&self, id: &str) -> Option<Self::Node>;

  /// Every element carrying `class`, in document order.
  fn elements_with_class(&self, class: &str) -> Vec<Self::Node>;

  fn create_element(&mut self, tag: &str) -> Self::Node;

  fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);

  fn append_child(&mut self, parent: Self::Node, child: Self::Node);

  /// Detach a node and its subtree from the document.
  fn remove(&mut self, node: Self::Node);

  /// Current query string plus fragment (`location.search + location.hash`).
  fn page_locator(&self) -> String;
}
