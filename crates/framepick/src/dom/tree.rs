/*!
Tree relationship management for `Document`.

Single source of truth for parent-child relationships.
All mutations go through methods that maintain bidirectional link invariants.

## Invariants

1. **Single parent**: Each child has exactly ONE parent while attached.
2. **Bidirectional consistency**: If `parent_of[child] = parent`, then
   `children_of[parent]` contains `child`, and vice versa.
3. **Ordered children**: `children_of[parent]` is in document order.
4. **No implicit moves**: appending an attached node elsewhere is rejected.
   Callers detach first, as `Document::remove` does.
*/

use crate::types::NodeId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(super) struct NodeTree {
  parent_of: HashMap<NodeId, NodeId>,
  children_of: HashMap<NodeId, Vec<NodeId>>,
}

impl NodeTree {
  pub(super) fn new() -> Self {
    Self::default()
  }

  pub(super) fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.parent_of.get(&id).copied()
  }

  /// Children in document order (empty slice if none).
  pub(super) fn children(&self, id: NodeId) -> &[NodeId] {
    self.children_of.get(&id).map_or(&[], Vec::as_slice)
  }

  /// Append a child.
  ///
  /// - Same parent: no-op (idempotent)
  /// - No parent: appended as last child
  /// - Different parent: rejected
  pub(super) fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
    if parent == child {
      log::error!("append_child: cannot append {child} to itself");
      return false;
    }
    if let Some(&existing_parent) = self.parent_of.get(&child) {
      if existing_parent != parent {
        log::error!(
          "append_child: node {child} is attached to {existing_parent}, \
           detach it before appending to {parent}"
        );
      }
      return existing_parent == parent;
    }

    self.parent_of.insert(child, parent);
    self.children_of.entry(parent).or_default().push(child);
    true
  }

  /// Check if `ancestor` is `node` or one of its ancestors.
  pub(super) fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
      if id == ancestor {
        return true;
      }
      current = self.parent(id);
    }
    false
  }

  /// Detach a node and drop the links of its whole subtree.
  /// Returns removed IDs (the root first). Iterative to avoid stack overflow on deep trees.
  pub(super) fn remove_subtree(&mut self, root: NodeId) -> Vec<NodeId> {
    let mut removed = Vec::new();
    let mut queue = vec![root];

    while let Some(id) = queue.pop() {
      if let Some(parent_id) = self.parent_of.remove(&id) {
        if let Some(siblings) = self.children_of.get_mut(&parent_id) {
          siblings.retain(|&sid| sid != id);
        }
      }

      if let Some(children) = self.children_of.remove(&id) {
        queue.extend(children);
      }

      removed.push(id);
    }

    removed
  }

  /// Drop every child of `parent`, returning all removed descendants.
  pub(super) fn clear_children(&mut self, parent: NodeId) -> Vec<NodeId> {
    let children = self.children(parent).to_vec();
    children
      .into_iter()
      .flat_map(|child| self.remove_subtree(child))
      .collect()
  }
}
