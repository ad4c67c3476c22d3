/*!
CSS selectors over a `Document`.

Selectors are parsed with scraper's selector grammar and matched by the
`selectors` crate through [`selectors::Element`], implemented here for a
`Document` node. Anything a standards engine accepts without a live
rendering (combinators, attribute selectors, `:nth-child(an+b)`, `:not`,
`:is`, `:has`, ...) works; state pseudo-classes such as `:hover` are rejected.
*/

use cssparser::{serialize_identifier, ParserInput};
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
  self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
  NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, OpaqueElement};

use super::document::Document;
use crate::types::{FramepickError, FramepickResult, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector list.
#[derive(Debug, Clone)]
pub struct Selector {
  list: SelectorList<Simple>,
}

impl Selector {
  /// Parse a selector list.
  pub fn parse(source: &str) -> FramepickResult<Self> {
    let mut input = ParserInput::new(source);
    let mut parser = cssparser::Parser::new(&mut input);
    SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
      .map(|list| Self { list })
      .map_err(|e| FramepickError::InvalidSelector {
        selector: source.to_string(),
        reason: SelectorErrorKind::from(e).to_string(),
      })
  }

  /// Check whether an element matches any selector in the list.
  pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
    self.matches_with(doc, node, &mut SelectorCaches::default())
  }

  /// Every element of `doc` that matches, in document order.
  pub fn select(&self, doc: &Document) -> Vec<NodeId> {
    let mut caches = SelectorCaches::default();
    doc
      .elements()
      .into_iter()
      .filter(|&node| self.matches_with(doc, node, &mut caches))
      .collect()
  }

  fn matches_with(&self, doc: &Document, node: NodeId, caches: &mut SelectorCaches) -> bool {
    if !doc.is_element(node) {
      return false;
    }
    let mut context = MatchingContext::new(
      MatchingMode::Normal,
      None,
      caches,
      QuirksMode::NoQuirks,
      NeedsSelectorFlags::No,
      MatchingForInvalidation::No,
    );
    matching::matches_selector_list(&self.list, &DocElement { doc, node }, &mut context)
  }
}

/// An element of a `Document`, as seen by the selector matcher.
#[derive(Debug, Clone, Copy)]
struct DocElement<'a> {
  doc: &'a Document,
  node: NodeId,
}

impl<'a> DocElement<'a> {
  const fn wrap(&self, node: NodeId) -> DocElement<'a> {
    DocElement {
      doc: self.doc,
      node,
    }
  }

  /// Previous and next element siblings.
  fn siblings(&self) -> (Option<NodeId>, Option<NodeId>) {
    let Some(parent) = self.doc.parent(self.node) else {
      return (None, None);
    };
    let siblings = self.doc.element_children(parent);
    let Some(index) = siblings.iter().position(|&s| s == self.node) else {
      return (None, None);
    };
    let previous = index.checked_sub(1).and_then(|i| siblings.get(i)).copied();
    (previous, siblings.get(index + 1).copied())
  }
}

impl Element for DocElement<'_> {
  type Impl = Simple;

  fn opaque(&self) -> OpaqueElement {
    match self.doc.node(self.node) {
      Some(data) => OpaqueElement::new(data),
      None => OpaqueElement::new(self.doc),
    }
  }

  fn parent_element(&self) -> Option<Self> {
    self.doc.parent_element(self.node).map(|p| self.wrap(p))
  }

  fn parent_node_is_shadow_root(&self) -> bool {
    false
  }

  fn containing_shadow_host(&self) -> Option<Self> {
    None
  }

  fn is_pseudo_element(&self) -> bool {
    false
  }

  fn prev_sibling_element(&self) -> Option<Self> {
    self.siblings().0.map(|s| self.wrap(s))
  }

  fn next_sibling_element(&self) -> Option<Self> {
    self.siblings().1.map(|s| self.wrap(s))
  }

  fn first_element_child(&self) -> Option<Self> {
    self
      .doc
      .element_children(self.node)
      .first()
      .map(|&c| self.wrap(c))
  }

  fn is_html_element_in_html_document(&self) -> bool {
    true
  }

  fn has_local_name(&self, local_name: &CssLocalName) -> bool {
    self.doc.local_name(self.node) == Some(&*local_name.0)
  }

  fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
    &**ns == HTML_NAMESPACE
  }

  fn is_same_type(&self, other: &Self) -> bool {
    self.doc.local_name(self.node) == other.doc.local_name(other.node)
  }

  fn attr_matches(
    &self,
    ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
    local_name: &CssLocalName,
    operation: &AttrSelectorOperation<&CssString>,
  ) -> bool {
    // Parsed attributes never carry a namespace.
    let no_namespace = match ns {
      NamespaceConstraint::Any => true,
      NamespaceConstraint::Specific(url) => url.is_empty(),
    };
    no_namespace
      && self
        .doc
        .attribute(self.node, &local_name.0)
        .is_some_and(|value| operation.eval_str(&value))
  }

  fn match_non_ts_pseudo_class(
    &self,
    _pc: &NonTSPseudoClass,
    _context: &mut MatchingContext<'_, Simple>,
  ) -> bool {
    false
  }

  fn match_pseudo_element(
    &self,
    _pe: &PseudoElement,
    _context: &mut MatchingContext<'_, Simple>,
  ) -> bool {
    false
  }

  fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

  fn is_link(&self) -> bool {
    matches!(self.doc.local_name(self.node), Some("a" | "area"))
      && self.doc.attribute(self.node, "href").is_some()
  }

  fn is_html_slot_element(&self) -> bool {
    false
  }

  fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
    self
      .doc
      .id_of(self.node)
      .is_some_and(|own| case_sensitivity.eq(id.0.as_bytes(), own.as_bytes()))
  }

  fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
    self
      .doc
      .classes(self.node)
      .iter()
      .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
  }

  fn has_custom_state(&self, _name: &CssLocalName) -> bool {
    false
  }

  fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
    None
  }

  fn is_part(&self, _name: &CssLocalName) -> bool {
    false
  }

  fn is_empty(&self) -> bool {
    self.doc.children(self.node).is_empty()
  }

  fn is_root(&self) -> bool {
    self.doc.parent(self.node) == Some(self.doc.root())
  }

  fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
    false
  }
}

/// Escape a string for use as a CSS identifier (`CSS.escape` semantics).
pub fn css_escape(ident: &str) -> String {
  let mut escaped = String::with_capacity(ident.len());
  serialize_identifier(ident, &mut escaped).map_or_else(|_| ident.to_string(), |()| escaped)
}
