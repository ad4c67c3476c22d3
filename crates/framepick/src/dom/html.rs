/*! Building a `Document` from HTML markup. */

use scraper::{Html, Node};

use super::document::{Document, Location};

impl Document {
  /// Parse a full HTML document. The parser fills in missing `<html>`,
  /// `<head>` and `<body>` the way browsers do. Comments, doctypes and
  /// processing instructions are dropped.
  pub fn parse_html(markup: &str) -> Self {
    let html = Html::parse_document(markup);
    let mut doc = Self::new();
    let mut stack = vec![(html.tree.root(), doc.root())];

    while let Some((source, target)) = stack.pop() {
      for child in source.children() {
        let created = match child.value() {
          Node::Element(element) => {
            let id = doc.create_element(element.name());
            for (name, value) in element.attrs() {
              doc.set_attribute(id, name, value);
            }
            Some(id)
          }
          Node::Text(text) => Some(doc.create_text(text)),
          _ => None,
        };
        if let Some(id) = created {
          doc.append_child(target, id);
          stack.push((child, id));
        }
      }
    }
    doc
  }

  /// Parse markup served from `url`.
  pub fn parse_html_at(markup: &str, url: &str) -> Self {
    let mut doc = Self::parse_html(markup);
    doc.set_location(Location::parse(url));
    doc
  }
}
