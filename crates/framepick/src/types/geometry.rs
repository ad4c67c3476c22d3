/*! Geometry types for viewport coordinates inside an embedded document. */

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// An element's render rectangle, in the embedded document's viewport space.
///
/// Field order and names follow `DOMRect` so descriptors read naturally on
/// the web side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Rect {
  pub top: f64,
  pub left: f64,
  pub width: f64,
  pub height: f64,
}

impl Rect {
  pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
    Self {
      top,
      left,
      width,
      height,
    }
  }

  pub fn right(&self) -> f64 {
    self.left + self.width
  }

  pub fn bottom(&self) -> f64 {
    self.top + self.height
  }

  /// True for rectangles with no area (unrendered or `display: none`).
  pub fn is_empty(&self) -> bool {
    self.width <= 0.0 || self.height <= 0.0
  }

  /// Check if a point falls inside. Edges are inclusive.
  pub fn contains(&self, point: Point) -> bool {
    point.x >= self.left && point.x <= self.right() && point.y >= self.top && point.y <= self.bottom()
  }
}

/// A 2D point in viewport coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS)]
#[ts(export)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub const fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}
