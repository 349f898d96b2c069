//! Plane geometry shared by the tracker and the analytics.

mod polygon;
mod rect;

pub use polygon::{Point, Polygon};
pub use rect::{Rect, iou_batch};
