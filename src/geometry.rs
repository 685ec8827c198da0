//! Window-relative pixel geometry shared by vision and scanning code.

use serde::{Deserialize, Serialize};

/// A point in window-relative pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in window-relative pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from its left/top/right/bottom edges.
    pub const fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// Builds a `width` x `height` rectangle centered on `center`.
    pub fn centered_at(center: Point, width: i32, height: i32) -> Self {
        let x = (center.x as f64 - width as f64 * 0.5) as i32;
        let y = (center.y as f64 - height as f64 * 0.5) as i32;
        Self::new(x, y, width, height)
    }

    pub const fn left(&self) -> i32 {
        self.x
    }

    pub const fn top(&self) -> i32 {
        self.y
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub const fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Returns the overlapping area of two rectangles, or `None` if they don't overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right > left && bottom > top {
            Some(Rect::from_edges(left, top, right, bottom))
        } else {
            None
        }
    }

    /// Width of the overlap with `other` (0 when disjoint).
    pub fn intersection_width(&self, other: &Rect) -> i32 {
        self.intersect(other).map_or(0, |r| r.width)
    }

    /// Clamps the rectangle to a `width` x `height` image and converts it to
    /// crop parameters `(x, y, w, h)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.left().clamp(0, width as i32) as u32;
        let y0 = self.top().clamp(0, height as i32) as u32;
        let x1 = self.right().clamp(0, width as i32) as u32;
        let y1 = self.bottom().clamp(0, height as i32) as u32;
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center() {
        let r = Rect::new(10, 20, 85, 105);
        assert_eq!(r.center(), Point::new(52, 72));
    }

    #[test]
    fn test_intersect_overlapping() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(80, 50, 100, 100);
        assert_eq!(a.intersect(&b), Some(Rect::new(80, 50, 20, 50)));
        assert_eq!(a.intersection_width(&b), 20);
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersect(&b), None);
        assert_eq!(a.intersection_width(&b), 0);
    }

    #[test]
    fn test_centered_at() {
        let r = Rect::centered_at(Point::new(100, 200), 80, 100);
        assert_eq!(r, Rect::new(60, 150, 80, 100));
        assert_eq!(r.center(), Point::new(100, 200));
    }

    #[test]
    fn test_clamp_to() {
        let r = Rect::new(-5, 90, 20, 20);
        assert_eq!(r.clamp_to(100, 100), (0, 90, 15, 10));
    }
}
