use crate::{Result, UltrawideError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-dimensional point in primary-display pixel coordinates. Coordinates may
/// be negative when the primary display is not the leftmost/topmost monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Window extent in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(UltrawideError::ValidationError(format!(
                "Window dimensions must be positive, got {}x{}",
                width, height
            ))
            .into());
        }

        Ok(Self { width, height })
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

/// Window or display rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Build a rectangle from raw components, rejecting empty extents
    pub fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        Ok(Self {
            origin: Point::new(x, y),
            size: Size::new(width, height)?,
        })
    }

    pub fn x(&self) -> i32 {
        self.origin.x
    }

    pub fn y(&self) -> i32 {
        self.origin.y
    }

    pub fn width(&self) -> i32 {
        self.size.width
    }

    pub fn height(&self) -> i32 {
        self.size.height
    }

    pub fn right(&self) -> i32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> i32 {
        self.origin.y + self.size.height
    }

    /// True when the two rectangles share a region of positive area
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x() < other.right()
            && other.x() < self.right()
            && self.y() < other.bottom()
            && other.y() < self.bottom()
    }

    /// True when `other` lies entirely inside `self`
    pub fn contains(&self, other: &Rect) -> bool {
        other.x() >= self.x()
            && other.y() >= self.y()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.origin.x, self.origin.y, self.size.width, self.size.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rejects_non_positive_dimensions() {
        assert!(Size::new(0, 10).is_err());
        assert!(Size::new(10, -1).is_err());
        assert!(Size::new(1, 1).is_ok());
    }

    #[test]
    fn adjacent_rects_do_not_intersect() {
        let left = Rect::from_xywh(0, 0, 100, 100).unwrap();
        let right = Rect::from_xywh(100, 0, 100, 100).unwrap();
        assert!(!left.intersects(&right));

        let overlapping = Rect::from_xywh(99, 50, 10, 10).unwrap();
        assert!(left.intersects(&overlapping));
    }

    #[test]
    fn contains_accepts_negative_origins() {
        let display = Rect::from_xywh(-1920, 0, 5760, 1440).unwrap();
        let window = Rect::from_xywh(-7, 0, 1720, 1401).unwrap();
        assert!(display.contains(&window));
    }
}
