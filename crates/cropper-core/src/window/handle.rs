//! Crop window handles.

use serde::{Deserialize, Serialize};

use crate::geometry::{CropRect, Point};

/// A draggable control of the crop window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleType {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    /// The window body; moves the whole window.
    Center,
}

impl HandleType {
    /// Handles that sit on the window outline, corners first so they win ties
    /// during hit testing.
    pub const OUTLINE: [HandleType; 8] = [
        HandleType::TopLeft,
        HandleType::TopRight,
        HandleType::BottomLeft,
        HandleType::BottomRight,
        HandleType::Top,
        HandleType::Bottom,
        HandleType::Left,
        HandleType::Right,
    ];

    pub fn is_edge(self) -> bool {
        matches!(
            self,
            HandleType::Top | HandleType::Bottom | HandleType::Left | HandleType::Right
        )
    }

    #[inline]
    pub fn moves_left(self) -> bool {
        matches!(
            self,
            HandleType::TopLeft | HandleType::BottomLeft | HandleType::Left
        )
    }

    #[inline]
    pub fn moves_right(self) -> bool {
        matches!(
            self,
            HandleType::TopRight | HandleType::BottomRight | HandleType::Right
        )
    }

    #[inline]
    pub fn moves_top(self) -> bool {
        matches!(
            self,
            HandleType::TopLeft | HandleType::TopRight | HandleType::Top
        )
    }

    #[inline]
    pub fn moves_bottom(self) -> bool {
        matches!(
            self,
            HandleType::BottomLeft | HandleType::BottomRight | HandleType::Bottom
        )
    }

    /// Where the handle is drawn on `rect`.
    pub fn position(self, rect: &CropRect) -> Point {
        let c = rect.center();
        match self {
            HandleType::TopLeft => Point::new(rect.left, rect.top),
            HandleType::TopRight => Point::new(rect.right, rect.top),
            HandleType::BottomLeft => Point::new(rect.left, rect.bottom),
            HandleType::BottomRight => Point::new(rect.right, rect.bottom),
            HandleType::Top => Point::new(c.x, rect.top),
            HandleType::Bottom => Point::new(c.x, rect.bottom),
            HandleType::Left => Point::new(rect.left, c.y),
            HandleType::Right => Point::new(rect.right, c.y),
            HandleType::Center => c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_moved_by_handle() {
        assert!(HandleType::TopLeft.moves_left() && HandleType::TopLeft.moves_top());
        assert!(!HandleType::TopLeft.moves_right() && !HandleType::TopLeft.moves_bottom());
        assert!(HandleType::Right.moves_right());
        assert!(!HandleType::Right.moves_top() && !HandleType::Right.moves_bottom());

        let center = HandleType::Center;
        assert!(!center.moves_left() && !center.moves_right());
        assert!(!center.is_edge());
    }

    #[test]
    fn test_handle_positions() {
        let rect = CropRect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(HandleType::BottomRight.position(&rect), Point::new(100.0, 50.0));
        assert_eq!(HandleType::Top.position(&rect), Point::new(50.0, 0.0));
        assert_eq!(HandleType::Left.position(&rect), Point::new(0.0, 25.0));
        assert_eq!(HandleType::Center.position(&rect), Point::new(50.0, 25.0));
    }

    #[test]
    fn test_outline_has_no_center() {
        assert!(!HandleType::OUTLINE.contains(&HandleType::Center));
        assert_eq!(HandleType::OUTLINE.iter().filter(|h| h.is_edge()).count(), 4);
    }
}
