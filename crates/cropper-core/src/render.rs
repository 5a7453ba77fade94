//! Renderer capability.
//!
//! The engine draws nothing itself. A host view asks a [`CropSurface`] for a
//! [`RenderFrame`] describing what to paint, and forwards pointer input to it.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundPoints, CropRect, Point};
use crate::gesture::{GestureOutcome, PointerEvent};
use crate::options::{CropShape, Guidelines};
use crate::session::CropEditor;
use crate::transform::Affine;
use crate::window::HandleType;

/// A straight line segment in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// Everything needed to paint one frame of the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Source pixels to view.
    pub image_matrix: Affine,
    /// Preview pixels to view; draw the preview bitmap with this.
    pub preview_matrix: Affine,
    pub bound_points: BoundPoints,
    pub crop_rect: CropRect,
    pub shape: CropShape,
    pub handles: Vec<(HandleType, Point)>,
    pub active_handle: Option<HandleType>,
    /// Rule-of-thirds lines inside the crop window; empty when hidden.
    pub guidelines: Vec<Segment>,
}

/// A drawable, touchable crop editor.
pub trait CropSurface {
    /// Frame to paint, `None` while there is nothing to show.
    fn render(&self) -> Option<RenderFrame>;

    /// Handle under `point`.
    fn hit_test(&self, point: Point) -> Option<HandleType>;

    fn apply_gesture(&mut self, event: PointerEvent) -> GestureOutcome;
}

/// Lines splitting `rect` into thirds.
pub fn thirds(rect: &CropRect) -> Vec<Segment> {
    let (w, h) = (rect.width(), rect.height());
    let mut lines = Vec::with_capacity(4);
    for k in [1.0, 2.0] {
        let x = rect.left + w * k / 3.0;
        let y = rect.top + h * k / 3.0;
        lines.push(Segment {
            from: Point::new(x, rect.top),
            to: Point::new(x, rect.bottom),
        });
        lines.push(Segment {
            from: Point::new(rect.left, y),
            to: Point::new(rect.right, y),
        });
    }
    lines
}

impl CropSurface for CropEditor {
    fn render(&self) -> Option<RenderFrame> {
        let transformer = self.transformer()?;
        let image = self.image()?;
        let crop_rect = self.window().rect();
        let active_handle = self.active_handle();

        let show_guidelines = match self.guidelines() {
            Guidelines::Off => false,
            Guidelines::On => true,
            Guidelines::OnTouch => active_handle.is_some(),
        };
        let preview_scale = image.preview_sample_size as f64;

        Some(RenderFrame {
            image_matrix: *transformer.matrix(),
            preview_matrix: Affine::scale(preview_scale, preview_scale).then(transformer.matrix()),
            bound_points: transformer.bound_points(),
            crop_rect,
            shape: self.crop_shape(),
            handles: HandleType::OUTLINE
                .iter()
                .map(|h| (*h, h.position(&crop_rect)))
                .collect(),
            active_handle,
            guidelines: if show_guidelines {
                thirds(&crop_rect)
            } else {
                Vec::new()
            },
        })
    }

    fn hit_test(&self, point: Point) -> Option<HandleType> {
        CropEditor::hit_test(self, point)
    }

    fn apply_gesture(&mut self, event: PointerEvent) -> GestureOutcome {
        self.handle_pointer(event)
    }
}
