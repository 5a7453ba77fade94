//! Mapping between view space and source pixel space.
//!
//! The image-to-view matrix is composed, in application order, of:
//! 1. Translation of the image center to the origin
//! 2. Clockwise rotation in 90 degree steps
//! 3. Horizontal/vertical mirroring in view axes
//! 4. Base fit-to-view scale (from [`ScaleType`]) times user zoom
//! 5. Translation to the view center plus the zoom offset
//!
//! Rotation, flip and zoom keep the image point under the view center fixed,
//! so a crop window mapped through [`CoordinateTransformer::to_view_space`]
//! stays on the same image content.

use tracing::debug;

use crate::geometry::{BoundPoints, CropRect, Point, GEOMETRY_EPSILON};
use crate::options::ScaleType;

use super::matrix::Affine;

/// Every component of the image-to-view transform.
///
/// Only [`CoordinateTransformer`] mutates this, through its rotate, flip and
/// zoom operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTransformState {
    /// Fit-to-view scale along the view's x and y axes.
    pub base_scale: (f64, f64),
    /// User zoom, `1.0..=max_zoom`.
    pub zoom: f64,
    /// Clockwise rotation, one of 0, 90, 180, 270.
    pub rotation: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Translation relative to the centered placement, in view pixels.
    pub offset: Point,
}

impl Default for ImageTransformState {
    fn default() -> Self {
        Self {
            base_scale: (1.0, 1.0),
            zoom: 1.0,
            rotation: 0,
            flip_horizontal: false,
            flip_vertical: false,
            offset: Point::default(),
        }
    }
}

/// Owns the image transform and converts rectangles between spaces.
#[derive(Debug, Clone)]
pub struct CoordinateTransformer {
    image_width: f64,
    image_height: f64,
    view_width: f64,
    view_height: f64,
    scale_type: ScaleType,
    max_zoom: f64,
    state: ImageTransformState,
    matrix: Affine,
    inverse: Affine,
}

impl CoordinateTransformer {
    /// Create a transformer for an upright image of `image_size` shown in a
    /// view of `view_size`.
    pub fn new(
        image_size: (u32, u32),
        view_size: (f64, f64),
        scale_type: ScaleType,
        max_zoom: f64,
    ) -> Self {
        let mut transformer = Self {
            image_width: image_size.0.max(1) as f64,
            image_height: image_size.1.max(1) as f64,
            view_width: view_size.0.max(1.0),
            view_height: view_size.1.max(1.0),
            scale_type,
            max_zoom: max_zoom.max(1.0),
            state: ImageTransformState::default(),
            matrix: Affine::IDENTITY,
            inverse: Affine::IDENTITY,
        };
        transformer.refresh_base_scale();
        transformer.rebuild();
        transformer
    }

    pub fn state(&self) -> &ImageTransformState {
        &self.state
    }

    pub fn image_size(&self) -> (f64, f64) {
        (self.image_width, self.image_height)
    }

    pub fn view_size(&self) -> (f64, f64) {
        (self.view_width, self.view_height)
    }

    pub fn view_rect(&self) -> CropRect {
        CropRect::new(0.0, 0.0, self.view_width, self.view_height)
    }

    pub fn image_rect(&self) -> CropRect {
        CropRect::new(0.0, 0.0, self.image_width, self.image_height)
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    pub fn rotation(&self) -> u32 {
        self.state.rotation
    }

    pub fn zoom(&self) -> f64 {
        self.state.zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn is_flipped_horizontally(&self) -> bool {
        self.state.flip_horizontal
    }

    pub fn is_flipped_vertically(&self) -> bool {
        self.state.flip_vertical
    }

    /// Image-to-view matrix.
    pub fn matrix(&self) -> &Affine {
        &self.matrix
    }

    pub fn map_to_view(&self, p: Point) -> Point {
        self.matrix.map_point(p)
    }

    pub fn map_to_image(&self, p: Point) -> Point {
        self.inverse.map_point(p)
    }

    /// Map a view-space rectangle into source pixel space.
    pub fn to_image_space(&self, view_rect: &CropRect) -> CropRect {
        self.inverse.map_rect(view_rect)
    }

    /// Map a source pixel rectangle into view space.
    pub fn to_view_space(&self, image_rect: &CropRect) -> CropRect {
        self.matrix.map_rect(image_rect)
    }

    /// Map each corner of a view rectangle into source pixel space, keeping
    /// the corner order of the view rectangle.
    pub fn to_image_points(&self, view_rect: &CropRect) -> [Point; 4] {
        view_rect.corners().map(|p| self.inverse.map_point(p))
    }

    /// The image's four corners in view coordinates.
    pub fn bound_points(&self) -> BoundPoints {
        BoundPoints(self.image_rect().corners().map(|p| self.matrix.map_point(p)))
    }

    /// Part of the view covered by the image, `None` when the image has been
    /// moved completely out of view.
    pub fn visible_bounds(&self) -> Option<CropRect> {
        self.bound_points().bounding_rect().intersect(&self.view_rect())
    }

    /// Source pixels per view pixel along the view's x and y axes.
    pub fn source_pixels_per_view_pixel(&self) -> (f64, f64) {
        let (sx, sy) = self.state.base_scale;
        (1.0 / (sx * self.state.zoom), 1.0 / (sy * self.state.zoom))
    }

    /// Rotate clockwise by `degrees`, rounded to the nearest quarter turn.
    pub fn rotate(&mut self, degrees: i32) {
        let quarters = (degrees as f64 / 90.0).round() as i32;
        if quarters.rem_euclid(4) == 0 {
            return;
        }
        let anchor = self.center_anchor();
        let rotation = (self.state.rotation as i32 + quarters * 90).rem_euclid(360);
        self.state.rotation = rotation as u32;
        self.refresh_base_scale();
        self.anchor_at_view_center(anchor);
        debug!(rotation = self.state.rotation, "image rotated");
    }

    /// Mirror the displayed image left to right.
    pub fn flip_horizontal(&mut self) {
        let anchor = self.center_anchor();
        self.state.flip_horizontal = !self.state.flip_horizontal;
        self.anchor_at_view_center(anchor);
    }

    /// Mirror the displayed image top to bottom.
    pub fn flip_vertical(&mut self) {
        let anchor = self.center_anchor();
        self.state.flip_vertical = !self.state.flip_vertical;
        self.anchor_at_view_center(anchor);
    }

    /// Set the user zoom, clamped to `[1, max_zoom]`, keeping the image point
    /// under `focal` in place.
    pub fn set_zoom(&mut self, scale: f64, focal: Point) {
        let scale = scale.clamp(1.0, self.max_zoom);
        let anchor = self.inverse.map_point(focal);
        self.state.zoom = scale;
        self.state.offset = Point::default();
        self.rebuild();
        let placed = self.matrix.map_point(anchor);
        self.state.offset = Point::new(focal.x - placed.x, focal.y - placed.y);
        self.rebuild();
    }

    /// Replace zoom and offset directly; used when replaying an animation.
    pub(crate) fn set_zoom_and_offset(&mut self, zoom: f64, offset: Point) {
        self.state.zoom = zoom.clamp(1.0, self.max_zoom);
        self.state.offset = offset;
        self.rebuild();
    }

    /// Offset that centers `image_point` in the view at `zoom`, clamped so the
    /// image leaves no gap on an axis where it is larger than the view.
    pub fn centering_offset(&self, zoom: f64, image_point: Point) -> Point {
        let mut probe = self.clone();
        probe.set_zoom_and_offset(zoom, Point::default());
        let placed = probe.matrix.map_point(image_point);
        let offset = Point::new(
            self.view_width / 2.0 - placed.x,
            self.view_height / 2.0 - placed.y,
        );
        probe.clamped_offset(offset)
    }

    /// Pull the offset back so the image covers the view where it can.
    pub fn clamp_offset(&mut self) {
        let offset = self.clamped_offset(self.state.offset);
        self.state.offset = offset;
        self.rebuild();
    }

    pub fn set_scale_type(&mut self, scale_type: ScaleType) {
        if self.scale_type == scale_type {
            return;
        }
        self.scale_type = scale_type;
        self.state.zoom = 1.0;
        self.state.offset = Point::default();
        self.refresh_base_scale();
        self.rebuild();
    }

    pub fn set_view_size(&mut self, width: f64, height: f64) {
        self.view_width = width.max(1.0);
        self.view_height = height.max(1.0);
        self.refresh_base_scale();
        self.rebuild();
        self.clamp_offset();
    }

    /// Drop user zoom and offset.
    pub fn reset_zoom(&mut self) {
        self.state.zoom = 1.0;
        self.state.offset = Point::default();
        self.rebuild();
    }

    fn clamped_offset(&self, offset: Point) -> Point {
        let mut probe = self.clone();
        probe.state.offset = Point::default();
        probe.rebuild();
        let bounds = probe.bound_points().bounding_rect();
        Point::new(
            clamp_axis(offset.x, bounds.left, bounds.right, self.view_width),
            clamp_axis(offset.y, bounds.top, bounds.bottom, self.view_height),
        )
    }

    fn center_anchor(&self) -> Point {
        self.inverse
            .map_point(Point::new(self.view_width / 2.0, self.view_height / 2.0))
    }

    fn anchor_at_view_center(&mut self, anchor: Point) {
        self.state.offset = Point::default();
        self.rebuild();
        let placed = self.matrix.map_point(anchor);
        let offset = Point::new(
            self.view_width / 2.0 - placed.x,
            self.view_height / 2.0 - placed.y,
        );
        self.state.offset = self.clamped_offset(offset);
        self.rebuild();
    }

    fn rotated_image_size(&self) -> (f64, f64) {
        if self.state.rotation % 180 == 90 {
            (self.image_height, self.image_width)
        } else {
            (self.image_width, self.image_height)
        }
    }

    fn refresh_base_scale(&mut self) {
        let (rw, rh) = self.rotated_image_size();
        self.state.base_scale = base_scale(self.scale_type, (rw, rh), (self.view_width, self.view_height));
    }

    fn rebuild(&mut self) {
        let s = &self.state;
        let flip_x = if s.flip_horizontal { -1.0 } else { 1.0 };
        let flip_y = if s.flip_vertical { -1.0 } else { 1.0 };
        self.matrix = Affine::translate(-self.image_width / 2.0, -self.image_height / 2.0)
            .then(&Affine::rotate_quarters((s.rotation / 90) as i32))
            .then(&Affine::scale(
                flip_x * s.base_scale.0 * s.zoom,
                flip_y * s.base_scale.1 * s.zoom,
            ))
            .then(&Affine::translate(
                self.view_width / 2.0 + s.offset.x,
                self.view_height / 2.0 + s.offset.y,
            ));
        // base scale and zoom are always positive, so the matrix is invertible
        self.inverse = self.matrix.invert().unwrap_or(Affine::IDENTITY);
    }
}

/// Clamp one offset component. `low`/`high` are the image edges at zero
/// offset.
fn clamp_axis(offset: f64, low: f64, high: f64, view: f64) -> f64 {
    if high - low <= view + GEOMETRY_EPSILON {
        0.0
    } else {
        // keep low + offset <= 0 and high + offset >= view
        offset.clamp(view - high, -low)
    }
}

/// Fit-to-view scale for an image of `image` size (already rotated).
pub fn base_scale(scale_type: ScaleType, image: (f64, f64), view: (f64, f64)) -> (f64, f64) {
    let fit_x = view.0 / image.0;
    let fit_y = view.1 / image.1;
    match scale_type {
        ScaleType::FitCenter => {
            let s = fit_x.min(fit_y);
            (s, s)
        }
        ScaleType::Center => (1.0, 1.0),
        ScaleType::CenterInside => {
            let s = fit_x.min(fit_y).min(1.0);
            (s, s)
        }
        ScaleType::CenterCrop => {
            let s = fit_x.max(fit_y);
            (s, s)
        }
        ScaleType::FitXy => (fit_x, fit_y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transformer(image: (u32, u32), view: (f64, f64)) -> CoordinateTransformer {
        CoordinateTransformer::new(image, view, ScaleType::FitCenter, 4.0)
    }

    #[test]
    fn test_fit_center_bounds() {
        let t = transformer((400, 300), (800.0, 800.0));
        let bounds = t.bound_points().bounding_rect();
        assert!(bounds.approx_eq(&CropRect::new(0.0, 100.0, 800.0, 700.0), 1e-9));
    }

    #[test]
    fn test_base_scale_variants() {
        assert_eq!(
            base_scale(ScaleType::FitCenter, (400.0, 200.0), (200.0, 200.0)),
            (0.5, 0.5)
        );
        assert_eq!(
            base_scale(ScaleType::CenterInside, (100.0, 50.0), (200.0, 200.0)),
            (1.0, 1.0)
        );
        assert_eq!(
            base_scale(ScaleType::CenterCrop, (400.0, 200.0), (200.0, 200.0)),
            (1.0, 1.0)
        );
        assert_eq!(
            base_scale(ScaleType::FitXy, (400.0, 100.0), (200.0, 200.0)),
            (0.5, 2.0)
        );
        assert_eq!(
            base_scale(ScaleType::Center, (400.0, 100.0), (200.0, 200.0)),
            (1.0, 1.0)
        );
    }

    #[test]
    fn test_rotation_swaps_displayed_size() {
        let mut t = transformer((400, 200), (400.0, 400.0));
        t.rotate(90);
        let bounds = t.bound_points().bounding_rect();
        assert_relative_eq!(bounds.width(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.height(), 400.0, epsilon = 1e-9);
        assert_eq!(t.rotation(), 90);
    }

    #[test]
    fn test_rotation_moves_image_corner() {
        // 90 clockwise: the image's top-left corner ends up at the visual top-right
        let mut t = transformer((200, 200), (200.0, 200.0));
        t.rotate(90);
        let tl = t.bound_points().points()[0];
        assert_relative_eq!(tl.x, 200.0, epsilon = 1e-9);
        assert_relative_eq!(tl.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_counter_rotation_wraps() {
        let mut t = transformer((200, 100), (300.0, 300.0));
        t.rotate(-90);
        assert_eq!(t.rotation(), 270);
        t.rotate(90);
        assert_eq!(t.rotation(), 0);
    }

    #[test]
    fn test_flip_horizontal_mirrors_points() {
        let mut t = transformer((200, 100), (200.0, 100.0));
        t.flip_horizontal();
        let p = t.map_to_view(Point::new(0.0, 0.0));
        assert_relative_eq!(p.x, 200.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zoom_keeps_focal_point() {
        let mut t = transformer((1000, 1000), (500.0, 500.0));
        let focal = Point::new(120.0, 340.0);
        let before = t.map_to_image(focal);
        t.set_zoom(2.5, focal);
        let after = t.map_to_view(before);
        assert_relative_eq!(after.x, focal.x, epsilon = 1e-9);
        assert_relative_eq!(after.y, focal.y, epsilon = 1e-9);
        assert_eq!(t.zoom(), 2.5);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut t = transformer((1000, 1000), (500.0, 500.0));
        t.set_zoom(10.0, Point::new(250.0, 250.0));
        assert_eq!(t.zoom(), 4.0);
        t.set_zoom(0.2, Point::new(250.0, 250.0));
        assert_eq!(t.zoom(), 1.0);
    }

    #[test]
    fn test_source_pixels_per_view_pixel() {
        let mut t = transformer((1000, 500), (500.0, 500.0));
        assert_eq!(t.source_pixels_per_view_pixel(), (2.0, 2.0));
        t.set_zoom(2.0, Point::new(250.0, 250.0));
        assert_eq!(t.source_pixels_per_view_pixel(), (1.0, 1.0));
    }

    #[test]
    fn test_centering_offset_clamps_to_edges() {
        let t = transformer((1000, 1000), (500.0, 500.0));
        // centering the top-left corner at 2x would expose a gap; clamp instead
        let offset = t.centering_offset(2.0, Point::new(0.0, 0.0));
        assert_relative_eq!(offset.x, 250.0, epsilon = 1e-9);
        assert_relative_eq!(offset.y, 250.0, epsilon = 1e-9);

        let offset = t.centering_offset(2.0, Point::new(500.0, 500.0));
        assert_relative_eq!(offset.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_visible_bounds_clipped_to_view() {
        let t = CoordinateTransformer::new((400, 400), (200.0, 100.0), ScaleType::CenterCrop, 4.0);
        let visible = t.visible_bounds().unwrap();
        assert!(visible.approx_eq(&CropRect::new(0.0, 0.0, 200.0, 100.0), 1e-9));
    }

    #[test]
    fn test_image_points_follow_rotation() {
        let mut t = transformer((100, 100), (100.0, 100.0));
        t.rotate(90);
        let points = t.to_image_points(&CropRect::new(0.0, 0.0, 100.0, 100.0));
        // view top-left shows the image's bottom-left after a clockwise turn
        assert_relative_eq!(points[0].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(points[0].y, 100.0, epsilon = 1e-9);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Rotate(i32),
        FlipH,
        FlipV,
        Zoom(f64, f64, f64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop_oneof![Just(90), Just(-90), Just(180)].prop_map(Op::Rotate),
            Just(Op::FlipH),
            Just(Op::FlipV),
            (1.0f64..4.0, 0.0f64..600.0, 0.0f64..400.0).prop_map(|(z, x, y)| Op::Zoom(z, x, y)),
        ]
    }

    fn apply(t: &mut CoordinateTransformer, op: Op) {
        match op {
            Op::Rotate(d) => t.rotate(d),
            Op::FlipH => t.flip_horizontal(),
            Op::FlipV => t.flip_vertical(),
            Op::Zoom(z, x, y) => t.set_zoom(z, Point::new(x, y)),
        }
    }

    fn image_rect_strategy() -> impl Strategy<Value = (u32, u32, CropRect)> {
        (50u32..2000, 50u32..2000, 0.0f64..0.9, 0.0f64..0.9, 0.05f64..0.1)
            .prop_map(|(w, h, fx, fy, fs)| {
                let left = fx * w as f64;
                let top = fy * h as f64;
                let rect = CropRect::new(
                    left,
                    top,
                    left + fs * w as f64,
                    top + fs * h as f64,
                );
                (w, h, rect)
            })
    }

    proptest! {
        /// Property: view and image space mappings are inverse to each other.
        #[test]
        fn prop_round_trip_any_state(
            (w, h, rect) in image_rect_strategy(),
            ops in prop::collection::vec(op_strategy(), 0..6),
        ) {
            let mut t = CoordinateTransformer::new((w, h), (600.0, 400.0), ScaleType::FitCenter, 4.0);
            for op in ops {
                apply(&mut t, op);
            }
            let back = t.to_image_space(&t.to_view_space(&rect));
            prop_assert!(back.approx_eq(&rect, 1e-6), "{:?} != {:?}", back, rect);
        }

        /// Property: four quarter turns restore the bound points.
        #[test]
        fn prop_four_rotations_identity(
            (w, h, _) in image_rect_strategy(),
            clockwise in any::<bool>(),
        ) {
            let mut t = CoordinateTransformer::new((w, h), (600.0, 400.0), ScaleType::FitCenter, 4.0);
            let start = t.bound_points();
            let step = if clockwise { 90 } else { -90 };
            for _ in 0..4 {
                t.rotate(step);
            }
            prop_assert!(t.bound_points().approx_eq(&start, 1e-6));
            prop_assert_eq!(t.rotation(), 0);
        }

        /// Property: flipping the same axis twice is an identity.
        #[test]
        fn prop_double_flip_identity(
            (w, h, rect) in image_rect_strategy(),
            horizontal in any::<bool>(),
            quarter in 0i32..4,
        ) {
            let mut t = CoordinateTransformer::new((w, h), (600.0, 400.0), ScaleType::FitCenter, 4.0);
            t.rotate(quarter * 90);
            let start = t.bound_points();
            let view = t.to_view_space(&rect);
            for _ in 0..2 {
                if horizontal { t.flip_horizontal() } else { t.flip_vertical() }
            }
            prop_assert!(t.bound_points().approx_eq(&start, 1e-6));
            prop_assert!(t.to_view_space(&rect).approx_eq(&view, 1e-6));
        }
    }
}
