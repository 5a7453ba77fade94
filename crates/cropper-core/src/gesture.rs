//! Pointer handling for the crop window.
//!
//! [`GestureController`] is a small state machine fed with [`PointerEvent`]s:
//! - pointer down picks the nearest handle within the touch radius, or the
//!   window body when the pointer is inside the window
//! - pointer move drags that handle, snapping edges onto the image bounds
//! - pointer up releases the handle; the editor reacts with auto-zoom
//!
//! With multi-touch enabled a second pointer turns the gesture into a pinch
//! that zooms the image instead of moving the window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{CropRect, Point, GEOMETRY_EPSILON};
use crate::options::CropOptions;
use crate::window::{CropWindowHandler, HandleType};

/// Pointer input in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { pointer: u32, position: Point },
    Move { pointer: u32, position: Point },
    Up { pointer: u32 },
    Cancel,
}

/// What a pointer event did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureOutcome {
    /// Not consumed; the host may use it to pan the underlying image.
    Ignored,
    HandleGrabbed { handle: HandleType },
    WindowChanged { rect: CropRect },
    /// The active handle was let go.
    Released,
    PinchStarted,
    /// Relative zoom change since the previous pinch event.
    Pinch { scale: f64, focal: Point },
    PinchEnded,
}

/// Current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    HandleActive {
        handle: HandleType,
        pointer: u32,
        /// Handle position minus pointer position at grab time.
        touch_offset: Point,
    },
    Pinching {
        first: u32,
        second: u32,
        distance: f64,
    },
}

/// Turns pointer events into crop window changes.
#[derive(Debug, Clone)]
pub struct GestureController {
    touch_radius: f64,
    snap_radius: f64,
    multi_touch: bool,
    state: GestureState,
    pointers: Vec<(u32, Point)>,
}

impl GestureController {
    pub fn new(options: &CropOptions) -> Self {
        Self {
            touch_radius: options.touch_radius,
            snap_radius: options.snap_radius,
            multi_touch: options.multi_touch_enabled,
            state: GestureState::Idle,
            pointers: Vec::with_capacity(2),
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn active_handle(&self) -> Option<HandleType> {
        match self.state {
            GestureState::HandleActive { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn is_pinching(&self) -> bool {
        matches!(self.state, GestureState::Pinching { .. })
    }

    pub fn set_multi_touch_enabled(&mut self, enabled: bool) {
        self.multi_touch = enabled;
    }

    /// Handle under `point`, if any.
    ///
    /// The nearest outline handle within the touch radius wins; otherwise a
    /// point inside the window grabs the body.
    pub fn hit_test(&self, rect: &CropRect, point: Point) -> Option<HandleType> {
        let mut best: Option<(HandleType, f64)> = None;
        for handle in HandleType::OUTLINE {
            let distance = handle.position(rect).distance_to(point);
            if distance <= self.touch_radius && best.map_or(true, |(_, d)| distance < d) {
                best = Some((handle, distance));
            }
        }
        best.map(|(handle, _)| handle)
            .or_else(|| rect.contains(point).then_some(HandleType::Center))
    }

    /// Feed one pointer event.
    pub fn handle_event(
        &mut self,
        event: PointerEvent,
        window: &mut CropWindowHandler,
    ) -> GestureOutcome {
        match event {
            PointerEvent::Down { pointer, position } => self.on_down(pointer, position, window),
            PointerEvent::Move { pointer, position } => self.on_move(pointer, position, window),
            PointerEvent::Up { pointer } => self.on_up(pointer),
            PointerEvent::Cancel => {
                self.pointers.clear();
                self.finish()
            }
        }
    }

    fn on_down(
        &mut self,
        pointer: u32,
        position: Point,
        window: &CropWindowHandler,
    ) -> GestureOutcome {
        self.track(pointer, position);

        if self.multi_touch && self.pointers.len() >= 2 && !self.is_pinching() {
            let (first, a) = self.pointers[0];
            let (second, b) = self.pointers[1];
            self.state = GestureState::Pinching {
                first,
                second,
                distance: a.distance_to(b).max(GEOMETRY_EPSILON),
            };
            debug!(first, second, "pinch started");
            return GestureOutcome::PinchStarted;
        }
        if self.state != GestureState::Idle || !window.has_bounds() {
            return GestureOutcome::Ignored;
        }

        let rect = window.rect();
        match self.hit_test(&rect, position) {
            Some(handle) => {
                let at = handle.position(&rect);
                self.state = GestureState::HandleActive {
                    handle,
                    pointer,
                    touch_offset: Point::new(at.x - position.x, at.y - position.y),
                };
                debug!(?handle, "handle grabbed");
                GestureOutcome::HandleGrabbed { handle }
            }
            None => GestureOutcome::Ignored,
        }
    }

    fn on_move(
        &mut self,
        pointer: u32,
        position: Point,
        window: &mut CropWindowHandler,
    ) -> GestureOutcome {
        self.track(pointer, position);

        match self.state {
            GestureState::HandleActive {
                handle,
                pointer: active,
                touch_offset,
            } if active == pointer => {
                let target = Point::new(position.x + touch_offset.x, position.y + touch_offset.y);
                let rect = self.drag(handle, target, window);
                GestureOutcome::WindowChanged { rect }
            }
            GestureState::Pinching {
                first,
                second,
                distance,
            } if pointer == first || pointer == second => {
                let (Some(a), Some(b)) = (self.position_of(first), self.position_of(second)) else {
                    return GestureOutcome::Ignored;
                };
                let current = a.distance_to(b).max(GEOMETRY_EPSILON);
                self.state = GestureState::Pinching {
                    first,
                    second,
                    distance: current,
                };
                GestureOutcome::Pinch {
                    scale: current / distance,
                    focal: a.lerp(b, 0.5),
                }
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn on_up(&mut self, pointer: u32) -> GestureOutcome {
        self.pointers.retain(|(id, _)| *id != pointer);
        match self.state {
            GestureState::HandleActive { pointer: active, .. } if active == pointer => self.finish(),
            GestureState::Pinching { first, second, .. } if pointer == first || pointer == second => {
                self.finish()
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn finish(&mut self) -> GestureOutcome {
        let outcome = match self.state {
            GestureState::Idle => GestureOutcome::Ignored,
            GestureState::HandleActive { .. } => GestureOutcome::Released,
            GestureState::Pinching { .. } => GestureOutcome::PinchEnded,
        };
        self.state = GestureState::Idle;
        outcome
    }

    /// Move `handle` so it lands on `target`, snapping moved edges that end up
    /// within the snap radius of the image bounds.
    fn drag(&self, handle: HandleType, target: Point, window: &mut CropWindowHandler) -> CropRect {
        let rect = window.rect();
        let bounds = window.bounds();
        let current = handle.position(&rect);
        let mut dx = target.x - current.x;
        let mut dy = target.y - current.y;

        if handle == HandleType::Center {
            dx = self.snap_translation(rect.left, rect.right, bounds.left, bounds.right, dx);
            dy = self.snap_translation(rect.top, rect.bottom, bounds.top, bounds.bottom, dy);
        } else {
            if handle.moves_left() {
                dx = self.snap(rect.left + dx, bounds.left) - rect.left;
            }
            if handle.moves_right() {
                dx = self.snap(rect.right + dx, bounds.right) - rect.right;
            }
            if handle.moves_top() {
                dy = self.snap(rect.top + dy, bounds.top) - rect.top;
            }
            if handle.moves_bottom() {
                dy = self.snap(rect.bottom + dy, bounds.bottom) - rect.bottom;
            }
        }
        window.move_handle(handle, dx, dy)
    }

    fn snap(&self, edge: f64, bound: f64) -> f64 {
        if (edge - bound).abs() <= self.snap_radius {
            bound
        } else {
            edge
        }
    }

    fn snap_translation(&self, low: f64, high: f64, bound_low: f64, bound_high: f64, delta: f64) -> f64 {
        if (low + delta - bound_low).abs() <= self.snap_radius {
            bound_low - low
        } else if (high + delta - bound_high).abs() <= self.snap_radius {
            bound_high - high
        } else {
            delta
        }
    }

    fn track(&mut self, pointer: u32, position: Point) {
        match self.pointers.iter_mut().find(|(id, _)| *id == pointer) {
            Some(entry) => entry.1 = position,
            None => self.pointers.push((pointer, position)),
        }
    }

    fn position_of(&self, pointer: u32) -> Option<Point> {
        self.pointers
            .iter()
            .find(|(id, _)| *id == pointer)
            .map(|(_, p)| *p)
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
