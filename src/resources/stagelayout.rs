//! Stage layout resource.
//!
//! The logical canvas is not a fixed size. Content is authored for a range of
//! aspect ratios between a minimum and a maximum size; the viewport's ratio
//! picks a logical size inside that range, which is then scaled uniformly to
//! fit the viewport and centered (letterbox or pillarbox as needed).

use bevy_ecs::prelude::Resource;
use glam::Vec2;

/// A logical size at one end of the supported aspect range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogicalSize {
    pub width: f32,
    pub height: f32,
}

impl LogicalSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn ratio(&self) -> f32 {
        self.width / self.height
    }

    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// Result of fitting the logical canvas into a viewport.
#[derive(Resource, Clone, Copy, Debug, PartialEq)]
pub struct StageLayout {
    pub viewport: Vec2,
    /// Logical canvas size chosen for the viewport's aspect ratio.
    pub logical: Vec2,
    /// Uniform logical-to-viewport scale.
    pub scale: f32,
    /// Logical size times scale.
    pub rendered: Vec2,
    /// Top-left of the rendered canvas inside the viewport.
    pub offset: Vec2,
    /// Top-left of the logical canvas inside the reference frame
    /// (the largest width and height of the two sizes).
    pub frame_offset: Vec2,
}

impl StageLayout {
    pub fn compute(min: LogicalSize, max: LogicalSize, viewport_w: f32, viewport_h: f32) -> Self {
        let (lo, hi) = if min.ratio() <= max.ratio() {
            (min, max)
        } else {
            (max, min)
        };
        let viewport = Vec2::new(viewport_w.max(1.0), viewport_h.max(1.0));

        let ratio = (viewport.x / viewport.y).clamp(lo.ratio(), hi.ratio());
        let span = hi.ratio() - lo.ratio();
        let t = if span > f32::EPSILON {
            (ratio - lo.ratio()) / span
        } else {
            0.0
        };
        let logical = lo.as_vec2().lerp(hi.as_vec2(), t);

        let scale = (viewport.x / logical.x).min(viewport.y / logical.y);
        let rendered = logical * scale;
        let offset = (viewport - rendered) / 2.0;

        let frame = min.as_vec2().max(max.as_vec2());
        let frame_offset = (frame - logical) / 2.0;

        StageLayout {
            viewport,
            logical,
            scale,
            rendered,
            offset,
            frame_offset,
        }
    }

    /// Position of the stage root so that reference-frame coordinates land
    /// on the centered logical canvas.
    pub fn root_position(&self) -> Vec2 {
        self.offset - self.frame_offset * self.scale
    }

    /// Transform a viewport position to logical canvas coordinates, clamped
    /// to the canvas (positions in the bars land on its edge).
    pub fn viewport_to_logical(&self, pos: Vec2) -> Vec2 {
        ((pos - self.offset) / self.scale).clamp(Vec2::ZERO, self.logical)
    }
}

impl Default for StageLayout {
    fn default() -> Self {
        let logical = Vec2::new(1.0, 1.0);
        StageLayout {
            viewport: logical,
            logical,
            scale: 1.0,
            rendered: logical,
            offset: Vec2::ZERO,
            frame_offset: Vec2::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;
    const MIN: LogicalSize = LogicalSize::new(320.0, 480.0);
    const MAX: LogicalSize = LogicalSize::new(768.0, 1024.0);

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn vec_eq(a: Vec2, b: Vec2) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
    }

    // ==================== RANGE ENDS ====================

    #[test]
    fn test_viewport_at_min_ratio() {
        let layout = StageLayout::compute(MIN, MAX, 640.0, 960.0);
        assert!(vec_eq(layout.logical, Vec2::new(320.0, 480.0)));
        assert!(approx_eq(layout.scale, 2.0));
        assert!(vec_eq(layout.rendered, Vec2::new(640.0, 960.0)));
        assert!(vec_eq(layout.offset, Vec2::ZERO));
        assert!(vec_eq(layout.frame_offset, Vec2::new(224.0, 272.0)));
    }

    #[test]
    fn test_viewport_at_max_ratio() {
        let layout = StageLayout::compute(MIN, MAX, 768.0, 1024.0);
        assert!(vec_eq(layout.logical, Vec2::new(768.0, 1024.0)));
        assert!(approx_eq(layout.scale, 1.0));
        assert!(vec_eq(layout.frame_offset, Vec2::ZERO));
    }

    // ==================== INTERPOLATION ====================

    #[test]
    fn test_ratio_between_interpolates_size() {
        // 700/960 sits three quarters of the way from 2:3 to 3:4.
        let layout = StageLayout::compute(MIN, MAX, 700.0, 960.0);
        assert!(vec_eq(layout.logical, Vec2::new(656.0, 888.0)));
        let ratio = layout.logical.x / layout.logical.y;
        assert!(ratio >= MIN.ratio() - EPSILON && ratio <= MAX.ratio() + EPSILON);
    }

    #[test]
    fn test_swapped_bounds_give_same_layout() {
        let a = StageLayout::compute(MIN, MAX, 700.0, 960.0);
        let b = StageLayout::compute(MAX, MIN, 700.0, 960.0);
        assert!(vec_eq(a.logical, b.logical));
        assert!(approx_eq(a.scale, b.scale));
    }

    // ==================== LETTERBOX ====================

    #[test]
    fn test_wide_viewport_is_pillarboxed() {
        let layout = StageLayout::compute(MIN, MAX, 2000.0, 1024.0);
        assert!(vec_eq(layout.logical, Vec2::new(768.0, 1024.0)));
        assert!(approx_eq(layout.scale, 1.0));
        assert!(vec_eq(layout.offset, Vec2::new(616.0, 0.0)));
    }

    #[test]
    fn test_tall_viewport_is_letterboxed() {
        let layout = StageLayout::compute(MIN, MAX, 320.0, 1000.0);
        assert!(vec_eq(layout.logical, Vec2::new(320.0, 480.0)));
        assert!(approx_eq(layout.scale, 1.0));
        assert!(vec_eq(layout.offset, Vec2::new(0.0, 260.0)));
    }

    #[test]
    fn test_equal_ratios_do_not_divide_by_zero() {
        let small = LogicalSize::new(400.0, 300.0);
        let big = LogicalSize::new(800.0, 600.0);
        let layout = StageLayout::compute(small, big, 1600.0, 1200.0);
        assert!(vec_eq(layout.logical, Vec2::new(400.0, 300.0)));
        assert!(approx_eq(layout.scale, 4.0));
    }

    #[test]
    fn test_viewport_to_logical_clamps() {
        let layout = StageLayout::compute(MIN, MAX, 320.0, 1000.0);
        assert!(vec_eq(
            layout.viewport_to_logical(Vec2::new(160.0, 500.0)),
            Vec2::new(160.0, 240.0)
        ));
        assert!(vec_eq(
            layout.viewport_to_logical(Vec2::new(10.0, 5.0)),
            Vec2::new(10.0, 0.0)
        ));
    }

    #[test]
    fn test_root_position_maps_frame_to_canvas() {
        let layout = StageLayout::compute(MIN, MAX, 640.0, 960.0);
        // Reference-frame point at the canvas corner lands on the viewport corner.
        let corner = layout.root_position() + layout.frame_offset * layout.scale;
        assert!(vec_eq(corner, layout.offset));
    }
}
