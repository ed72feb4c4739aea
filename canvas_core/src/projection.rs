//! Pure conversions between screen pixels and grid cells.
//!
//! A [`Projection`] is a copy of the camera's pan/zoom taken at one instant;
//! nothing here mutates state.

use crate::grid::GridRect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width * 0.5, self.height * 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub pan_x: f64,
    pub pan_y: f64,
    pub scale: f64,
    pub cell_size: f64,
}

impl Projection {
    /// On-screen edge length of one cell.
    #[inline]
    pub fn cell_extent(&self) -> f64 {
        self.cell_size * self.scale
    }

    /// Fractional grid position under a screen point.
    #[inline]
    pub fn screen_to_grid_f(&self, px: f64, py: f64) -> (f64, f64) {
        let extent = self.cell_extent();
        ((px - self.pan_x) / extent, (py - self.pan_y) / extent)
    }

    /// Cell containing a screen point: `floor((p - pan) / extent)` on each
    /// axis. May be outside the grid. A point landing exactly on a cell edge
    /// after a float round trip can floor into the neighbouring cell.
    pub fn screen_to_grid(&self, px: f64, py: f64) -> (i64, i64) {
        let (gx, gy) = self.screen_to_grid_f(px, py);
        (gx.floor() as i64, gy.floor() as i64)
    }

    /// Screen position of a grid point (the top-left corner for whole cells).
    #[inline]
    pub fn grid_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
        let extent = self.cell_extent();
        (gx * extent + self.pan_x, gy * extent + self.pan_y)
    }

    pub fn grid_rect_to_screen(&self, rect: GridRect) -> ScreenRect {
        let (x0, y0) = self.grid_to_screen(rect.x as f64, rect.y as f64);
        let (x1, y1) = self.grid_to_screen(rect.right() as f64, rect.bottom() as f64);
        ScreenRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Grid cells intersecting the viewport, clamped to `[0, W] × [0, H]`.
    /// Empty (zero-sized) when the grid is panned fully off-screen.
    pub fn visible_grid_rect(&self, viewport: Viewport, grid_width: u32, grid_height: u32) -> GridRect {
        let (left, top) = self.screen_to_grid_f(0.0, 0.0);
        let (right, bottom) = self.screen_to_grid_f(viewport.width, viewport.height);
        let clamp = |value: f64, limit: u32| value.max(0.0).min(limit as f64);
        let x0 = clamp(left.floor(), grid_width) as u32;
        let y0 = clamp(top.floor(), grid_height) as u32;
        let x1 = clamp(right.ceil(), grid_width) as u32;
        let y1 = clamp(bottom.ceil(), grid_height) as u32;
        GridRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn projection(pan_x: f64, pan_y: f64, scale: f64) -> Projection {
        Projection {
            pan_x,
            pan_y,
            scale,
            cell_size: 8.0,
        }
    }

    #[test]
    fn screen_to_grid_floors_by_cell_extent() {
        let p = projection(0.0, 0.0, 1.0);
        assert_eq!(p.screen_to_grid(0.0, 0.0), (0, 0));
        assert_eq!(p.screen_to_grid(7.9, 8.0), (0, 1));
        assert_eq!(p.screen_to_grid(-0.1, 15.0), (-1, 1));

        let p = projection(-100.0, 20.0, 2.0);
        assert_eq!(p.screen_to_grid(100.0, 100.0), (12, 5));
    }

    #[test]
    fn points_just_short_of_an_edge_stay_in_their_cell() {
        let p = projection(0.0, 0.0, 1.0);
        assert_eq!(p.screen_to_grid(8.0 - 1e-9, 16.0 - 1e-9), (0, 1));
        assert_eq!(p.screen_to_grid(8.0, 16.0), (1, 2));
    }

    #[test]
    fn grid_to_screen_round_trips_for_sampled_cameras() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        for _ in 0..2_000 {
            let p = projection(
                rng.gen_range(-5_000.0..5_000.0),
                rng.gen_range(-5_000.0..5_000.0),
                rng.gen_range(0.1..25.0),
            );
            let gx: i64 = rng.gen_range(0..500);
            let gy: i64 = rng.gen_range(0..500);
            // Sample inside the cell; exact edges may floor either way.
            let fx: f64 = rng.gen_range(0.05..0.95);
            let fy: f64 = rng.gen_range(0.05..0.95);
            let (sx, sy) = p.grid_to_screen(gx as f64 + fx, gy as f64 + fy);
            assert_eq!(p.screen_to_grid(sx, sy), (gx, gy), "{p:?}");
        }
    }

    #[test]
    fn extreme_scales_stay_finite() {
        for scale in [0.1, 25.0] {
            let p = projection(1e6, -1e6, scale);
            let (gx, gy) = p.screen_to_grid_f(0.0, 0.0);
            assert!(gx.is_finite() && gy.is_finite());
            let rect = p.visible_grid_rect(Viewport::new(800.0, 600.0), 500, 500);
            assert!(rect.is_empty());
        }
    }

    #[test]
    fn visible_rect_is_clamped_to_grid() {
        let p = projection(0.0, 0.0, 1.0);
        let rect = p.visible_grid_rect(Viewport::new(80.0, 40.0), 500, 500);
        assert_eq!(rect, GridRect::new(0, 0, 10, 5));

        let p = projection(-20.0, -4.0, 1.0);
        let rect = p.visible_grid_rect(Viewport::new(80.0, 40.0), 500, 500);
        assert_eq!(rect, GridRect::new(2, 0, 11, 6));

        let p = projection(100.0, 100.0, 0.1);
        let rect = p.visible_grid_rect(Viewport::new(800.0, 800.0), 500, 500);
        assert_eq!(rect, GridRect::new(0, 0, 500, 500));
    }

    #[test]
    fn grid_rect_maps_to_screen_extent() {
        let p = projection(10.0, -5.0, 2.0);
        let rect = p.grid_rect_to_screen(GridRect::new(1, 2, 3, 1));
        assert_eq!(rect, ScreenRect::new(26.0, 27.0, 48.0, 16.0));
    }
}
