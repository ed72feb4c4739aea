use crate::config::CanvasConfig;
use crate::projection::{Projection, Viewport};

/// Smallest scale a camera ever uses, whatever bounds it was built with.
pub const MIN_SCALE_FLOOR: f64 = 1e-3;

/// Pan offset and zoom scale mapping grid space onto the screen.
///
/// Scale is always kept inside `[min_scale, max_scale]`, and those bounds are
/// ordered, finite and no lower than [`MIN_SCALE_FLOOR`]; pan is unbounded so
/// the canvas can be dragged arbitrarily far. Every effective change bumps
/// [`Camera::version`].
#[derive(Debug, Clone)]
pub struct Camera {
    pan_x: f64,
    pan_y: f64,
    scale: f64,
    min_scale: f64,
    max_scale: f64,
    default_scale: f64,
    cell_size: f64,
    viewport: Viewport,
    version: u64,
}

impl Camera {
    pub fn new(
        cell_size: f64,
        min_scale: f64,
        max_scale: f64,
        default_scale: f64,
        viewport: Viewport,
    ) -> Self {
        let (lo, hi) = sanitize_bounds(min_scale, max_scale);
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let default_scale = if default_scale.is_finite() {
            default_scale
        } else {
            1.0
        }
        .clamp(lo, hi);
        if (lo, hi) != (min_scale, max_scale) {
            tracing::warn!(min_scale, max_scale, lo, hi, "camera.scale_bounds_adjusted");
        }
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            scale: default_scale,
            min_scale: lo,
            max_scale: hi,
            default_scale,
            cell_size,
            viewport,
            version: 0,
        }
    }

    pub fn from_config(config: &CanvasConfig, viewport: Viewport) -> Self {
        Self::new(
            config.cell_size,
            config.min_scale,
            config.max_scale,
            config.default_scale,
            viewport,
        )
    }

    pub fn pan(&self) -> (f64, f64) {
        (self.pan_x, self.pan_y)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn scale_bounds(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn projection(&self) -> Projection {
        Projection {
            pan_x: self.pan_x,
            pan_y: self.pan_y,
            scale: self.scale,
            cell_size: self.cell_size,
        }
    }

    /// Zoom readout for the zoom controls: one decimal below 10x.
    pub fn zoom_label(&self) -> String {
        if self.scale < 10.0 {
            format!("{:.1}x", self.scale)
        } else {
            format!("{}x", self.scale.round())
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        if !(dx.is_finite() && dy.is_finite()) || (dx == 0.0 && dy == 0.0) {
            return false;
        }
        self.pan_x += dx;
        self.pan_y += dy;
        self.touch()
    }

    /// Multiplies the scale by `factor` while keeping the grid point under
    /// `(anchor_x, anchor_y)` fixed on screen.
    pub fn zoom_at(&mut self, anchor_x: f64, anchor_y: f64, factor: f64) -> bool {
        if !(factor.is_finite() && factor > 0.0 && anchor_x.is_finite() && anchor_y.is_finite()) {
            tracing::debug!(factor, anchor_x, anchor_y, "camera.zoom_ignored");
            return false;
        }
        let old_scale = self.scale;
        let new_scale = (old_scale * factor).clamp(self.min_scale, self.max_scale);
        if new_scale == old_scale {
            return false;
        }
        let ratio = new_scale / old_scale;
        self.pan_x = anchor_x - (anchor_x - self.pan_x) * ratio;
        self.pan_y = anchor_y - (anchor_y - self.pan_y) * ratio;
        self.scale = new_scale;
        self.touch()
    }

    /// Direct overwrite used by the zoom buttons; pan is left untouched.
    pub fn set_scale(&mut self, scale: f64) -> bool {
        if !scale.is_finite() {
            return false;
        }
        let clamped = scale.clamp(self.min_scale, self.max_scale);
        if clamped == self.scale {
            return false;
        }
        self.scale = clamped;
        self.touch()
    }

    pub fn reset(&mut self) -> bool {
        let scale = self.default_scale.clamp(self.min_scale, self.max_scale);
        if self.pan_x == 0.0 && self.pan_y == 0.0 && self.scale == scale {
            return false;
        }
        self.pan_x = 0.0;
        self.pan_y = 0.0;
        self.scale = scale;
        self.touch()
    }

    /// Places grid point `(gx, gy)` at the viewport center.
    pub fn center_on(&mut self, gx: f64, gy: f64) -> bool {
        let extent = self.cell_size * self.scale;
        let (cx, cy) = self.viewport.center();
        self.set_pan(cx - gx * extent, cy - gy * extent)
    }

    /// Places grid point `(gx, gy)` at the viewport's top-left corner.
    pub fn align_top_left(&mut self, gx: f64, gy: f64) -> bool {
        let extent = self.cell_size * self.scale;
        self.set_pan(-gx * extent, -gy * extent)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> bool {
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.touch()
    }

    fn set_pan(&mut self, pan_x: f64, pan_y: f64) -> bool {
        if !(pan_x.is_finite() && pan_y.is_finite()) || (pan_x == self.pan_x && pan_y == self.pan_y)
        {
            return false;
        }
        self.pan_x = pan_x;
        self.pan_y = pan_y;
        self.touch()
    }

    fn touch(&mut self) -> bool {
        self.version += 1;
        true
    }
}

/// Orders the bounds and keeps both finite and at least [`MIN_SCALE_FLOOR`].
fn sanitize_bounds(min: f64, max: f64) -> (f64, f64) {
    let min = if min.is_finite() { min } else { MIN_SCALE_FLOOR };
    let max = if max.is_finite() { max } else { min };
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let lo = lo.max(MIN_SCALE_FLOOR);
    (lo, hi.max(lo))
}
