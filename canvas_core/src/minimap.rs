use crate::camera::Camera;
use crate::config::CanvasConfig;
use crate::grid::{Grid, GridVersion};
use crate::palette::{Palette, Rgb};

/// Rectangle in minimap pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MiniRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MiniRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

/// Downsampled image of the whole grid, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgb>,
    pub version: GridVersion,
}

impl Overview {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    grab_x: f64,
    grab_y: f64,
    rect: MiniRect,
}

/// Small overview of the grid with the camera's visible region outlined.
///
/// Grid and minimap are related by the fixed ratio `size / max(W, H)`.
#[derive(Debug, Clone)]
pub struct MiniMap {
    size: f64,
    grid_width: u32,
    grid_height: u32,
    drag: Option<Drag>,
    overview: Option<Overview>,
}

impl MiniMap {
    pub fn new(size: f64, grid_width: u32, grid_height: u32) -> Self {
        Self {
            size,
            grid_width,
            grid_height,
            drag: None,
            overview: None,
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(config.mini_map_size, config.grid_width, config.grid_height)
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// Resizes the minimap, e.g. to fit a host panel. Drops any active drag.
    pub fn set_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 && size != self.size {
            self.size = size;
            self.drag = None;
            self.overview = None;
        }
    }

    pub fn ratio(&self) -> f64 {
        self.size / self.grid_width.max(self.grid_height).max(1) as f64
    }

    /// Minimap footprint of the full grid.
    pub fn extent(&self) -> (f64, f64) {
        let ratio = self.ratio();
        (
            self.grid_width as f64 * ratio,
            self.grid_height as f64 * ratio,
        )
    }

    pub fn to_grid(&self, mx: f64, my: f64) -> (f64, f64) {
        let ratio = self.ratio();
        (mx / ratio, my / ratio)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Outline of what the camera shows. During a drag this is the dragged
    /// rectangle, not the camera's.
    pub fn viewport_rect(&self, camera: &Camera) -> MiniRect {
        if let Some(drag) = self.drag {
            return drag.rect;
        }
        let visible = camera.projection().visible_grid_rect(
            camera.viewport(),
            self.grid_width,
            self.grid_height,
        );
        let ratio = self.ratio();
        MiniRect::new(
            visible.x as f64 * ratio,
            visible.y as f64 * ratio,
            visible.width as f64 * ratio,
            visible.height as f64 * ratio,
        )
    }

    /// Recenters the camera on the clicked grid point.
    pub fn click(&mut self, mx: f64, my: f64, camera: &mut Camera) -> bool {
        if !(mx.is_finite() && my.is_finite()) {
            return false;
        }
        let (gx, gy) = self.to_grid(mx, my);
        let gx = gx.clamp(0.0, self.grid_width as f64);
        let gy = gy.clamp(0.0, self.grid_height as f64);
        camera.center_on(gx, gy)
    }

    /// Starts dragging when the press lands on the viewport outline.
    pub fn begin_drag(&mut self, mx: f64, my: f64, camera: &Camera) -> bool {
        let rect = self.viewport_rect(camera);
        if rect.width <= 0.0 || rect.height <= 0.0 || !rect.contains(mx, my) {
            return false;
        }
        self.drag = Some(Drag {
            grab_x: mx - rect.x,
            grab_y: my - rect.y,
            rect,
        });
        true
    }

    /// Moves the dragged outline, clamped inside the minimap, and aligns the
    /// camera's top-left corner with it.
    pub fn drag_to(&mut self, mx: f64, my: f64, camera: &mut Camera) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        if !(mx.is_finite() && my.is_finite()) {
            return false;
        }
        let ratio = self.size / self.grid_width.max(self.grid_height).max(1) as f64;
        let max_x = (self.grid_width as f64 * ratio - drag.rect.width).max(0.0);
        let max_y = (self.grid_height as f64 * ratio - drag.rect.height).max(0.0);
        drag.rect.x = (mx - drag.grab_x).clamp(0.0, max_x);
        drag.rect.y = (my - drag.grab_y).clamp(0.0, max_y);
        camera.align_top_left(drag.rect.x / ratio, drag.rect.y / ratio)
    }

    /// Ends the drag; the outline follows the camera again.
    pub fn end_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Last image built by [`MiniMap::overview`].
    pub fn cached_overview(&self) -> Option<&Overview> {
        self.overview.as_ref()
    }

    /// Downsampled grid image, rebuilt only when `version` moved.
    pub fn overview(&mut self, grid: &Grid, version: GridVersion, palette: &Palette) -> &Overview {
        let stale = self
            .overview
            .as_ref()
            .map_or(true, |overview| overview.version != version);
        if stale {
            let overview = self.render_overview(grid, version, palette);
            tracing::trace!(
                target: "pixel_canvas::minimap",
                version,
                width = overview.width,
                height = overview.height,
                "minimap.overview_rebuilt"
            );
            self.overview = Some(overview);
        }
        self.overview.get_or_insert_with(|| Overview {
            width: 0,
            height: 0,
            pixels: Vec::new(),
            version,
        })
    }

    fn render_overview(&self, grid: &Grid, version: GridVersion, palette: &Palette) -> Overview {
        let (extent_w, extent_h) = self.extent();
        let width = (extent_w.ceil() as u32).clamp(1, grid.width().max(1));
        let height = (extent_h.ceil() as u32).clamp(1, grid.height().max(1));
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for oy in 0..height {
            let gy = sample(oy, height, grid.height());
            for ox in 0..width {
                let gx = sample(ox, width, grid.width());
                let color = grid
                    .get(gx, gy)
                    .map(|code| palette.to_display(code))
                    .unwrap_or_else(|| palette.background_rgb());
                pixels.push(color);
            }
        }
        Overview {
            width,
            height,
            pixels,
            version,
        }
    }
}

/// Nearest grid index for output index `out` of `out_len` samples.
fn sample(out: u32, out_len: u32, grid_len: u32) -> u32 {
    let idx = (out as u64 * grid_len as u64) / out_len.max(1) as u64;
    (idx as u32).min(grid_len.saturating_sub(1))
}
