//! Throttled, dirty-region driven painting of the grid onto a pixel surface.

use std::{mem, time::Instant};

use bitflags::bitflags;
use canvas_proto::ColorCode;

use crate::camera::Camera;
use crate::grid::{Grid, GridRect, GridVersion};
use crate::palette::{Palette, Rgb};
use crate::projection::{Projection, ScreenRect, Viewport};
use crate::throttle::Throttle;

/// Dirty rectangles beyond this count collapse into a full redraw.
pub const MAX_DIRTY_RECTS: usize = 64;

/// Drawing target supplied by the host.
pub trait PixelSurface {
    fn clear(&mut self, color: Rgb);
    fn fill_rect(&mut self, rect: ScreenRect, color: Rgb);
    fn present(&mut self);
}

impl<S: PixelSurface + ?Sized> PixelSurface for Box<S> {
    fn clear(&mut self, color: Rgb) {
        (**self).clear(color);
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgb) {
        (**self).fill_rect(rect, color);
    }

    fn present(&mut self) {
        (**self).present();
    }
}

bitflags! {
    /// Why a redraw was requested since the last draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Invalidation: u8 {
        const CELLS = 1 << 0;
        const FULL_GRID = 1 << 1;
        const CAMERA = 1 << 2;
        const VIEWPORT = 1 << 3;
        /// Reasons that repaint everything visible.
        const REPAINT = Self::FULL_GRID.bits() | Self::CAMERA.bits() | Self::VIEWPORT.bits();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DirtyRegion {
    #[default]
    Clean,
    Cells(Vec<GridRect>),
    Full,
}

impl DirtyRegion {
    pub fn add_rect(&mut self, rect: GridRect) {
        if rect.is_empty() {
            return;
        }
        match self {
            DirtyRegion::Full => {}
            DirtyRegion::Clean => *self = DirtyRegion::Cells(vec![rect]),
            DirtyRegion::Cells(rects) => {
                if rects.iter().any(|existing| existing.intersect(&rect) == Some(rect)) {
                    return;
                }
                if rects.len() >= MAX_DIRTY_RECTS {
                    *self = DirtyRegion::Full;
                } else {
                    rects.push(rect);
                }
            }
        }
    }

    pub fn mark_full(&mut self) {
        *self = DirtyRegion::Full;
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, DirtyRegion::Clean)
    }

    pub fn take(&mut self) -> DirtyRegion {
        mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    Full,
    Partial { rects: usize },
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub full_draws: u64,
    pub partial_draws: u64,
    pub skipped_draws: u64,
    pub fill_calls: u64,
    pub last_grid_version: Option<GridVersion>,
    pub last_camera_version: Option<u64>,
}

/// Collects invalidations and decides when and how much to repaint.
///
/// Callers report changes with the `invalidate_*` methods and then
/// [`RenderScheduler::signal`]; a `true` from `signal` or `poll` means a draw
/// is due now.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    throttle: Throttle,
    dirty: DirtyRegion,
    reasons: Invalidation,
    drawn_viewport: Option<Viewport>,
    stats: RenderStats,
}

impl RenderScheduler {
    pub fn new(frame_budget: std::time::Duration) -> Self {
        Self {
            throttle: Throttle::new(frame_budget),
            dirty: DirtyRegion::Clean,
            reasons: Invalidation::empty(),
            drawn_viewport: None,
            stats: RenderStats::default(),
        }
    }

    pub fn invalidate_cells(&mut self, rect: GridRect) {
        self.dirty.add_rect(rect);
        self.reasons |= Invalidation::CELLS;
    }

    pub fn invalidate_all(&mut self, reason: Invalidation) {
        self.dirty.mark_full();
        self.reasons |= reason;
    }

    pub fn signal(&mut self, now: Instant) -> bool {
        self.throttle.signal(now)
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        self.throttle.poll(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.next_deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.throttle.is_pending()
    }

    pub fn cancel(&mut self) {
        self.throttle.cancel();
    }

    pub fn pending_reasons(&self) -> Invalidation {
        self.reasons
    }

    pub fn dirty(&self) -> &DirtyRegion {
        &self.dirty
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Paints whatever changed since the previous draw.
    ///
    /// Any reason in [`Invalidation::REPAINT`] repaints the visible grid. A
    /// camera or viewport that differs from the last draw counts as one even
    /// when nobody reported it, and so does a grid version change with no
    /// recorded rectangles. Otherwise only the dirty rectangles are painted.
    pub fn draw<S: PixelSurface + ?Sized>(
        &mut self,
        now: Instant,
        grid: &Grid,
        version: GridVersion,
        camera: &Camera,
        palette: &Palette,
        surface: &mut S,
    ) -> DrawOutcome {
        self.throttle.mark_fired(now);
        let viewport = camera.viewport();
        let dirty = self.dirty.take();
        let mut reasons = mem::replace(&mut self.reasons, Invalidation::empty());
        if self.stats.last_camera_version != Some(camera.version()) {
            reasons |= Invalidation::CAMERA;
        }
        if self.drawn_viewport != Some(viewport) {
            reasons |= Invalidation::VIEWPORT;
        }
        match dirty {
            DirtyRegion::Full => reasons |= Invalidation::FULL_GRID,
            DirtyRegion::Clean if self.stats.last_grid_version != Some(version) => {
                reasons |= Invalidation::FULL_GRID;
            }
            DirtyRegion::Cells(_) => reasons |= Invalidation::CELLS,
            DirtyRegion::Clean => {}
        }

        let projection = camera.projection();
        let visible = projection.visible_grid_rect(viewport, grid.width(), grid.height());
        let mut painter = Painter {
            grid,
            palette,
            projection,
            surface: &mut *surface,
            fills: 0,
        };

        let outcome = if reasons.intersects(Invalidation::REPAINT) {
            painter.full(visible);
            DrawOutcome::Full
        } else if let DirtyRegion::Cells(rects) = dirty {
            let mut painted = 0;
            for rect in rects.iter().filter_map(|rect| rect.intersect(&visible)) {
                painter.cells(rect, false);
                painted += 1;
            }
            DrawOutcome::Partial { rects: painted }
        } else {
            DrawOutcome::Skipped
        };

        let fills = painter.fills;
        match outcome {
            DrawOutcome::Skipped => {
                self.stats.skipped_draws += 1;
                return outcome;
            }
            DrawOutcome::Full => self.stats.full_draws += 1,
            DrawOutcome::Partial { .. } => self.stats.partial_draws += 1,
        }
        surface.present();
        self.stats.fill_calls += fills;
        self.stats.last_grid_version = Some(version);
        self.stats.last_camera_version = Some(camera.version());
        self.drawn_viewport = Some(viewport);
        tracing::trace!(
            target: "pixel_canvas::render",
            ?outcome,
            ?reasons,
            grid_version = version,
            camera_version = camera.version(),
            fills,
            "render.drawn"
        );
        outcome
    }
}

struct Painter<'a, S: PixelSurface + ?Sized> {
    grid: &'a Grid,
    palette: &'a Palette,
    projection: Projection,
    surface: &'a mut S,
    fills: u64,
}

impl<S: PixelSurface + ?Sized> Painter<'_, S> {
    fn full(&mut self, visible: GridRect) {
        self.surface.clear(self.palette.background_rgb());
        if !visible.is_empty() {
            self.cells(visible, true);
        }
    }

    /// Paints `rect` row by row, one fill per run of equal codes. Runs that
    /// display as the background are skipped right after a clear.
    fn cells(&mut self, rect: GridRect, cleared: bool) {
        let background = self.palette.background_rgb();
        for y in rect.y..rect.bottom() {
            let row = &self.grid.row(y)[rect.x as usize..rect.right() as usize];
            let mut start = 0usize;
            while start < row.len() {
                let code: ColorCode = row[start];
                let run = row[start..].iter().take_while(|&&c| c == code).count();
                let color = self.palette.to_display(code);
                if !(cleared && color == background) {
                    let cells = GridRect::new(rect.x + start as u32, y, run as u32, 1);
                    self.surface
                        .fill_rect(self.projection.grid_rect_to_screen(cells), color);
                    self.fills += 1;
                }
                start += run;
            }
        }
    }
}
