use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use canvas_proto::{ColorCode, Pixel, WireColor};
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::camera::Camera;
use crate::config::{CanvasConfig, CanvasConfigError};
use crate::cooldown::{CooldownActive, CooldownState, PlacementLimiter};
use crate::grid::{Grid, GridStore, GridVersion};
use crate::minimap::{MiniMap, MiniRect, Overview};
use crate::palette::Palette;
use crate::projection::Viewport;
use crate::render::{DrawOutcome, Invalidation, PixelSurface, RenderScheduler, RenderStats};
use crate::stream::{ConnectionState, GridEvent, ReconnectPolicy, StreamClient, Transport};
use crate::timer::earliest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    GridChanged { version: GridVersion },
    CameraChanged { version: u64 },
    CooldownChanged(CooldownState),
    ConnectionChanged(ConnectionState),
    /// Reconnect attempts are exhausted; the canvas stays usable offline.
    PersistentDisconnect,
}

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error(transparent)]
    CoolingDown(#[from] CooldownActive),
    #[error("cell ({x}, {y}) is outside the canvas")]
    OutOfBounds { x: i64, y: i64 },
    #[error("color {0} is not in the palette")]
    UnknownColor(ColorCode),
}

/// Accepted local placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub pixel: Pixel,
    /// Whether the placement reached the transport. Placements made while the
    /// connection is down are accepted locally but never queued.
    pub sent: bool,
}

/// One live canvas: the local grid copy, the view onto it, and the link to
/// the server.
///
/// All state changes go through `&mut self` on a single thread. Time is
/// passed in explicitly; the host calls [`CanvasSession::poll`] no later than
/// [`CanvasSession::next_deadline`].
pub struct CanvasSession<T, S>
where
    T: Transport,
    S: PixelSurface,
{
    config: Arc<CanvasConfig>,
    palette: Palette,
    store: GridStore,
    camera: Camera,
    scheduler: RenderScheduler,
    limiter: PlacementLimiter,
    minimap: MiniMap,
    stream: StreamClient<T>,
    surface: S,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl<T, S> CanvasSession<T, S>
where
    T: Transport,
    S: PixelSurface,
{
    pub fn new(
        config: Arc<CanvasConfig>,
        transport: T,
        surface: S,
        viewport: Viewport,
    ) -> Result<Self, CanvasConfigError> {
        config.validate()?;
        let palette = Palette::from_config(&config)?;
        let store = GridStore::new(
            config.grid_width,
            config.grid_height,
            config.background_color,
            config.transparent_color,
        );
        let stream = StreamClient::new(
            transport,
            config.endpoint.clone(),
            ReconnectPolicy::from_config(&config),
        );
        tracing::debug!(
            target: "pixel_canvas::session",
            width = config.grid_width,
            height = config.grid_height,
            colors = palette.len(),
            endpoint = %config.endpoint,
            "session.created"
        );
        Ok(Self {
            camera: Camera::from_config(&config, viewport),
            scheduler: RenderScheduler::new(config.frame_budget()),
            limiter: PlacementLimiter::new(config.cooldown(), config.cooldown_tick()),
            minimap: MiniMap::from_config(&config),
            palette,
            store,
            stream,
            surface,
            subscribers: Vec::new(),
            config,
        })
    }

    /// Connects and paints the initial background.
    pub fn start(&mut self, now: Instant) {
        let states = self.stream.start(now);
        self.publish_connection(states);
        self.scheduler.invalidate_all(Invalidation::FULL_GRID);
        self.request_draw(now);
    }

    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn config(&self) -> &Arc<CanvasConfig> {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn grid(&self) -> (&Grid, GridVersion) {
        self.store.read()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn cooldown_state(&self) -> CooldownState {
        self.limiter.state()
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.limiter.remaining(now)
    }

    pub fn render_stats(&self) -> RenderStats {
        self.scheduler.stats()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn transport(&self) -> &T {
        self.stream.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.stream.transport_mut()
    }

    pub fn on_transport_open(&mut self, _now: Instant) {
        if let Some(state) = self.stream.handle_open() {
            self.publish_connection([state]);
        }
    }

    pub fn on_transport_frame(&mut self, now: Instant, payload: &[u8]) {
        if let Some(event) = self.stream.handle_frame(payload) {
            self.apply_event(now, event);
        }
    }

    pub fn on_transport_closed(&mut self, now: Instant) {
        if let Some(state) = self.stream.handle_closed(now) {
            self.publish_connection([state]);
        }
    }

    /// Applies one inbound change to the grid and schedules a redraw.
    pub fn apply_event(&mut self, now: Instant, event: GridEvent) {
        let before = self.store.version();
        match event {
            GridEvent::Pixels(pixels) => {
                for pixel in &pixels {
                    if let Some(rect) = self.store.apply_pixel(pixel) {
                        self.scheduler.invalidate_cells(rect);
                    }
                }
            }
            GridEvent::Batch(batch) => {
                if let Some(rect) = self.store.apply_batch(&batch) {
                    self.scheduler.invalidate_cells(rect);
                }
            }
            GridEvent::Snapshot(rows) => {
                self.store.replace_all(&rows);
                self.scheduler.invalidate_all(Invalidation::FULL_GRID);
            }
        }
        let version = self.store.version();
        if version != before {
            self.emit(SessionEvent::GridChanged { version });
            self.request_draw(now);
        }
    }

    pub fn pan_by(&mut self, now: Instant, dx: f64, dy: f64) -> bool {
        let changed = self.camera.pan_by(dx, dy);
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn zoom_at(&mut self, now: Instant, anchor_x: f64, anchor_y: f64, factor: f64) -> bool {
        let changed = self.camera.zoom_at(anchor_x, anchor_y, factor);
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn set_scale(&mut self, now: Instant, scale: f64) -> bool {
        let changed = self.camera.set_scale(scale);
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn reset_view(&mut self, now: Instant) -> bool {
        let changed = self.camera.reset();
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn resize(&mut self, now: Instant, width: f64, height: f64) -> bool {
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            return false;
        }
        let changed = self.camera.set_viewport(Viewport::new(width, height));
        self.after_camera(now, changed, Invalidation::VIEWPORT)
    }

    /// Grid cell under a screen point, if it lies on the canvas.
    pub fn hover(&self, px: f64, py: f64) -> Option<(u32, u32)> {
        let (gx, gy) = self.camera.projection().screen_to_grid(px, py);
        self.store.grid().locate(gx, gy)
    }

    /// Validates and places one pixel. Bounds and color are checked before
    /// the cooldown so a bad target never consumes it.
    pub fn try_place(
        &mut self,
        now: Instant,
        x: i64,
        y: i64,
        color: ColorCode,
    ) -> Result<Placement, PlaceError> {
        let Some((cx, cy)) = self.store.grid().locate(x, y) else {
            return Err(PlaceError::OutOfBounds { x, y });
        };
        if color == self.store.transparent() || !self.palette.contains(color) {
            return Err(PlaceError::UnknownColor(color));
        }
        self.limiter.try_place(now)?;
        self.emit(SessionEvent::CooldownChanged(self.limiter.state()));

        let pixel = Pixel::new(cx as i64, cy as i64, WireColor::from(color));
        let sent = self.stream.send_placement(pixel);
        tracing::debug!(
            target: "pixel_canvas::session",
            x = pixel.x,
            y = pixel.y,
            color,
            sent,
            "session.placed"
        );
        if self.config.optimistic_placement {
            self.apply_event(now, GridEvent::Pixels(vec![pixel]));
        }
        Ok(Placement { pixel, sent })
    }

    pub fn place_at_screen(
        &mut self,
        now: Instant,
        px: f64,
        py: f64,
        color: ColorCode,
    ) -> Result<Placement, PlaceError> {
        let (gx, gy) = self.camera.projection().screen_to_grid(px, py);
        self.try_place(now, gx, gy, color)
    }

    pub fn minimap(&self) -> &MiniMap {
        &self.minimap
    }

    pub fn set_minimap_size(&mut self, size: f64) {
        self.minimap.set_size(size);
    }

    pub fn minimap_viewport_rect(&self) -> MiniRect {
        self.minimap.viewport_rect(&self.camera)
    }

    pub fn minimap_overview(&mut self) -> &Overview {
        let (grid, version) = self.store.read();
        self.minimap.overview(grid, version, &self.palette)
    }

    pub fn minimap_click(&mut self, now: Instant, mx: f64, my: f64) -> bool {
        let changed = self.minimap.click(mx, my, &mut self.camera);
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn minimap_begin_drag(&mut self, mx: f64, my: f64) -> bool {
        self.minimap.begin_drag(mx, my, &self.camera)
    }

    pub fn minimap_drag_to(&mut self, now: Instant, mx: f64, my: f64) -> bool {
        let changed = self.minimap.drag_to(mx, my, &mut self.camera);
        self.after_camera(now, changed, Invalidation::CAMERA)
    }

    pub fn minimap_end_drag(&mut self) -> bool {
        self.minimap.end_drag()
    }

    /// Runs every timer that has come due.
    pub fn poll(&mut self, now: Instant) {
        let states = self.stream.poll(now);
        self.publish_connection(states);
        if let Some(state) = self.limiter.tick(now) {
            self.emit(SessionEvent::CooldownChanged(state));
        }
        if self.scheduler.poll(now) {
            self.draw(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.stream.next_deadline(),
            self.limiter.next_deadline(),
            self.scheduler.next_deadline(),
        ])
    }

    /// Paints immediately, bypassing the frame budget.
    pub fn redraw(&mut self, now: Instant) -> DrawOutcome {
        self.scheduler.invalidate_all(Invalidation::FULL_GRID);
        self.draw(now)
    }

    /// Cancels all timers and closes the transport. Safe to call twice.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.limiter.cancel();
        if let Some(state) = self.stream.shutdown() {
            self.publish_connection([state]);
        }
    }

    fn after_camera(&mut self, now: Instant, changed: bool, reason: Invalidation) -> bool {
        if changed {
            self.scheduler.invalidate_all(reason);
            self.emit(SessionEvent::CameraChanged {
                version: self.camera.version(),
            });
            self.request_draw(now);
        }
        changed
    }

    fn request_draw(&mut self, now: Instant) {
        if self.scheduler.signal(now) {
            self.draw(now);
        }
    }

    fn draw(&mut self, now: Instant) -> DrawOutcome {
        let (grid, version) = self.store.read();
        self.scheduler
            .draw(now, grid, version, &self.camera, &self.palette, &mut self.surface)
    }

    fn publish_connection(&mut self, states: impl IntoIterator<Item = ConnectionState>) {
        for state in states {
            self.emit(SessionEvent::ConnectionChanged(state));
            if state == ConnectionState::Disconnected {
                self.emit(SessionEvent::PersistentDisconnect);
            }
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T, S> Drop for CanvasSession<T, S>
where
    T: Transport,
    S: PixelSurface,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
