//! Client engine for a shared, collaboratively painted pixel canvas.
//!
//! Keeps a local copy of the grid in sync with the server's update stream,
//! projects it through a pan/zoom camera, and repaints only what changed at
//! a bounded frame rate. The engine is sans-IO: hosts supply a
//! [`Transport`] and a [`PixelSurface`], pass the current [`Instant`] into
//! every call, and drive timers through [`CanvasSession::poll`].
//!
//! [`Instant`]: std::time::Instant

pub mod camera;
pub mod config;
pub mod cooldown;
pub mod grid;
pub mod minimap;
pub mod palette;
pub mod projection;
pub mod render;
mod session;
pub mod stream;
mod throttle;
mod timer;

pub use camera::Camera;
pub use config::{
    load_canvas_config_from_env, CanvasConfig, CanvasConfigError, CanvasConfigMetadata,
    BUILTIN_CANVAS_CONFIG, CANVAS_CONFIG_ENV,
};
pub use cooldown::{CooldownActive, CooldownState, PlacementLimiter};
pub use grid::{Grid, GridRect, GridStore, GridVersion};
pub use minimap::{MiniMap, MiniRect, Overview};
pub use palette::{Palette, ParseRgbError, Rgb};
pub use projection::{Projection, ScreenRect, Viewport};
pub use render::{
    DirtyRegion, DrawOutcome, Invalidation, PixelSurface, RenderScheduler, RenderStats,
    MAX_DIRTY_RECTS,
};
pub use session::{CanvasSession, PlaceError, Placement, SessionEvent};
pub use stream::{
    ConnectionState, GridEvent, ReconnectPolicy, StreamClient, Transport, TransportError,
};
pub use throttle::Throttle;
pub use timer::TimerSlot;

pub use canvas_proto::{ColorCode, Pixel, WireColor};
