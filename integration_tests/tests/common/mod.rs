#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use anyhow::Context;
use canvas_core::{
    CanvasConfig, CanvasSession, PixelSurface, Rgb, ScreenRect, SessionEvent, Transport,
    TransportError, Viewport, CANVAS_CONFIG_ENV,
};
use crossbeam_channel::Receiver;

static INIT: Once = Once::new();

pub type TestSession = CanvasSession<ScriptedTransport, RecordingSurface>;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path("small_canvas.json");

        debug_assert!(
            config_path.exists(),
            "missing test canvas config at {}",
            config_path.display()
        );

        std::env::set_var(CANVAS_CONFIG_ENV, &config_path);
    });
}

pub fn fixture_config() -> anyhow::Result<Arc<CanvasConfig>> {
    let path = fixture_path("small_canvas.json");
    let config = CanvasConfig::from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(Arc::new(config))
}

/// 10×10 canvas in an 80×80 viewport: the whole grid is visible at zoom 1.
pub fn new_session(config: Arc<CanvasConfig>) -> anyhow::Result<TestSession> {
    Ok(CanvasSession::new(
        config,
        ScriptedTransport::default(),
        RecordingSurface::default(),
        Viewport::new(80.0, 80.0),
    )?)
}

/// Server packets from a fixture, one encoded frame per array entry.
pub fn load_script(name: &str) -> anyhow::Result<Vec<Vec<u8>>> {
    let path = fixture_path(name);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let steps: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
    steps
        .iter()
        .map(|step| serde_json::to_vec(step).map_err(Into::into))
        .collect()
}

pub fn drain(events: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
    events.try_iter().collect()
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    pub connects: Vec<String>,
    pub sent: Vec<String>,
    pub closes: usize,
    pub refuse: bool,
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        self.connects.push(endpoint.to_string());
        if self.refuse {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub clears: usize,
    pub fills: Vec<(ScreenRect, Rgb)>,
    pub presents: usize,
}

impl PixelSurface for RecordingSurface {
    fn clear(&mut self, _color: Rgb) {
        self.clears += 1;
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgb) {
        self.fills.push((rect, color));
    }

    fn present(&mut self) {
        self.presents += 1;
    }
}
