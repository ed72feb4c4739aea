use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvas_core::{CanvasConfig, CanvasSession, PlaceError, SessionEvent, Viewport};
use color_eyre::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::net::{ChannelTransport, NetEvent};
use crate::surface::TerminalSurface;
use crate::ui::{draw_ui, FrameView, UiState, ViewLayout};

const UI_FRAME: Duration = Duration::from_millis(33);
const PAN_STEP: f64 = 8.0;
const ZOOM_STEP: f64 = 1.25;

type Session = CanvasSession<ChannelTransport, TerminalSurface>;

pub struct ViewerApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    session: Session,
    session_events: crossbeam_channel::Receiver<SessionEvent>,
    net_events: UnboundedReceiver<NetEvent>,
    log_receiver: Receiver<String>,
    ui_state: UiState,
    layout: ViewLayout,
    pan_anchor: Option<(u16, u16)>,
}

impl ViewerApp {
    pub fn new(
        config: Arc<CanvasConfig>,
        transport: ChannelTransport,
        net_events: UnboundedReceiver<NetEvent>,
        log_receiver: Receiver<String>,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(std::io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        terminal.clear()?;
        terminal.hide_cursor()?;

        let layout = ViewLayout::new(terminal.size()?);
        let canvas = layout.canvas_inner();
        let surface = TerminalSurface::for_cells(canvas.width, canvas.height);
        let (width, height) = surface.size();
        let selected = config.color_map.keys().copied().nth(1).unwrap_or(config.background_color);
        let mut session = CanvasSession::new(
            config,
            transport,
            surface,
            Viewport::new(width as f64, height as f64),
        )?;
        session.set_minimap_size(layout.minimap_size().max(1) as f64);
        let session_events = session.subscribe();

        Ok(Self {
            terminal,
            session,
            session_events,
            net_events,
            log_receiver,
            ui_state: UiState::new(selected),
            layout,
            pan_anchor: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        self.session.start(Instant::now());
        let result = self.event_loop();
        self.session.shutdown();
        self.terminal.show_cursor()?;
        crossterm::execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        crossterm::terminal::disable_raw_mode()?;
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut last_draw: Option<Instant> = None;

        loop {
            let now = Instant::now();
            while let Ok(event) = self.net_events.try_recv() {
                match event {
                    NetEvent::Opened => self.session.on_transport_open(now),
                    NetEvent::Frame(payload) => self.session.on_transport_frame(now, &payload),
                    NetEvent::Closed { reason } => {
                        debug!(%reason, "viewer.connection_closed");
                        self.session.on_transport_closed(now);
                    }
                }
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            self.session.poll(now);
            for event in self.session_events.try_iter() {
                self.ui_state.apply_event(event);
            }

            if last_draw.map_or(true, |at| at.elapsed() >= UI_FRAME) {
                self.sync_layout(now)?;
                self.draw()?;
                last_draw = Some(Instant::now());
            }

            let timeout = self
                .session
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(UI_FRAME)
                .min(UI_FRAME);
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        if !self.handle_key(key) {
                            break;
                        }
                    }
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    _ => {}
                }
            }
        }

        info!("viewer.exit");
        Ok(())
    }

    fn sync_layout(&mut self, now: Instant) -> Result<()> {
        let layout = ViewLayout::new(self.terminal.size()?);
        if layout == self.layout {
            return Ok(());
        }
        self.layout = layout;
        let canvas = layout.canvas_inner();
        self.session
            .surface_mut()
            .resize(canvas.width, canvas.height.saturating_mul(2));
        let (width, height) = self.session.surface().size();
        self.session.set_minimap_size(layout.minimap_size().max(1) as f64);
        self.session.resize(now, width as f64, height as f64);
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        self.session.minimap_overview();
        let session = &self.session;
        let view = FrameView {
            surface: session.surface(),
            overview: session.minimap().cached_overview(),
            outline: session.minimap_viewport_rect(),
            minimap_extent: session.minimap().extent(),
            palette: session.palette(),
            zoom: session.camera().zoom_label(),
            stats: session.render_stats(),
        };
        let state = &self.ui_state;
        self.terminal.draw(|frame| draw_ui(frame, state, &view))?;
        Ok(())
    }

    /// Returns `false` when the viewer should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let now = Instant::now();
        let (cx, cy) = self.session.camera().viewport().center();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Left => {
                self.session.pan_by(now, PAN_STEP, 0.0);
            }
            KeyCode::Right => {
                self.session.pan_by(now, -PAN_STEP, 0.0);
            }
            KeyCode::Up => {
                self.session.pan_by(now, 0.0, PAN_STEP);
            }
            KeyCode::Down => {
                self.session.pan_by(now, 0.0, -PAN_STEP);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.session.zoom_at(now, cx, cy, ZOOM_STEP);
            }
            KeyCode::Char('-') | KeyCode::Char('_') => {
                self.session.zoom_at(now, cx, cy, 1.0 / ZOOM_STEP);
            }
            KeyCode::Char('r') | KeyCode::Char('0') => {
                self.session.reset_view(now);
            }
            KeyCode::Tab => {
                self.ui_state.selected_color =
                    self.session.palette().cycle(self.ui_state.selected_color);
            }
            KeyCode::Char(' ') => {
                if let Some((x, y)) = self.ui_state.hover {
                    self.place(now, x as i64, y as i64);
                }
            }
            _ => {}
        }
        true
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let now = Instant::now();
        let canvas = self.layout.canvas_inner();
        let minimap = self.layout.minimap_inner();
        let on_canvas = hit(canvas, mouse.column, mouse.row);
        let on_minimap = hit(minimap, mouse.column, mouse.row);
        let canvas_point = || {
            (
                (mouse.column - canvas.x) as f64 + 0.5,
                (mouse.row - canvas.y) as f64 * 2.0 + 1.0,
            )
        };
        let minimap_point = || {
            (
                mouse.column.saturating_sub(minimap.x) as f64 + 0.5,
                mouse.row.saturating_sub(minimap.y) as f64 * 2.0 + 1.0,
            )
        };

        match mouse.kind {
            MouseEventKind::Moved if on_canvas => {
                let (px, py) = canvas_point();
                self.ui_state.hover = self.session.hover(px, py);
            }
            MouseEventKind::Moved => self.ui_state.hover = None,
            MouseEventKind::Down(MouseButton::Left) if on_canvas => {
                let (px, py) = canvas_point();
                if let Some((x, y)) = self.session.hover(px, py) {
                    self.place(now, x as i64, y as i64);
                }
            }
            MouseEventKind::Down(MouseButton::Left) if on_minimap => {
                let (mx, my) = minimap_point();
                if !self.session.minimap_begin_drag(mx, my) {
                    self.session.minimap_click(now, mx, my);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if self.session.minimap().is_dragging() => {
                let (mx, my) = minimap_point();
                self.session.minimap_drag_to(now, mx, my);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.session.minimap_end_drag();
            }
            MouseEventKind::Down(MouseButton::Right) if on_canvas => {
                self.pan_anchor = Some((mouse.column, mouse.row));
            }
            MouseEventKind::Drag(MouseButton::Right) => {
                if let Some((column, row)) = self.pan_anchor {
                    let dx = mouse.column as f64 - column as f64;
                    let dy = (mouse.row as f64 - row as f64) * 2.0;
                    self.session.pan_by(now, dx, dy);
                    self.pan_anchor = Some((mouse.column, mouse.row));
                }
            }
            MouseEventKind::Up(MouseButton::Right) => self.pan_anchor = None,
            MouseEventKind::ScrollUp if on_canvas => {
                let (px, py) = canvas_point();
                self.session.zoom_at(now, px, py, ZOOM_STEP);
            }
            MouseEventKind::ScrollDown if on_canvas => {
                let (px, py) = canvas_point();
                self.session.zoom_at(now, px, py, 1.0 / ZOOM_STEP);
            }
            _ => {}
        }
    }

    fn place(&mut self, now: Instant, x: i64, y: i64) {
        let color = self.ui_state.selected_color;
        match self.session.try_place(now, x, y, color) {
            Ok(placement) => {
                self.ui_state.notice = None;
                if !placement.sent {
                    warn!(x, y, "viewer.placement_offline");
                }
            }
            Err(PlaceError::CoolingDown(active)) => {
                self.ui_state.notice = Some(active.to_string());
            }
            Err(err) => {
                self.ui_state.notice = Some(err.to_string());
            }
        }
    }
}

fn hit(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
}
