use std::collections::VecDeque;

use canvas_core::{
    ColorCode, ConnectionState, CooldownActive, CooldownState, GridVersion, MiniRect, Overview,
    Palette, RenderStats, Rgb, SessionEvent,
};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::Frame;

use crate::surface::{to_color, TerminalSurface};

const SIDEBAR_WIDTH: u16 = 36;
const OUTLINE: Rgb = Rgb::new(0xFF, 0xD7, 0x00);

pub struct UiState {
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub selected_color: ColorCode,
    pub connection: ConnectionState,
    pub offline: bool,
    pub cooldown: CooldownState,
    pub hover: Option<(u32, u32)>,
    pub grid_version: GridVersion,
    pub notice: Option<String>,
}

impl UiState {
    pub fn new(selected_color: ColorCode) -> Self {
        Self {
            logs: VecDeque::new(),
            max_logs: 64,
            selected_color,
            connection: ConnectionState::Stopped,
            offline: false,
            cooldown: CooldownState::Ready,
            hover: None,
            grid_version: 0,
            notice: None,
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn apply_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::GridChanged { version } => self.grid_version = version,
            SessionEvent::CameraChanged { .. } => {}
            SessionEvent::CooldownChanged(state) => self.cooldown = state,
            SessionEvent::ConnectionChanged(state) => {
                if state == ConnectionState::Open {
                    self.offline = false;
                }
                self.connection = state;
            }
            SessionEvent::PersistentDisconnect => {
                self.offline = true;
                self.push_log("Connection lost. Restart the viewer to reconnect.");
            }
        }
    }

    pub fn cooldown_banner(&self) -> String {
        match self.cooldown {
            CooldownState::Ready => "Ready to place".to_string(),
            CooldownState::Cooldown { remaining } => format!(
                "Wait {}s before placing next pixel",
                CooldownActive { remaining }.remaining_secs()
            ),
        }
    }
}

/// Screen regions of the viewer. Inner rects exclude block borders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewLayout {
    pub canvas: Rect,
    pub status: Rect,
    pub palette: Rect,
    pub minimap: Rect,
    pub logs: Rect,
}

impl ViewLayout {
    pub fn new(area: Rect) -> Self {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(16), Constraint::Length(SIDEBAR_WIDTH)])
            .split(area);
        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(7),
                Constraint::Length(6),
                Constraint::Length(14),
                Constraint::Min(3),
            ])
            .split(columns[1]);
        Self {
            canvas: columns[0],
            status: sidebar[0],
            palette: sidebar[1],
            minimap: sidebar[2],
            logs: sidebar[3],
        }
    }

    pub fn canvas_inner(&self) -> Rect {
        inner(self.canvas)
    }

    pub fn minimap_inner(&self) -> Rect {
        inner(self.minimap)
    }

    /// Minimap edge length in half-block pixels.
    pub fn minimap_size(&self) -> u16 {
        let area = self.minimap_inner();
        area.width.min(area.height.saturating_mul(2))
    }
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

/// Everything borrowed from the session for one frame.
pub struct FrameView<'a> {
    pub surface: &'a TerminalSurface,
    pub overview: Option<&'a Overview>,
    pub outline: MiniRect,
    pub minimap_extent: (f64, f64),
    pub palette: &'a Palette,
    pub zoom: String,
    pub stats: RenderStats,
}

pub fn draw_ui(frame: &mut Frame, state: &UiState, view: &FrameView) {
    let layout = ViewLayout::new(frame.size());

    let title = match state.hover {
        Some((x, y)) => format!("Canvas ({x}, {y})"),
        None => "Canvas".to_string(),
    };
    frame.render_widget(Block::default().borders(Borders::ALL).title(title), layout.canvas);
    frame.render_widget(view.surface.widget(), layout.canvas_inner());

    draw_status(frame, layout.status, state, view);
    draw_palette(frame, layout.palette, state, view.palette);
    draw_minimap(frame, layout.minimap, view);
    draw_logs(frame, layout.logs, state);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &UiState, view: &FrameView) {
    let block = Block::default().borders(Borders::ALL).title("Pixel Canvas");
    let connection = if state.offline {
        Span::styled("offline", Style::default().fg(Color::Red))
    } else {
        let color = match state.connection {
            ConnectionState::Open => Color::Green,
            ConnectionState::Connecting { .. } | ConnectionState::Closed { .. } => Color::Yellow,
            ConnectionState::Disconnected | ConnectionState::Stopped => Color::Red,
        };
        Span::styled(state.connection.to_string(), Style::default().fg(color))
    };
    let cooldown_style = if state.cooldown.is_ready() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };
    let mut lines = vec![
        Line::from(vec![Span::raw("link  "), connection]),
        Line::from(vec![
            Span::raw("zoom  "),
            Span::styled(view.zoom.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                "  frames {}/{}",
                view.stats.full_draws, view.stats.partial_draws
            )),
        ]),
        Line::from(Span::styled(state.cooldown_banner(), cooldown_style)),
    ];
    if let Some(notice) = &state.notice {
        lines.push(Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner(area));
}

fn draw_palette(frame: &mut Frame, area: Rect, state: &UiState, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Colors (Tab to cycle)");
    let spans: Vec<Span> = palette
        .codes()
        .map(|code| {
            let swatch = to_color(palette.to_display(code));
            if code == state.selected_color {
                Span::styled(
                    "[]",
                    Style::default()
                        .bg(swatch)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::styled("  ", Style::default().bg(swatch))
            }
        })
        .collect();
    let lines = vec![
        Line::from(spans),
        Line::from(Span::raw(format!("selected {}", state.selected_color))),
    ];
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner(area));
}

fn draw_minimap(frame: &mut Frame, area: Rect, view: &FrameView) {
    frame.render_widget(Block::default().borders(Borders::ALL).title("Map"), area);
    if let Some(overview) = view.overview {
        frame.render_widget(
            MiniMapView {
                overview,
                outline: view.outline,
                extent: view.minimap_extent,
            },
            inner(area),
        );
    }
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner(area));
}

/// Overview image scaled onto the minimap extent, with the camera outline.
struct MiniMapView<'a> {
    overview: &'a Overview,
    outline: MiniRect,
    extent: (f64, f64),
}

impl MiniMapView<'_> {
    fn pixel(&self, mx: u16, my: u16) -> Option<Rgb> {
        let (extent_w, extent_h) = self.extent;
        let (fx, fy) = (mx as f64 + 0.5, my as f64 + 0.5);
        if fx >= extent_w || fy >= extent_h {
            return None;
        }
        if on_outline(&self.outline, fx, fy) {
            return Some(OUTLINE);
        }
        let ox = (fx / extent_w * self.overview.width as f64) as u32;
        let oy = (fy / extent_h * self.overview.height as f64) as u32;
        self.overview.pixel(ox, oy)
    }
}

fn on_outline(rect: &MiniRect, x: f64, y: f64) -> bool {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return false;
    }
    let inside_x = x >= rect.x && x <= rect.x + rect.width;
    let inside_y = y >= rect.y && y <= rect.y + rect.height;
    let near_vertical = (x - rect.x).abs() < 1.0 || (x - (rect.x + rect.width)).abs() < 1.0;
    let near_horizontal = (y - rect.y).abs() < 1.0 || (y - (rect.y + rect.height)).abs() < 1.0;
    (inside_y && near_vertical) || (inside_x && near_horizontal)
}

impl Widget for MiniMapView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..area.height {
            for column in 0..area.width {
                let top = self.pixel(column, row * 2);
                let bottom = self.pixel(column, row * 2 + 1);
                let (Some(top), bottom) = (top, bottom) else {
                    continue;
                };
                let cell = buf.get_mut(area.x + column, area.y + row);
                cell.set_char('▀').set_fg(to_color(top));
                if let Some(bottom) = bottom {
                    cell.set_bg(to_color(bottom));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::CanvasConfig;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::time::Duration;

    #[test]
    fn cooldown_banner_rounds_up_seconds() {
        let mut state = UiState::new(1);
        assert_eq!(state.cooldown_banner(), "Ready to place");
        state.apply_event(SessionEvent::CooldownChanged(CooldownState::Cooldown {
            remaining: Duration::from_millis(2_100),
        }));
        assert_eq!(state.cooldown_banner(), "Wait 3s before placing next pixel");
    }

    #[test]
    fn persistent_disconnect_marks_offline_until_reopened() {
        let mut state = UiState::new(1);
        state.apply_event(SessionEvent::ConnectionChanged(ConnectionState::Disconnected));
        state.apply_event(SessionEvent::PersistentDisconnect);
        assert!(state.offline);
        assert_eq!(state.logs.len(), 1);
        state.apply_event(SessionEvent::ConnectionChanged(ConnectionState::Open));
        assert!(!state.offline);
    }

    #[test]
    fn logs_are_trimmed_and_bounded() {
        let mut state = UiState::new(0);
        state.max_logs = 2;
        state.push_log("one\n");
        state.push_log("\n");
        state.push_log("two");
        state.push_log("three");
        assert_eq!(state.logs, VecDeque::from(vec!["three".to_string(), "two".to_string()]));
    }

    #[test]
    fn layout_reserves_sidebar() {
        let layout = ViewLayout::new(Rect::new(0, 0, 120, 40));
        assert_eq!(layout.canvas.width, 120 - SIDEBAR_WIDTH);
        assert_eq!(layout.minimap_size(), 24);
    }

    #[test]
    fn full_frame_renders_into_test_backend() {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        let palette = Palette::from_config(&CanvasConfig::default()).unwrap();
        let layout = ViewLayout::new(Rect::new(0, 0, 100, 40));
        let inner = layout.canvas_inner();
        let surface = TerminalSurface::for_cells(inner.width, inner.height);
        let overview = Overview {
            width: 2,
            height: 2,
            pixels: vec![Rgb::BLACK; 4],
            version: 0,
        };
        let view = FrameView {
            surface: &surface,
            overview: Some(&overview),
            outline: MiniRect::new(0.0, 0.0, 4.0, 4.0),
            minimap_extent: (24.0, 24.0),
            palette: &palette,
            zoom: "1.0x".to_string(),
            stats: RenderStats::default(),
        };
        let mut state = UiState::new(3);
        state.hover = Some((4, 5));
        terminal.draw(|frame| draw_ui(frame, &state, &view)).unwrap();
        let buffer = terminal.backend().buffer();
        let title: String = (1..13).map(|x| buffer.get(x, 0).symbol().to_string()).collect();
        assert_eq!(title, "Canvas (4, 5");
    }
}
