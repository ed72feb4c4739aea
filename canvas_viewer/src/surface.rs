use canvas_core::{PixelSurface, Rgb, ScreenRect};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

/// Off-screen framebuffer the session paints into.
///
/// One terminal cell shows two vertically stacked surface pixels using the
/// upper half block glyph, so a `w × h` cell area backs a `w × 2h` surface.
pub struct TerminalSurface {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
    frames: u64,
}

impl TerminalSurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgb::WHITE; width as usize * height as usize],
            frames: 0,
        }
    }

    /// Surface size for a terminal cell area.
    pub fn for_cells(columns: u16, rows: u16) -> Self {
        Self::new(columns, rows.saturating_mul(2))
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Reallocates to the new size. Returns `false` when nothing changed.
    pub fn resize(&mut self, width: u16, height: u16) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgb::WHITE; width as usize * height as usize];
        true
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Rgb> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }

    pub fn widget(&self) -> SurfaceView<'_> {
        SurfaceView { surface: self }
    }
}

impl PixelSurface for TerminalSurface {
    fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    fn fill_rect(&mut self, rect: ScreenRect, color: Rgb) {
        // Edges round to the nearest pixel so adjacent cells tile exactly.
        let x0 = rect.x.round().max(0.0).min(self.width as f64) as usize;
        let y0 = rect.y.round().max(0.0).min(self.height as f64) as usize;
        let x1 = rect.right().round().max(0.0).min(self.width as f64) as usize;
        let y1 = rect.bottom().round().max(0.0).min(self.height as f64) as usize;
        if x0 >= x1 {
            return;
        }
        let stride = self.width as usize;
        for y in y0..y1 {
            self.pixels[y * stride + x0..y * stride + x1].fill(color);
        }
    }

    fn present(&mut self) {
        self.frames += 1;
    }
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

pub struct SurfaceView<'a> {
    surface: &'a TerminalSurface,
}

impl Widget for SurfaceView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let columns = area.width.min(self.surface.width);
        let rows = area.height.min(self.surface.height.div_ceil(2));
        for row in 0..rows {
            for column in 0..columns {
                let top = self.surface.pixel(column, row * 2).unwrap_or(Rgb::WHITE);
                let bottom = self.surface.pixel(column, row * 2 + 1).unwrap_or(top);
                buf.get_mut(area.x + column, area.y + row)
                    .set_char('▀')
                    .set_fg(to_color(top))
                    .set_bg(to_color(bottom));
            }
        }
    }
}
