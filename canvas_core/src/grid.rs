use canvas_proto::{BatchUpdate, ColorCode, Pixel, WireColor};

/// Counts mutation batches applied to a [`GridStore`].
pub type GridVersion = u64;

/// Half-open rectangle of grid cells: `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl GridRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn cell(x: u32, y: u32) -> Self {
        Self::new(x, y, 1, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersect(&self, other: &GridRect) -> Option<GridRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x0 < x1 && y0 < y1).then(|| GridRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn union(&self, other: &GridRect) -> GridRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        GridRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Dense row-major grid of color codes. Every slot always holds a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<ColorCode>,
}

impl Grid {
    pub fn new(width: u32, height: u32, fill: ColorCode) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> GridRect {
        GridRect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Resolves signed coordinates to an in-bounds cell.
    #[inline]
    pub fn locate(&self, x: i64, y: i64) -> Option<(u32, u32)> {
        let inside = x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64;
        inside.then_some((x as u32, y as u32))
    }

    pub fn get(&self, x: u32, y: u32) -> Option<ColorCode> {
        (x < self.width && y < self.height).then(|| self.cells[self.index(x, y)])
    }

    #[inline]
    pub fn cell(&self, x: u32, y: u32) -> ColorCode {
        debug_assert!(x < self.width && y < self.height);
        self.cells[self.index(x, y)]
    }

    pub fn row(&self, y: u32) -> &[ColorCode] {
        let start = self.index(0, y);
        &self.cells[start..start + self.width as usize]
    }

    pub fn cells(&self) -> &[ColorCode] {
        &self.cells
    }

    #[inline]
    fn set(&mut self, x: u32, y: u32, color: ColorCode) {
        let idx = self.index(x, y);
        self.cells[idx] = color;
    }
}

/// Sole owner of the client's copy of the canvas.
#[derive(Debug, Clone)]
pub struct GridStore {
    grid: Grid,
    version: GridVersion,
    background: ColorCode,
    transparent: ColorCode,
}

impl GridStore {
    pub fn new(width: u32, height: u32, background: ColorCode, transparent: ColorCode) -> Self {
        Self {
            grid: Grid::new(width, height, background),
            version: 0,
            background,
            transparent,
        }
    }

    pub fn read(&self) -> (&Grid, GridVersion) {
        (&self.grid, self.version)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn version(&self) -> GridVersion {
        self.version
    }

    pub fn transparent(&self) -> ColorCode {
        self.transparent
    }

    /// Writes one cell. Out-of-range targets (peers on a larger logical grid)
    /// and the transparency sentinel are dropped without touching the version.
    pub fn apply_pixel(&mut self, pixel: &Pixel) -> Option<GridRect> {
        let Some(code) = self.cell_code(pixel.color) else {
            tracing::trace!(x = pixel.x, y = pixel.y, "grid.pixel_dropped=sentinel");
            return None;
        };
        let Some((x, y)) = self.grid.locate(pixel.x, pixel.y) else {
            tracing::trace!(x = pixel.x, y = pixel.y, "grid.pixel_dropped=out_of_bounds");
            return None;
        };
        self.grid.set(x, y, code);
        self.version += 1;
        Some(GridRect::cell(x, y))
    }

    /// Overlays a rectangular region, skipping sentinel and out-of-range
    /// cells. The version moves exactly once per batch, even when nothing was
    /// written. Returns the bounding rectangle of the cells written.
    pub fn apply_batch(&mut self, batch: &BatchUpdate) -> Option<GridRect> {
        let mut written: Option<GridRect> = None;
        for (row_offset, row) in batch.grid.iter().enumerate() {
            let target_y = batch.start_y.saturating_add(row_offset as i64);
            if target_y < 0 || target_y >= self.grid.height as i64 {
                continue;
            }
            let mut row_span: Option<(u32, u32)> = None;
            for (col_offset, &wire) in row.iter().enumerate() {
                let Some(code) = self.cell_code(wire) else {
                    continue;
                };
                let target_x = batch.start_x.saturating_add(col_offset as i64);
                let Some((x, y)) = self.grid.locate(target_x, target_y) else {
                    continue;
                };
                self.grid.set(x, y, code);
                row_span = Some(match row_span {
                    Some((first, _)) => (first, x),
                    None => (x, x),
                });
            }
            if let Some((first, last)) = row_span {
                let rect = GridRect::new(first, target_y as u32, last - first + 1, 1);
                written = Some(written.map_or(rect, |acc| acc.union(&rect)));
            }
        }
        self.version += 1;
        written
    }

    /// Replaces the whole grid from a snapshot. Extra rows or columns are
    /// ignored; missing cells and sentinel cells become the background.
    pub fn replace_all(&mut self, rows: &[Vec<WireColor>]) {
        let mut grid = Grid::new(self.grid.width, self.grid.height, self.background);
        for (y, row) in rows.iter().take(grid.height as usize).enumerate() {
            for (x, &wire) in row.iter().take(grid.width as usize).enumerate() {
                if let Some(code) = self.cell_code(wire) {
                    grid.set(x as u32, y as u32, code);
                }
            }
        }
        if rows.len() != self.grid.height as usize
            || rows.iter().any(|row| row.len() != self.grid.width as usize)
        {
            tracing::debug!(
                rows = rows.len(),
                expected_width = self.grid.width,
                expected_height = self.grid.height,
                "grid.snapshot_reshaped"
            );
        }
        self.grid = grid;
        self.version += 1;
    }

    /// Stored value for a wire code; `None` for the transparency sentinel.
    /// Codes too wide for a cell would only ever display as the background,
    /// so they are stored as it.
    fn cell_code(&self, wire: WireColor) -> Option<ColorCode> {
        if wire == WireColor::from(self.transparent) {
            return None;
        }
        Some(ColorCode::try_from(wire).unwrap_or(self.background))
    }
}
