use std::{collections::BTreeMap, fmt, str::FromStr};

use canvas_proto::ColorCode;
use thiserror::Error;

use crate::config::{CanvasConfig, CanvasConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRgbError {
    #[error("expected #RRGGBB, got {0:?}")]
    Format(String),
}

impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseRgbError::Format(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseRgbError::Format(s.to_string()))
        };
        Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Fixed lookup from color codes to display colors.
///
/// Codes missing from the table render as the background color: peers may be
/// running a newer palette.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: BTreeMap<ColorCode, Rgb>,
    background: ColorCode,
    fallback: Rgb,
}

impl Palette {
    pub fn new(
        colors: impl IntoIterator<Item = (ColorCode, Rgb)>,
        background: ColorCode,
    ) -> Self {
        let colors: BTreeMap<ColorCode, Rgb> = colors.into_iter().collect();
        let fallback = colors.get(&background).copied().unwrap_or(Rgb::WHITE);
        Self {
            colors,
            background,
            fallback,
        }
    }

    pub fn from_config(config: &CanvasConfig) -> Result<Self, CanvasConfigError> {
        Ok(Self::new(config.display_colors()?, config.background_color))
    }

    #[inline]
    pub fn to_display(&self, code: ColorCode) -> Rgb {
        self.colors.get(&code).copied().unwrap_or(self.fallback)
    }

    pub fn contains(&self, code: ColorCode) -> bool {
        self.colors.contains_key(&code)
    }

    pub fn background(&self) -> ColorCode {
        self.background
    }

    pub fn background_rgb(&self) -> Rgb {
        self.fallback
    }

    /// Paintable codes in ascending order, as shown by the palette picker.
    pub fn codes(&self) -> impl Iterator<Item = ColorCode> + '_ {
        self.colors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Next paintable code after `code`, wrapping around.
    pub fn cycle(&self, code: ColorCode) -> ColorCode {
        self.colors
            .range(code.saturating_add(1)..)
            .next()
            .filter(|_| code != ColorCode::MAX)
            .or_else(|| self.colors.iter().next())
            .map(|(&next, _)| next)
            .unwrap_or(code)
    }
}
