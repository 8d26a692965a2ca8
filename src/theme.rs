//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Most tile colours a game can use.
pub const MAX_TILE_COLORS: usize = 10;

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

/// One Dark tiles: green, yellow, red, blue, magenta, cyan, orange, white, dark red, grey.
const ONEDARK_TILES: [Color; MAX_TILE_COLORS] = [
    rgb(0x98C379),
    rgb(0xE5C07B),
    rgb(0xE06C75),
    rgb(0x61AFEF),
    rgb(0xC678DD),
    rgb(0x56B6C2),
    rgb(0xD19A66),
    rgb(0xDCDFE4),
    rgb(0xBE5046),
    rgb(0x7F848E),
];

const HIGH_CONTRAST_TILES: [Color; MAX_TILE_COLORS] = [
    rgb(0x00FF00),
    rgb(0xFFFF00),
    rgb(0xFF0000),
    rgb(0x0088FF),
    rgb(0xFF00FF),
    rgb(0x00FFFF),
    rgb(0xFF8800),
    rgb(0xFFFFFF),
    rgb(0x8800FF),
    rgb(0x888888),
];

/// Paul Tol's bright and muted sets; no pair relies on red against green.
const COLORBLIND_TILES: [Color; MAX_TILE_COLORS] = [
    rgb(0x0077BB),
    rgb(0xEE7733),
    rgb(0x009988),
    rgb(0xCC3311),
    rgb(0xEE3377),
    rgb(0xBBBB00),
    rgb(0x33BBEE),
    rgb(0xAA4499),
    rgb(0xDDCC77),
    rgb(0xBBBBBB),
];

/// btop keys consulted for each tile, with the One Dark fallback above.
const TILE_KEYS: [&[&str]; MAX_TILE_COLORS] = [
    &["mem_box", "cpu_start"],
    &["title", "cpu_mid"],
    &["cpu_end", "temp_end"],
    &["cpu_box"],
    &["net_box"],
    &["hi_fg", "proc_misc"],
    &["download_mid"],
    &["temp_mid"],
    &["upload_end"],
    &["used_end"],
];

/// Tile palette and UI colours.
#[derive(Debug, Clone)]
pub struct Theme {
    pub tiles: [Color; MAX_TILE_COLORS],
    /// Rotation centre marker.
    pub cursor: Color,
    /// Board background.
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    /// Text (score, time).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Key help and empty high-score slots.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            cursor: rgb(0xFFFFFF),
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// No path gives One Dark. `palette` then swaps in an accessible tile set.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) => Self::from_map(&parse_theme_file(&std::fs::read_to_string(p)?)),
            None => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Default theme for a palette when no file is loaded.
    pub fn default_for_palette(palette: Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => self.tiles = HIGH_CONTRAST_TILES,
            Palette::Colorblind => self.tiles = COLORBLIND_TILES,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let first = |keys: &[&str]| keys.iter().find_map(|&k| get(k));
        let base = Self::onedark_default();
        let mut tiles = base.tiles;
        for (tile, keys) in tiles.iter_mut().zip(TILE_KEYS) {
            if let Some(c) = first(keys) {
                *tile = c;
            }
        }
        Self {
            tiles,
            cursor: get("selected_fg").unwrap_or(base.cursor),
            bg: get("meter_bg").unwrap_or(base.bg),
            div_line: get("div_line").unwrap_or(base.div_line),
            main_fg: get("main_fg").unwrap_or(base.main_fg),
            title: get("title").unwrap_or(base.title),
            inactive_fg: get("inactive_fg").unwrap_or(base.inactive_fg),
        }
    }

    #[inline]
    pub fn tile_color(&self, index: u8) -> Color {
        self.tiles[index as usize % MAX_TILE_COLORS]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some((key, rest)) = stripped.split_once(']') else {
            continue;
        };
        let Some((_, value)) = rest.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(digits.to_string());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let n = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    match digits.len() {
        6 => Ok(rgb(n)),
        3 => {
            let nibble = |shift: u32| ((n >> shift) & 0xF) as u8 * 17;
            Ok(Color::Rgb(nibble(8), nibble(4), nibble(0)))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
        assert!(matches!(parse_hex("#1a0").unwrap(), Color::Rgb(0x11, 0xAA, 0x00)));
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GG0000").is_err());
        assert!(parse_hex("+12345").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_theme_file_overrides_tiles_with_fallback_keys() {
        let map = parse_theme_file(
            "# comment\ntheme[cpu_start]='#010203'\ntheme[net_box]=\"#0A0B0C\"\ntheme[bogus]\n",
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.tiles[0], Color::Rgb(1, 2, 3));
        assert_eq!(theme.tiles[4], Color::Rgb(10, 11, 12));
        assert_eq!(theme.tiles[3], ONEDARK_TILES[3]);
        assert_eq!(theme.bg, Theme::onedark_default().bg);
    }

    #[test]
    fn test_palettes_have_distinct_tiles() {
        for palette in [Palette::Normal, Palette::HighContrast, Palette::Colorblind] {
            let t = Theme::default_for_palette(palette);
            for (i, a) in t.tiles.iter().enumerate() {
                assert!(t.tiles[i + 1..].iter().all(|b| b != a), "{palette:?} tile {i}");
            }
        }
    }

    #[test]
    fn test_tile_color_wraps() {
        let t = Theme::default();
        assert_eq!(t.tile_color(12), t.tiles[2]);
    }
}
