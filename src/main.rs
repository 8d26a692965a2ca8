//! hexspin: rotate clusters of hexes to line up three of a colour before the clock runs out.

mod app;
mod grid;
mod hex;
mod highscores;
mod input;
mod ports;
mod scene;
mod theme;
mod timer;
mod ui;

use anyhow::{Context, Result, anyhow};
use app::App;
use clap::{Parser, ValueEnum};
use grid::GridConfig;
use ports::AnimationTimings;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use timer::TimerConfig;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const MIN_SIDE: usize = 3;
const MAX_SIDE: usize = 64;
const COLOR_RANGE: std::ops::RangeInclusive<u8> = 2..=10;

/// Everything a game needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub animation: AnimationTimings,
    pub timer: TimerConfig,
    pub board_style: BoardStyle,
    pub highscores_enabled: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("board must be at least {MIN_SIDE}x{MIN_SIDE}, got {width}x{height}")]
    BoardTooSmall { width: usize, height: usize },
    #[error("board must be at most {MAX_SIDE}x{MAX_SIDE}, got {width}x{height}")]
    BoardTooLarge { width: usize, height: usize },
    #[error("colour count must be between 2 and 10, got {0}")]
    Colors(u8),
    #[error("timer increment must be greater than zero")]
    ZeroIncrement,
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            grid: GridConfig {
                width: args.width,
                height: args.height,
                colors: args.colors,
                seed: args.seed,
            },
            animation: AnimationTimings {
                rotate: Duration::from_millis(args.rotate_ms),
                vanish: Duration::from_millis(args.vanish_ms),
                shift: Duration::from_millis(args.shift_ms),
                text: Duration::from_millis(args.text_ms),
            },
            timer: TimerConfig {
                max_time: Duration::from_millis(args.max_time_ms),
                increment: Duration::from_millis(args.tick_ms),
            },
            board_style: args.board_style,
            highscores_enabled: !args.no_highscores,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let GridConfig {
            width,
            height,
            colors,
            ..
        } = self.grid;
        if width < MIN_SIDE || height < MIN_SIDE {
            return Err(ConfigError::BoardTooSmall { width, height });
        }
        if width > MAX_SIDE || height > MAX_SIDE {
            return Err(ConfigError::BoardTooLarge { width, height });
        }
        if !COLOR_RANGE.contains(&colors) {
            return Err(ConfigError::Colors(colors));
        }
        if self.timer.increment.is_zero() {
            return Err(ConfigError::ZeroIncrement);
        }
        Ok(())
    }
}

/// Send logs to `path`; the terminal belongs to the game.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("cannot install logger: {e}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let config = GameConfig::from_args(&args);
    config.validate().context("invalid configuration")?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        warn!(error = %e, "theme not loaded, using defaults");
        theme::Theme::default_for_palette(args.palette)
    });
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// Hex rotation puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "hexspin",
    version,
    about = "Hex rotation puzzle in the terminal. Spin six hexes around the cursor; three in a row vanish.",
    long_about = "hexspin is a terminal puzzle played on a board of coloured hexes.\n\n\
        Turn the six hexes around the cursor. Three of a colour in a straight line vanish, \
        the row closes up from the right and new hexes slide in. Matches made by the refill \
        build a chain; long chains score big and add five seconds to the clock.\n\n\
        CONTROLS:\n  Arrows / hjkl  Move cursor\n  a / u          Rotate counter-clockwise\n  d / i          Rotate clockwise\n  r              Restart    c  Clear high scores    q / Esc  Quit\n\n\
        The clock starts on the first turn and is paused while hexes are moving."
)]
pub struct Args {
    /// Board width in hexes.
    #[arg(long, default_value = "7", value_name = "COLS")]
    pub width: usize,

    /// Board height in hexes.
    #[arg(long, default_value = "7", value_name = "ROWS")]
    pub height: usize,

    /// Number of tile colours (2-10). Fewer colours make more matches.
    #[arg(short, long, default_value = "6", value_name = "N")]
    pub colors: u8,

    /// Board rendering: large hex tiles or one cell per hex.
    #[arg(short, long, default_value = "hex")]
    pub board_style: BoardStyle,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Seed for tile colours, for a reproducible game.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Keep high scores in memory only.
    #[arg(long)]
    pub no_highscores: bool,

    /// Write logs to this file (filter with RUST_LOG).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Time on the clock at the start of a game.
    #[arg(long, default_value = "30000", value_name = "MS")]
    pub max_time_ms: u64,

    /// How often the clock ticks.
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub tick_ms: u64,

    /// Length of a rotation.
    #[arg(long, default_value = "400", value_name = "MS")]
    pub rotate_ms: u64,

    /// Length of the vanish fade.
    #[arg(long, default_value = "400", value_name = "MS")]
    pub vanish_ms: u64,

    /// Length of the slide that closes gaps.
    #[arg(long, default_value = "400", value_name = "MS")]
    pub shift_ms: u64,

    /// How long a chain callout stays up.
    #[arg(long, default_value = "600", value_name = "MS")]
    pub text_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BoardStyle {
    #[default]
    Hex,
    Compact,
}
