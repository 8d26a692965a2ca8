//! Layout and drawing: board, cursor, animations, sidebar and the game-over popup.

use crate::BoardStyle;
use crate::hex::{Coord, Hex, HexId, Placed};
use crate::scene::{Motion, Playing, Scene};
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::{HashMap, HashSet};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};
use tokio::time::Instant;

const SIDEBAR_WIDTH: u16 = 24;
/// Score, time, high scores and key help stacked in the sidebar.
const SIDEBAR_HEIGHT: u16 = 4 + 3 + 12 + 7;

/// Terminal cells taken by one hex.
fn cell_size(style: BoardStyle) -> (u16, u16) {
    match style {
        BoardStyle::Hex => (4, 2),
        BoardStyle::Compact => (2, 1),
    }
}

/// Board interior size in terminal cells: the even-row offset adds half a hex.
fn board_size(style: BoardStyle, width: usize, height: usize) -> (u16, u16) {
    let (cw, ch) = cell_size(style);
    (width as u16 * cw + cw / 2, height as u16 * ch)
}

/// Top-left of a hex relative to the board interior. Even rows sit half a hex right.
fn origin(style: BoardStyle, at: Coord) -> (f64, f64) {
    let (cw, ch) = cell_size(style);
    let offset = if at.y.rem_euclid(2) == 0 { cw / 2 } else { 0 };
    (
        f64::from(at.x) * f64::from(cw) + f64::from(offset),
        f64::from(at.y) * f64::from(ch),
    )
}

fn lerp(from: (f64, f64), to: (f64, f64), t: f64) -> (f64, f64) {
    (from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t)
}

/// What the UI needs from the game for one frame.
pub struct View<'a> {
    pub scene: &'a Scene,
    pub theme: &'a Theme,
    pub style: BoardStyle,
    pub width: usize,
    pub height: usize,
    pub remaining_ms: i64,
    pub game_over: bool,
    pub high_scores: &'a [u64],
}

/// TachyonFX state carried between frames.
#[derive(Default)]
pub struct Effects {
    /// Fade for the vanish animation with the given serial.
    vanish: Option<(u64, Effect)>,
    last_frame: Option<Instant>,
}

impl Effects {
    pub fn reset(&mut self) {
        self.vanish = None;
        self.last_frame = None;
    }
}

/// Board and sidebar areas for a terminal of the given size, centred.
fn layout(area: Rect, view: &View<'_>) -> (Rect, Rect, Rect) {
    let (bw, bh) = board_size(view.style, view.width, view.height);
    let (pw, ph) = (bw + 2, bh + 2);
    let total_w = pw + SIDEBAR_WIDTH;
    let total_h = ph.max(SIDEBAR_HEIGHT);

    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let active = vert[1];
    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(active);
    let board = Rect {
        height: ph.min(inner[0].height),
        ..inner[0]
    };
    (board, inner[1], active)
}

pub fn draw(frame: &mut Frame, view: &View<'_>, effects: &mut Effects, now: Instant) {
    let (board_area, sidebar_area, active) = layout(frame.area(), view);
    let board = draw_board(frame, view, board_area, now);
    apply_vanish_effect(frame, view, board, effects, now);
    draw_callout(frame, view, board, now);
    draw_sidebar(frame, view, sidebar_area);
    if view.game_over {
        draw_game_over(frame, view, active);
    }
}

/// Draws the board and returns its interior.
fn draw_board(frame: &mut Frame, view: &View<'_>, area: Rect, now: Instant) -> Rect {
    let theme = view.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(" hexspin ", Style::default().fg(theme.title)));
    let board = block.inner(area);
    block.render(area, frame.buffer_mut());

    let hexes = view.scene.hexes();
    let moving = view
        .scene
        .playing()
        .map(|p| moving_hexes(view.style, hexes, p, now))
        .unwrap_or_default();
    let buf = frame.buffer_mut();
    for placed in hexes {
        if moving.contains_key(&placed.hex.id) {
            continue;
        }
        let cursor = view.scene.cursor() == Some(placed.at);
        draw_hex(buf, board, view, origin(view.style, placed.at), placed.hex, cursor);
    }
    for placed in hexes {
        if let Some(&pos) = moving.get(&placed.hex.id) {
            draw_hex(buf, board, view, pos, placed.hex, false);
        }
    }
    board
}

/// Positions of hexes that are mid-animation, by id.
fn moving_hexes(
    style: BoardStyle,
    hexes: &[Placed],
    playing: &Playing,
    now: Instant,
) -> HashMap<HexId, (f64, f64)> {
    let t = playing.progress(now);
    match &playing.motion {
        Motion::Rotate {
            clockwise,
            center,
            ring,
        } => {
            let cells = center.ring();
            let step = if *clockwise { 1 } else { cells.len() - 1 };
            ring.iter()
                .enumerate()
                .filter_map(|(i, hex)| {
                    let hex = hex.as_ref()?;
                    let from = origin(style, cells[i]);
                    let to = origin(style, cells[(i + step) % cells.len()]);
                    Some((hex.id, lerp(from, to, t)))
                })
                .collect()
        }
        Motion::Shift(entries) => {
            let (cw, _) = cell_size(style);
            let by_cell: HashMap<Coord, HexId> = hexes.iter().map(|p| (p.at, p.hex.id)).collect();
            entries
                .iter()
                .filter_map(|e| {
                    let id = by_cell.get(&e.at)?;
                    let (x, y) = origin(style, e.at);
                    let dx = f64::from(e.distance) * f64::from(cw) * t;
                    Some((*id, (x - dx, y)))
                })
                .collect()
        }
        Motion::Vanish(_) | Motion::Text(_) => HashMap::new(),
    }
}

fn put(buf: &mut Buffer, area: Rect, x: i32, y: i32, symbol: &str, style: Style) {
    let inside = x >= i32::from(area.x)
        && y >= i32::from(area.y)
        && x < i32::from(area.right())
        && y < i32::from(area.bottom());
    if inside {
        buf[(x as u16, y as u16)].set_symbol(symbol).set_style(style);
    }
}

fn draw_hex(
    buf: &mut Buffer,
    board: Rect,
    view: &View<'_>,
    pos: (f64, f64),
    hex: Hex,
    cursor: bool,
) {
    let color = view.theme.tile_color(hex.color);
    let tile = Style::default().fg(color).bg(view.theme.bg);
    let mark = Style::default()
        .fg(view.theme.cursor)
        .bg(color)
        .add_modifier(Modifier::BOLD);
    let x = i32::from(board.x) + pos.0.round() as i32;
    let y = i32::from(board.y) + pos.1.round() as i32;
    match view.style {
        BoardStyle::Hex => {
            let top = if cursor {
                ["▟", "◆", "◆", "▙"]
            } else {
                ["▟", "█", "█", "▙"]
            };
            for (dx, symbol) in top.into_iter().enumerate() {
                let style = if symbol == "◆" { mark } else { tile };
                put(buf, board, x + dx as i32, y, symbol, style);
            }
            for (dx, symbol) in ["▜", "█", "█", "▛"].into_iter().enumerate() {
                put(buf, board, x + dx as i32, y + 1, symbol, tile);
            }
        }
        BoardStyle::Compact => {
            if cursor {
                put(buf, board, x, y, "◆", Style::default().fg(view.theme.cursor).bg(color));
            } else {
                put(buf, board, x, y, "⬢", tile);
            }
        }
    }
}

/// Buffer positions covered by the given cells.
fn cell_positions(style: BoardStyle, board: Rect, cells: &[Placed]) -> HashSet<(u16, u16)> {
    let (cw, ch) = cell_size(style);
    let mut set = HashSet::new();
    for placed in cells {
        let (ox, oy) = origin(style, placed.at);
        let x0 = board.x + ox as u16;
        let y0 = board.y + oy as u16;
        for bx in x0..(x0 + cw).min(board.right()) {
            for by in y0..(y0 + ch).min(board.bottom()) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Fade vanishing hexes to the background with a TachyonFX effect, created once per vanish.
fn apply_vanish_effect(
    frame: &mut Frame,
    view: &View<'_>,
    board: Rect,
    effects: &mut Effects,
    now: Instant,
) {
    let delta = effects
        .last_frame
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or_default();
    effects.last_frame = Some(now);

    let Some(Playing {
        serial,
        motion: Motion::Vanish(cells),
        duration,
        ..
    }) = view.scene.playing()
    else {
        effects.vanish = None;
        return;
    };

    let stale = effects.vanish.as_ref().is_none_or(|(s, _)| s != serial);
    if stale {
        let positions = cell_positions(view.style, board, cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            positions.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let ms = duration.as_millis().min(u128::from(u32::MAX)) as u32;
        let effect = fx::fade_to(bg, bg, (ms, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        effects.vanish = Some((*serial, effect));
    }
    if let Some((_, effect)) = &mut effects.vanish {
        let ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
        frame.render_effect(effect, board, TfxDuration::from_millis(ms));
    }
}

/// Chain points float up from the middle of the board.
fn draw_callout(frame: &mut Frame, view: &View<'_>, board: Rect, now: Instant) {
    let Some(playing) = view.scene.playing() else {
        return;
    };
    let Motion::Text(points) = playing.motion else {
        return;
    };
    let label = format!(" Chain! +{points} ");
    let rise = (playing.progress(now) * 2.0).round() as u16;
    let y = (board.y + board.height / 2).saturating_sub(rise).max(board.y);
    // Centred on the board but allowed to spill past a narrow one.
    let width = label.chars().count() as u16;
    let x = (board.x + board.width / 2).saturating_sub(width / 2);
    let line = Rect {
        x,
        y,
        width,
        height: 1,
    }
    .intersection(frame.area());
    let style = Style::default()
        .fg(Color::Black)
        .bg(view.theme.title)
        .add_modifier(Modifier::BOLD);
    Paragraph::new(Line::from(Span::styled(label, style))).render(line, frame.buffer_mut());
}

fn time_color(percentage: u8) -> Color {
    if percentage > 60 {
        Color::Green
    } else if percentage > 30 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.inactive_fg);
    let block = || {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // score, best
            Constraint::Length(3),  // time gauge
            Constraint::Length(12), // high scores
            Constraint::Length(7),  // keys
        ])
        .split(area);

    let best = view.high_scores.first().copied().unwrap_or(0);
    let stats = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(view.scene.score().to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best: ", title_style),
            Span::styled(best.to_string(), fg_style),
        ]),
    ];
    Paragraph::new(Text::from(stats))
        .block(block())
        .render(chunks[0], frame.buffer_mut());

    let pct = view.scene.percentage();
    let secs = view.remaining_ms.max(0) as f64 / 1000.0;
    Gauge::default()
        .block(block().title(Span::styled(" Time ", title_style)))
        .percent(u16::from(pct.min(100)))
        .label(format!("{secs:.1}s"))
        .gauge_style(Style::default().fg(time_color(pct)).bg(theme.bg))
        .render(chunks[1], frame.buffer_mut());

    let mut lines: Vec<Line> = (0..crate::highscores::MAX_ENTRIES)
        .map(|i| match view.high_scores.get(i) {
            Some(score) => Line::from(Span::styled(format!("{:>2}. {score}", i + 1), fg_style)),
            None => Line::from(Span::styled(format!("{:>2}. ---", i + 1), dim_style)),
        })
        .collect();
    lines.truncate(chunks[2].height.saturating_sub(2) as usize);
    Paragraph::new(Text::from(lines))
        .block(block().title(Span::styled(" High scores ", title_style)))
        .render(chunks[2], frame.buffer_mut());

    let keys = vec![
        Line::from(Span::styled("←↑→↓ hjkl  move", dim_style)),
        Line::from(Span::styled("a u  rotate left", dim_style)),
        Line::from(Span::styled("d i  rotate right", dim_style)),
        Line::from(Span::styled("r  restart", dim_style)),
        Line::from(Span::styled("c  clear scores", dim_style)),
        Line::from(Span::styled("q  quit", dim_style)),
    ];
    Paragraph::new(Text::from(keys))
        .block(block())
        .render(chunks[3], frame.buffer_mut());
}

fn draw_game_over(frame: &mut Frame, view: &View<'_>, area: Rect) {
    let theme = view.theme;
    let popup_w = 28u16;
    let popup_h = 8u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let score = view.scene.score();
    let best = view.high_scores.first().copied().unwrap_or(0);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Time's up! ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {score} "),
            Style::default().fg(theme.main_fg),
        )),
    ];
    if score > 0 && score >= best {
        lines.push(Line::from(Span::styled(
            " New record! ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!(" Best: {best} "),
            Style::default().fg(theme.main_fg),
        )));
    }
    lines.push(Line::from(Span::styled(
        " R restart    Q quit ",
        Style::default().fg(theme.main_fg),
    )));
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .style(Style::default().bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::{HexFactory, ShiftEntry};
    use crate::ports::{AnimationTimings, Animator, HexRenderer};
    use crate::scene::{SceneAnimator, SceneRenderer};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    #[test]
    fn test_even_rows_offset_right() {
        assert_eq!(origin(BoardStyle::Hex, Coord::new(0, 0)), (2.0, 0.0));
        assert_eq!(origin(BoardStyle::Hex, Coord::new(0, 1)), (0.0, 2.0));
        assert_eq!(origin(BoardStyle::Compact, Coord::new(3, 2)), (7.0, 2.0));
    }

    #[test]
    fn test_neighbours_touch_on_screen() {
        // Diagonal neighbours sit half a hex left or right of the centre, one row away.
        let c = Coord::new(3, 3);
        let (cx, _) = origin(BoardStyle::Hex, c);
        for n in c.ring() {
            let (nx, _) = origin(BoardStyle::Hex, n);
            assert!((nx - cx).abs() <= 4.0, "{n:?}");
        }
    }

    #[test]
    fn test_board_size() {
        assert_eq!(board_size(BoardStyle::Hex, 7, 7), (30, 14));
        assert_eq!(board_size(BoardStyle::Compact, 7, 7), (15, 7));
    }

    #[test]
    fn test_shift_moves_hex_left_by_progress() {
        let mut f = HexFactory::new(6, Some(3));
        let hex = f.with_color(1);
        let at = Coord::new(5, 1);
        let playing = Playing {
            serial: 1,
            motion: Motion::Shift(vec![ShiftEntry { at, distance: 2 }]),
            started: Instant::now(),
            duration: Duration::from_millis(400),
        };
        let hexes = [Placed { at, hex }];
        let moved = moving_hexes(
            BoardStyle::Compact,
            &hexes,
            &playing,
            playing.started + Duration::from_millis(200),
        );
        // Halfway through a two-cell slide: one cell, two columns.
        assert_eq!(moved.get(&hex.id), Some(&(8.0, 1.0)));
    }

    #[test]
    fn test_rotate_ends_on_next_ring_cell() {
        let mut f = HexFactory::new(6, Some(3));
        let center = Coord::new(3, 4);
        let mut ring = [None; 6];
        let hex = f.with_color(2);
        ring[1] = Some(hex);
        let playing = Playing {
            serial: 1,
            motion: Motion::Rotate {
                clockwise: true,
                center,
                ring,
            },
            started: Instant::now(),
            duration: Duration::from_millis(400),
        };
        let moved = moving_hexes(
            BoardStyle::Hex,
            &[],
            &playing,
            playing.started + Duration::from_secs(1),
        );
        let end = origin(BoardStyle::Hex, center.ring()[2]);
        assert_eq!(moved.get(&hex.id), Some(&end));
    }

    fn render(scene: &Scene, game_over: bool) -> Buffer {
        let theme = Theme::default();
        let view = View {
            scene,
            theme: &theme,
            style: BoardStyle::Compact,
            width: 3,
            height: 3,
            remaining_ms: 12_300,
            game_over,
            high_scores: &[28, 2],
        };
        let mut terminal = Terminal::new(TestBackend::new(60, 40)).unwrap();
        let mut effects = Effects::default();
        terminal
            .draw(|f| draw(f, &view, &mut effects, Instant::now()))
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn contains(buf: &Buffer, needle: &str) -> bool {
        let area = buf.area;
        (area.y..area.bottom()).any(|y| {
            let row: String = (area.x..area.right())
                .map(|x| buf[(x, y)].symbol().to_string())
                .collect();
            row.contains(needle)
        })
    }

    #[test]
    fn test_draw_board_and_sidebar() {
        let scene = Scene::shared();
        let mut r = SceneRenderer::new(&scene);
        let mut f = HexFactory::new(6, Some(3));
        for y in 0..3 {
            for x in 0..3 {
                r.place_hex(Coord::new(x, y), f.spawn());
            }
        }
        r.place_cursor(Coord::new(1, 1));
        r.show_score(28);
        let buf = render(&scene.borrow(), false);
        assert!(contains(&buf, "⬢"));
        assert!(contains(&buf, "◆"));
        assert!(contains(&buf, "Score: 28"));
        assert!(contains(&buf, "12.3s"));
        assert!(contains(&buf, " 3. ---"));
        assert!(!contains(&buf, "Time's up!"));
    }

    #[test]
    fn test_draw_game_over_popup() {
        let scene = Scene::shared();
        let buf = render(&scene.borrow(), true);
        assert!(contains(&buf, "Time's up!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_draw_chain_callout() {
        let scene = Scene::shared();
        let animator = SceneAnimator::new(&scene, AnimationTimings::default());
        let probe = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let buf = render(&scene.borrow(), false);
            assert!(contains(&buf, "Chain! +28"));
        };
        let (done, ()) = tokio::join!(
            animator.show_text(28, crate::ports::TextKind::Chain),
            probe
        );
        done.unwrap();
    }
}
