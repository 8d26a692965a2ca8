//! Grid engine: the hex matrix, cursor, score and chain, and the
//! rotate → match → vanish → shift cascade that runs after every rotation.
//!
//! The engine is shared (`Rc<Grid<_>>`) between the input loop, the clock task
//! and one task per rotation. All state sits behind `Cell`/`RefCell` and no borrow
//! is held across an `.await`, so tasks only interleave at animation awaits.
//! While any pipeline is in flight the lock counter is non-zero and every player
//! action returns immediately.

use crate::hex::{Coord, Hex, HexFactory, Neighbour, Placed, ShiftEntry, unique};
use crate::ports::{
    AnimationError, AnimationKind, AnimationTimings, Animator, HexRenderer, HighScoreStore,
    TextKind,
};
use crate::timer::{TickOutcome, Timer};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Chain payouts at or above this earn the callout and the time bonus.
const CHAIN_BONUS_THRESHOLD: u64 = 6;
const CHAIN_BONUS_TIME: Duration = Duration::from_millis(5_000);

/// Where the cursor sits after `init`.
const DEFAULT_CURSOR: Coord = Coord::new(1, 1);

#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Animation(#[from] AnimationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Number of distinct tile colours.
    pub colors: u8,
    /// Seed for tile colours; `None` for a random game.
    pub seed: Option<u64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 7,
            height: 7,
            colors: 6,
            seed: None,
        }
    }
}

impl GridConfig {
    /// Inclusive cursor bounds: one cell in from every edge, so all six neighbours exist.
    pub fn cursor_bounds(&self) -> (Coord, Coord) {
        let max_x = (self.width as i32 - 2).max(1);
        let max_y = (self.height as i32 - 2).max(1);
        (Coord::new(1, 1), Coord::new(max_x, max_y))
    }
}

/// Points for a finished chain: every step's combo² plus one, times the chain length squared.
pub fn chain_points(chain: &[u64]) -> u64 {
    let len = chain.len() as u64;
    chain.iter().map(|v| v + 1).sum::<u64>() * len * len
}

/// Result of one pass over the board.
#[derive(Debug, Default, PartialEq, Eq)]
struct Scan {
    /// Runs of three found; overlapping runs count separately.
    combo: u64,
    /// Cells to remove, first-seen order, no repeats.
    cells: Vec<Coord>,
}

/// Board contents. Each row is a queue refilled from the right: removal appends
/// the replacement hex, so a row can hold more than `width` entries (with gaps)
/// until it is compacted.
#[derive(Debug)]
struct Board {
    width: usize,
    height: usize,
    rows: Vec<Vec<Option<Hex>>>,
    cursor: Coord,
    score: u64,
    chain: Vec<u64>,
    factory: HexFactory,
}

impl Board {
    fn in_bounds(&self, at: Coord) -> bool {
        at.x >= 0 && at.y >= 0 && (at.x as usize) < self.width && (at.y as usize) < self.height
    }

    fn hex_at(&self, at: Coord) -> Option<Hex> {
        if !self.in_bounds(at) {
            return None;
        }
        self.rows.get(at.y as usize)?.get(at.x as usize).copied().flatten()
    }

    fn set(&mut self, at: Coord, hex: Option<Hex>) {
        if !self.in_bounds(at) {
            return;
        }
        if let Some(cell) = self
            .rows
            .get_mut(at.y as usize)
            .and_then(|row| row.get_mut(at.x as usize))
        {
            *cell = hex;
        }
    }

    fn fill(&mut self) {
        let (width, height) = (self.width, self.height);
        let factory = &mut self.factory;
        self.rows = (0..height)
            .map(|_| (0..width).map(|_| Some(factory.spawn())).collect())
            .collect();
    }

    fn coords(&self) -> impl Iterator<Item = Coord> + use<> {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..h).rev().flat_map(move |y| (0..w).rev().map(move |x| Coord::new(x, y)))
    }

    fn rotate_ring(&mut self, center: Coord, clockwise: bool) {
        let cells = center.ring();
        let mut hexes = cells.map(|at| self.hex_at(at));
        if clockwise {
            hexes.rotate_right(1);
        } else {
            hexes.rotate_left(1);
        }
        for (at, hex) in cells.into_iter().zip(hexes) {
            self.set(at, hex);
        }
    }

    /// Every run of three through every cell, all collected before anything is removed.
    fn scan(&self) -> Scan {
        let mut combo = 0;
        let mut marked = Vec::new();
        for at in self.coords() {
            let Some(current) = self.hex_at(at) else {
                continue;
            };
            let same = |c: Coord| self.hex_at(c).is_some_and(|h| h.color == current.color);
            for (a, b) in Neighbour::LINES {
                let (pa, pb) = (at.neighbour(a), at.neighbour(b));
                if same(pa) && same(pb) {
                    combo += 1;
                    marked.extend([at, pa, pb]);
                }
            }
        }
        Scan {
            combo,
            cells: unique(marked),
        }
    }

    fn placed(&self, cells: &[Coord]) -> Vec<Placed> {
        cells
            .iter()
            .filter_map(|&at| self.hex_at(at).map(|hex| Placed { at, hex }))
            .collect()
    }

    /// Empty the cells and queue a fresh hex at the end of each affected row.
    fn remove(&mut self, cells: &[Coord]) {
        for &at in cells.iter().rev() {
            self.set(at, None);
            let hex = self.factory.spawn();
            if let Some(row) = self.rows.get_mut(at.y as usize) {
                row.push(Some(hex));
            }
        }
    }

    /// How far each hex behind a gap has to slide left.
    fn shift_plan(&self) -> Vec<ShiftEntry> {
        let mut plan = Vec::new();
        for (y, row) in self.rows.iter().enumerate() {
            let mut empties = 0;
            for (x, cell) in row.iter().enumerate() {
                if cell.is_none() {
                    empties += 1;
                } else if empties > 0 {
                    plan.push(ShiftEntry {
                        at: Coord::new(x as i32, y as i32),
                        distance: empties,
                    });
                }
            }
        }
        unique(plan)
    }

    fn compact(&mut self) {
        for row in &mut self.rows {
            row.retain(Option::is_some);
        }
    }
}

/// One count on the lock counter, released on drop.
#[must_use = "the count is released as soon as the guard is dropped"]
struct LockGuard<'a> {
    locks: &'a Cell<u32>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let held = self.locks.get();
        assert!(held > 0, "lock counter released more often than acquired");
        self.locks.set(held - 1);
    }
}

/// Animation request with the snapshot it needs.
enum Animation<'a> {
    Rotate {
        clockwise: bool,
        center: Coord,
        ring: [Option<Hex>; 6],
    },
    Vanish(&'a [Placed]),
    Shift(&'a [ShiftEntry]),
    Text(u64, TextKind),
}

impl Animation<'_> {
    fn kind(&self) -> AnimationKind {
        match self {
            Self::Rotate { .. } => AnimationKind::Rotate,
            Self::Vanish(_) => AnimationKind::Vanish,
            Self::Shift(_) => AnimationKind::Shift,
            Self::Text(..) => AnimationKind::Text,
        }
    }
}

pub struct Grid<A> {
    timings: AnimationTimings,
    board: RefCell<Board>,
    locks: Cell<u32>,
    /// Set when the clock runs out; keeps the board locked until the next `init`.
    finished: Cell<bool>,
    timer: RefCell<Timer>,
    animator: A,
    renderer: RefCell<Box<dyn HexRenderer>>,
    scores: RefCell<Box<dyn HighScoreStore>>,
    bounds: (Coord, Coord),
}

impl<A: Animator> Grid<A> {
    /// Build the engine and deal the first board.
    pub fn new(
        config: GridConfig,
        timings: AnimationTimings,
        timer: Timer,
        animator: A,
        renderer: Box<dyn HexRenderer>,
        scores: Box<dyn HighScoreStore>,
    ) -> Self {
        let board = Board {
            width: config.width,
            height: config.height,
            rows: Vec::new(),
            cursor: DEFAULT_CURSOR,
            score: 0,
            chain: Vec::new(),
            factory: HexFactory::new(config.colors, config.seed),
        };
        let grid = Self {
            timings,
            board: RefCell::new(board),
            locks: Cell::new(0),
            finished: Cell::new(false),
            timer: RefCell::new(timer),
            animator,
            renderer: RefCell::new(renderer),
            scores: RefCell::new(scores),
            bounds: config.cursor_bounds(),
        };
        grid.init();
        grid
    }

    /// Deal a fresh board of new hexes and reset score, chain, cursor and clock.
    ///
    /// Returns false and leaves the game untouched while a pipeline still owns the board
    /// (see [`is_busy`](Self::is_busy)).
    pub fn init(&self) -> bool {
        if self.is_busy() {
            debug!(locks = self.locks.get(), "restart ignored while hexes are moving");
            return false;
        }
        {
            let mut board = self.board.borrow_mut();
            board.fill();
            board.cursor = DEFAULT_CURSOR;
            board.score = 0;
            board.chain.clear();
        }
        self.finished.set(false);
        self.timer.borrow_mut().reset();
        self.renderer.borrow_mut().show_score(0);
        info!("new board dealt");
        self.render();
        true
    }

    /// Player input is ignored while this is true.
    pub fn is_locked(&self) -> bool {
        self.locks.get() > 0 || self.finished.get()
    }

    /// A rotation pipeline is still in flight.
    pub fn is_busy(&self) -> bool {
        self.locks.get() > 0
    }

    /// Board width and height in cells.
    pub fn size(&self) -> (usize, usize) {
        let board = self.board.borrow();
        (board.width, board.height)
    }

    pub fn locks(&self) -> u32 {
        self.locks.get()
    }

    pub fn is_game_over(&self) -> bool {
        self.finished.get()
    }

    pub fn cursor(&self) -> Coord {
        self.board.borrow().cursor
    }

    pub fn score(&self) -> u64 {
        self.board.borrow().score
    }

    pub fn chain(&self) -> Vec<u64> {
        self.board.borrow().chain.clone()
    }

    /// The hex in a cell, or `None` off the board.
    pub fn hex_at(&self, at: Coord) -> Option<Hex> {
        self.board.borrow().hex_at(at)
    }

    pub fn remaining_ms(&self) -> i64 {
        self.timer.borrow().remaining_ms()
    }

    pub fn move_left(&self) {
        self.move_cursor(-1, 0);
    }

    pub fn move_up(&self) {
        self.move_cursor(0, -1);
    }

    pub fn move_right(&self) {
        self.move_cursor(1, 0);
    }

    pub fn move_down(&self) {
        self.move_cursor(0, 1);
    }

    fn move_cursor(&self, dx: i32, dy: i32) {
        if self.is_locked() {
            return;
        }
        let (lo, hi) = self.bounds;
        {
            let mut board = self.board.borrow_mut();
            let c = board.cursor;
            board.cursor = Coord::new((c.x + dx).clamp(lo.x, hi.x), (c.y + dy).clamp(lo.y, hi.y));
        }
        self.render();
    }

    pub async fn rotate_clockwise(&self) -> Result<(), GridError> {
        self.rotate(true).await
    }

    pub async fn rotate_counter_clockwise(&self) -> Result<(), GridError> {
        self.rotate(false).await
    }

    async fn rotate(&self, clockwise: bool) -> Result<(), GridError> {
        if self.is_locked() {
            return Ok(());
        }
        self.start_clock();

        let (center, ring) = {
            let board = self.board.borrow();
            let center = board.cursor;
            (center, center.ring().map(|at| board.hex_at(at)))
        };
        let turn = self
            .animate(Animation::Rotate {
                clockwise,
                center,
                ring,
            })
            .await?;
        self.board.borrow_mut().rotate_ring(center, clockwise);
        self.render();
        drop(turn);

        self.settle().await
    }

    fn start_clock(&self) {
        if self.timer.borrow_mut().start_if_not_running(Instant::now()) {
            info!("clock started");
            self.scores.borrow_mut().game_started();
        }
    }

    fn lock(&self) -> LockGuard<'_> {
        self.locks.set(self.locks.get() + 1);
        LockGuard { locks: &self.locks }
    }

    /// Lock, hold the clock for the animation's length, and wait for it.
    /// The returned guard keeps the board locked until the caller has applied the
    /// animation's effect.
    async fn animate(&self, animation: Animation<'_>) -> Result<LockGuard<'_>, GridError> {
        let guard = self.lock();
        let duration = self.timings.of(animation.kind());
        self.timer.borrow_mut().hold(duration, Instant::now());
        match animation {
            Animation::Rotate {
                clockwise,
                center,
                ring,
            } => self.animator.rotate(clockwise, center, ring).await?,
            Animation::Vanish(hexes) => self.animator.vanish(hexes).await?,
            Animation::Shift(hexes) => self.animator.shift_left(hexes).await?,
            Animation::Text(value, kind) => self.animator.show_text(value, kind).await?,
        }
        Ok(guard)
    }

    /// Clear runs of three until the board is stable, then pay out the chain.
    async fn settle(&self) -> Result<(), GridError> {
        let cascade = self.lock();
        loop {
            let scan = self.board.borrow().scan();
            if scan.combo > 0 {
                let mut board = self.board.borrow_mut();
                board.chain.push(scan.combo * scan.combo);
                debug!(combo = scan.combo, chain = ?board.chain, "runs found");
            }
            if scan.cells.is_empty() {
                break;
            }

            let doomed = self.board.borrow().placed(&scan.cells);
            let vanish = self.animate(Animation::Vanish(&doomed)).await?;
            self.board.borrow_mut().remove(&scan.cells);
            self.render();
            drop(vanish);

            self.shift_all().await?;
        }
        self.pay_out_chain().await?;
        drop(cascade);
        self.render();
        Ok(())
    }

    /// Slide hexes left over the gaps removal left behind.
    async fn shift_all(&self) -> Result<(), GridError> {
        let plan = self.board.borrow().shift_plan();
        let slide = if plan.is_empty() {
            None
        } else {
            Some(self.animate(Animation::Shift(&plan)).await?)
        };
        self.board.borrow_mut().compact();
        drop(slide);
        self.render();
        Ok(())
    }

    async fn pay_out_chain(&self) -> Result<(), GridError> {
        let chain = self.board.borrow().chain.clone();
        let points = chain_points(&chain);
        if points >= CHAIN_BONUS_THRESHOLD {
            let _callout = self
                .animate(Animation::Text(points, TextKind::Chain))
                .await?;
            self.timer.borrow_mut().add_time(CHAIN_BONUS_TIME);
        }
        let score = {
            let mut board = self.board.borrow_mut();
            board.score += points;
            board.chain.clear();
            board.score
        };
        if points > 0 {
            debug!(?chain, points, score, "chain paid out");
        }
        self.renderer.borrow_mut().show_score(score);
        Ok(())
    }

    fn render(&self) {
        let board = self.board.borrow();
        let mut renderer = self.renderer.borrow_mut();
        renderer.clear();
        for at in board.coords() {
            if let Some(hex) = board.hex_at(at) {
                renderer.place_hex(at, hex);
            }
        }
        if !self.is_locked() {
            renderer.place_cursor(board.cursor);
        }
    }

    /// Advance the clock; when it runs out the game ends.
    pub fn tick_clock(&self, now: Instant) -> TickOutcome {
        let outcome = self.timer.borrow_mut().tick(now);
        if outcome == TickOutcome::Expired {
            self.game_over();
        }
        outcome
    }

    fn game_over(&self) {
        if self.finished.replace(true) {
            return;
        }
        let score = self.score();
        info!(score, "time is up");
        self.scores.borrow_mut().enter(score);
        self.render();
    }

    /// Tick the clock on its configured interval. Never returns; drop the task to stop it.
    pub async fn run_clock(&self) {
        let period = self.timer.borrow().increment();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick_clock(Instant::now());
        }
    }
}
