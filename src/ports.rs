//! Collaborators the grid engine drives: animation, drawing and the high-score store.
//!
//! The engine only ever talks to these traits, so any backend that honours them
//! (terminal scene, test recorder, ...) can sit behind a game.

use crate::hex::{Coord, Hex, Placed, ShiftEntry};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnimationError {
    /// The backend went away while the engine was waiting on it.
    #[error("animation backend closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    Rotate,
    Vanish,
    Shift,
    Text,
}

/// Nominal length of each animation; also how long the clock is held for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationTimings {
    pub rotate: Duration,
    pub vanish: Duration,
    pub shift: Duration,
    pub text: Duration,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            rotate: Duration::from_millis(400),
            vanish: Duration::from_millis(400),
            shift: Duration::from_millis(400),
            text: Duration::from_millis(600),
        }
    }
}

impl AnimationTimings {
    pub fn of(&self, kind: AnimationKind) -> Duration {
        match kind {
            AnimationKind::Rotate => self.rotate,
            AnimationKind::Vanish => self.vanish,
            AnimationKind::Shift => self.shift,
            AnimationKind::Text => self.text,
        }
    }
}

/// What a text callout is announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Chain,
}

/// Visual transitions. Each future resolves once, after the transition's nominal
/// duration. Implementations get snapshots and must not reach back into the engine.
pub trait Animator {
    /// The six hexes around `center` (in [`Neighbour::RING`](crate::hex::Neighbour::RING)
    /// order) swap one slot.
    async fn rotate(
        &self,
        clockwise: bool,
        center: Coord,
        ring: [Option<Hex>; 6],
    ) -> Result<(), AnimationError>;

    async fn vanish(&self, hexes: &[Placed]) -> Result<(), AnimationError>;

    async fn shift_left(&self, hexes: &[ShiftEntry]) -> Result<(), AnimationError>;

    async fn show_text(&self, value: u64, kind: TextKind) -> Result<(), AnimationError>;
}

/// Redraw target. The engine clears and re-places everything after each mutation.
pub trait HexRenderer {
    fn clear(&mut self);
    fn place_hex(&mut self, at: Coord, hex: Hex);
    fn place_cursor(&mut self, at: Coord);
    fn show_score(&mut self, _points: u64) {}
}

/// Receives the final score when the clock runs out.
pub trait HighScoreStore {
    /// The first rotation of a game has started the clock.
    fn game_started(&mut self) {}
    fn enter(&mut self, score: u64);
}

/// A store shared with the UI, which also reads and clears it.
impl<S: HighScoreStore> HighScoreStore for Rc<RefCell<S>> {
    fn game_started(&mut self) {
        self.borrow_mut().game_started();
    }

    fn enter(&mut self, score: u64) {
        self.borrow_mut().enter(score);
    }
}
