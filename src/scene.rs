//! Terminal side of the engine's ports. The engine draws into a shared [`Scene`],
//! animations are recorded there with their start time, and the UI reads it every frame.

use crate::hex::{Coord, Hex, Placed, ShiftEntry};
use crate::ports::{AnimationError, AnimationKind, AnimationTimings, Animator, HexRenderer, TextKind};
use crate::timer::ProgressBar;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;

pub type SharedScene = Rc<RefCell<Scene>>;

/// The transition currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Motion {
    Rotate {
        clockwise: bool,
        center: Coord,
        ring: [Option<Hex>; 6],
    },
    Vanish(Vec<Placed>),
    Shift(Vec<ShiftEntry>),
    Text(u64),
}

#[derive(Debug, Clone)]
pub struct Playing {
    /// Distinguishes back-to-back animations of the same kind.
    pub serial: u64,
    pub motion: Motion,
    pub started: Instant,
    pub duration: Duration,
}

impl Playing {
    /// 0.0 at the start, 1.0 once the nominal duration has passed.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }
}

/// Everything the engine last told the screen.
#[derive(Debug, Default)]
pub struct Scene {
    hexes: Vec<Placed>,
    cursor: Option<Coord>,
    score: u64,
    percentage: u8,
    playing: Option<Playing>,
    serial: u64,
}

impl Scene {
    pub fn shared() -> SharedScene {
        Rc::new(RefCell::new(Self {
            percentage: 100,
            ..Self::default()
        }))
    }

    pub fn hexes(&self) -> &[Placed] {
        &self.hexes
    }

    pub fn cursor(&self) -> Option<Coord> {
        self.cursor
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    pub fn playing(&self) -> Option<&Playing> {
        self.playing.as_ref()
    }

    fn begin(&mut self, motion: Motion, duration: Duration, now: Instant) -> u64 {
        self.serial += 1;
        self.playing = Some(Playing {
            serial: self.serial,
            motion,
            started: now,
            duration,
        });
        self.serial
    }

    fn finish(&mut self, serial: u64) {
        if self.playing.as_ref().is_some_and(|p| p.serial == serial) {
            self.playing = None;
        }
    }
}

/// [`HexRenderer`] over the shared scene.
pub struct SceneRenderer(SharedScene);

impl SceneRenderer {
    pub fn new(scene: &SharedScene) -> Self {
        Self(Rc::clone(scene))
    }
}

impl HexRenderer for SceneRenderer {
    fn clear(&mut self) {
        let mut scene = self.0.borrow_mut();
        scene.hexes.clear();
        scene.cursor = None;
    }

    fn place_hex(&mut self, at: Coord, hex: Hex) {
        self.0.borrow_mut().hexes.push(Placed { at, hex });
    }

    fn place_cursor(&mut self, at: Coord) {
        self.0.borrow_mut().cursor = Some(at);
    }

    fn show_score(&mut self, points: u64) {
        self.0.borrow_mut().score = points;
    }
}

/// [`Animator`] that publishes each transition to the scene and resolves after its
/// nominal duration. Holds the scene weakly: once the UI is gone every call fails
/// with [`AnimationError::Closed`].
pub struct SceneAnimator {
    scene: Weak<RefCell<Scene>>,
    timings: AnimationTimings,
}

impl SceneAnimator {
    pub fn new(scene: &SharedScene, timings: AnimationTimings) -> Self {
        Self {
            scene: Rc::downgrade(scene),
            timings,
        }
    }

    async fn play(&self, motion: Motion, kind: AnimationKind) -> Result<(), AnimationError> {
        let duration = self.timings.of(kind);
        let serial = {
            let scene = self.scene.upgrade().ok_or(AnimationError::Closed)?;
            scene.borrow_mut().begin(motion, duration, Instant::now())
        };
        tokio::time::sleep(duration).await;
        let scene = self.scene.upgrade().ok_or(AnimationError::Closed)?;
        scene.borrow_mut().finish(serial);
        Ok(())
    }
}

impl Animator for SceneAnimator {
    async fn rotate(
        &self,
        clockwise: bool,
        center: Coord,
        ring: [Option<Hex>; 6],
    ) -> Result<(), AnimationError> {
        let motion = Motion::Rotate {
            clockwise,
            center,
            ring,
        };
        self.play(motion, AnimationKind::Rotate).await
    }

    async fn vanish(&self, hexes: &[Placed]) -> Result<(), AnimationError> {
        self.play(Motion::Vanish(hexes.to_vec()), AnimationKind::Vanish)
            .await
    }

    async fn shift_left(&self, hexes: &[ShiftEntry]) -> Result<(), AnimationError> {
        self.play(Motion::Shift(hexes.to_vec()), AnimationKind::Shift)
            .await
    }

    async fn show_text(&self, value: u64, kind: TextKind) -> Result<(), AnimationError> {
        match kind {
            TextKind::Chain => self.play(Motion::Text(value), AnimationKind::Text).await,
        }
    }
}

/// Timer display backed by the scene's gauge value.
pub struct SceneBar(SharedScene);

impl SceneBar {
    pub fn new(scene: &SharedScene) -> Self {
        Self(Rc::clone(scene))
    }
}

impl ProgressBar for SceneBar {
    fn render(&mut self, percentage: u8) {
        self.0.borrow_mut().percentage = percentage.min(100);
    }
}
