//! App: terminal init, main loop, pipeline tasks and key handling.

use crate::GameConfig;
use crate::grid::{Grid, GridError};
use crate::highscores::{self, HighScores};
use crate::input::{Action, key_to_action};
use crate::scene::{Scene, SceneAnimator, SceneBar, SceneRenderer, SharedScene};
use crate::theme::Theme;
use crate::timer::Timer;
use crate::ui::{self, Effects, View};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// ~60 FPS.
const FRAME: Duration = Duration::from_millis(16);

type Game = Grid<SceneAnimator>;

pub struct App {
    config: GameConfig,
    theme: Theme,
}

/// Live state of one session, shared with the spawned tasks.
struct Session {
    scene: SharedScene,
    scores: Rc<RefCell<HighScores>>,
    grid: Rc<Game>,
    faults: mpsc::UnboundedSender<GridError>,
}

impl Session {
    fn new(config: &GameConfig, faults: mpsc::UnboundedSender<GridError>) -> Self {
        let scene = Scene::shared();
        let scores = if config.highscores_enabled {
            HighScores::open(highscores::config_path())
        } else {
            HighScores::in_memory()
        };
        let scores = Rc::new(RefCell::new(scores));
        let grid = Grid::new(
            config.grid,
            config.animation,
            Timer::new(config.timer, Box::new(SceneBar::new(&scene))),
            SceneAnimator::new(&scene, config.animation),
            Box::new(SceneRenderer::new(&scene)),
            Box::new(Rc::clone(&scores)),
        );
        Self {
            scene,
            scores,
            grid: Rc::new(grid),
            faults,
        }
    }

    /// Run a rotation as its own task; a failure is fatal to the app.
    fn spawn_rotation(&self, clockwise: bool) {
        let grid = Rc::clone(&self.grid);
        let faults = self.faults.clone();
        tokio::task::spawn_local(async move {
            let turned = if clockwise {
                grid.rotate_clockwise().await
            } else {
                grid.rotate_counter_clockwise().await
            };
            if let Err(e) = turned {
                let _ = faults.send(e);
            }
        });
    }

    fn spawn_clock(&self) -> JoinHandle<()> {
        let grid = Rc::clone(&self.grid);
        tokio::task::spawn_local(async move { grid.run_clock().await })
    }

    /// Returns false when the player asked to quit.
    fn apply_action(&self, action: Action, effects: &mut Effects) -> bool {
        let grid = &self.grid;
        match action {
            Action::Quit => return false,
            Action::MoveLeft => grid.move_left(),
            Action::MoveUp => grid.move_up(),
            Action::MoveRight => grid.move_right(),
            Action::MoveDown => grid.move_down(),
            Action::RotateClockwise => self.spawn_rotation(true),
            Action::RotateCounterClockwise => self.spawn_rotation(false),
            Action::Restart => {
                if grid.init() {
                    effects.reset();
                }
            }
            Action::ClearHighScores => {
                if let Err(e) = self.scores.borrow_mut().clear() {
                    warn!(error = %e, "could not clear high scores");
                }
            }
            Action::None => {}
        }
        true
    }

    fn draw(
        &self,
        terminal: &mut DefaultTerminal,
        theme: &Theme,
        config: &GameConfig,
        effects: &mut Effects,
    ) -> Result<()> {
        let scene = self.scene.borrow();
        let scores = self.scores.borrow();
        let (width, height) = self.grid.size();
        let view = View {
            scene: &scene,
            theme,
            style: config.board_style,
            width,
            height,
            remaining_ms: self.grid.remaining_ms(),
            game_over: self.grid.is_game_over(),
            high_scores: scores.entries(),
        };
        terminal.draw(|f| ui::draw(f, &view, effects, Instant::now()))?;
        Ok(())
    }
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        Self { config, theme }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("cannot start async runtime")?;

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let local = LocalSet::new();
        let result = local.block_on(&runtime, self.run_loop(&mut terminal));

        // Restore
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    async fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let (faults_tx, mut faults) = mpsc::unbounded_channel();
        let session = Session::new(&self.config, faults_tx);
        let clock = session.spawn_clock();
        let mut effects = Effects::default();
        let mut frames = tokio::time::interval(FRAME);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            width = self.config.grid.width,
            height = self.config.grid.height,
            colors = self.config.grid.colors,
            "session started"
        );

        let result = loop {
            if let Ok(fault) = faults.try_recv() {
                break Err(anyhow::Error::new(fault).context("animation pipeline failed"));
            }
            if let Err(e) = session.draw(terminal, &self.theme, &self.config, &mut effects) {
                break Err(e);
            }

            let mut quit = false;
            while !quit && event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    quit = !session.apply_action(key_to_action(key), &mut effects);
                }
            }
            if quit {
                break Ok(());
            }

            // Hand the thread to the rotation and clock tasks until the next frame.
            frames.tick().await;
        };

        clock.abort();
        info!(score = session.grid.score(), "session ended");
        result
    }
}
