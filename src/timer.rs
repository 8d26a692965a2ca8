//! Countdown clock. Animations hold it (without costing the player time) and chains add to it.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Display of the remaining time, 0..=100 percent of the configured maximum.
pub trait ProgressBar {
    fn render(&mut self, percentage: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Time on the clock when a game starts.
    pub max_time: Duration,
    /// How often the clock ticks.
    pub increment: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_time: Duration::from_millis(30_000),
            increment: Duration::from_millis(1_000),
        }
    }
}

/// What a call to [`Timer::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is not running; nothing changed.
    Stopped,
    /// Time was deducted but the display is held by an animation.
    Held,
    /// Time was deducted and the display updated.
    Progress(u8),
    /// Time ran out on this tick. The clock is now stopped, so this is reported once per game.
    Expired,
}

pub struct Timer {
    max_ms: i64,
    increment: Duration,
    /// Milliseconds left; may exceed `max_ms` after gains and drop below zero on the final tick.
    remaining_ms: i64,
    last_tick: Option<Instant>,
    held_until: Option<Instant>,
    running: bool,
    bar: Box<dyn ProgressBar>,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("remaining_ms", &self.remaining_ms)
            .field("held_until", &self.held_until)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl Timer {
    pub fn new(config: TimerConfig, bar: Box<dyn ProgressBar>) -> Self {
        let max_ms = millis(config.max_time).max(1);
        Self {
            max_ms,
            increment: config.increment,
            remaining_ms: max_ms,
            last_tick: None,
            held_until: None,
            running: false,
            bar,
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn increment(&self) -> Duration {
        self.increment
    }

    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }

    pub fn held_until(&self) -> Option<Instant> {
        self.held_until
    }

    /// True while an animation hold keeps the display frozen.
    pub fn is_held(&self, now: Instant) -> bool {
        self.held_until.is_some_and(|until| until >= now)
    }

    pub fn percentage(&self) -> u8 {
        let pct = (self.remaining_ms as f64 / self.max_ms as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    /// Fill the clock and start counting down from `now`.
    pub fn start(&mut self, now: Instant) {
        self.remaining_ms = self.max_ms;
        self.last_tick = Some(now);
        self.running = true;
    }

    /// Starts the clock unless it is already running. Returns whether it was started.
    pub fn start_if_not_running(&mut self, now: Instant) -> bool {
        if self.running {
            return false;
        }
        self.start(now);
        true
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Stop and refill, ready for a new game.
    pub fn reset(&mut self) {
        self.stop();
        self.remaining_ms = self.max_ms;
        self.last_tick = None;
        self.held_until = None;
        self.bar.render(100);
    }

    /// Freeze the display for `howlong` (stacking onto a hold still in effect) and
    /// credit the same amount, so the animation does not eat into the player's time.
    pub fn hold(&mut self, howlong: Duration, now: Instant) {
        let until = match self.held_until {
            Some(until) if until >= now => until + howlong,
            _ => now + howlong,
        };
        self.held_until = Some(until);
        self.add_time(howlong);
        trace!(hold_ms = millis(howlong), remaining_ms = self.remaining_ms, "clock held");
    }

    pub fn add_time(&mut self, amount: Duration) {
        self.remaining_ms = self.remaining_ms.saturating_add(millis(amount));
    }

    /// Deduct the wall-clock time since the previous tick.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stopped;
        }
        let last = self.last_tick.replace(now).unwrap_or(now);
        self.remaining_ms -= millis(now.saturating_duration_since(last));

        if self.remaining_ms <= 0 {
            self.stop();
            self.bar.render(0);
            return TickOutcome::Expired;
        }
        if self.is_held(now) {
            trace!(remaining_ms = self.remaining_ms, "clock display held");
            return TickOutcome::Held;
        }
        let pct = self.percentage();
        self.bar.render(pct);
        TickOutcome::Progress(pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<u8>>>);

    impl ProgressBar for Recorder {
        fn render(&mut self, percentage: u8) {
            self.0.borrow_mut().push(percentage);
        }
    }

    fn timer() -> (Timer, Recorder) {
        let bar = Recorder::default();
        (Timer::new(TimerConfig::default(), Box::new(bar.clone())), bar)
    }

    const fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_hold_after_expired_hold_credits_time() {
        let (mut t, _) = timer();
        let now = Instant::now();
        t.start(now);
        t.hold(ms(400), now);
        let later = now + ms(1000);
        let before = t.remaining_ms();
        t.hold(ms(400), later);
        assert_eq!(t.remaining_ms(), before + 400);
        assert_eq!(t.held_until(), Some(later + ms(400)));
    }

    #[test]
    fn test_hold_extends_active_hold() {
        let (mut t, _) = timer();
        let now = Instant::now();
        t.hold(ms(400), now);
        t.hold(ms(400), now + ms(100));
        assert_eq!(t.held_until(), Some(now + ms(800)));
        assert_eq!(t.remaining_ms(), 30_000 + 800);
    }

    #[test]
    fn test_tick_deducts_elapsed_and_renders() {
        let (mut t, bar) = timer();
        let now = Instant::now();
        t.start(now);
        assert_eq!(t.tick(now + ms(3_000)), TickOutcome::Progress(90));
        assert_eq!(t.remaining_ms(), 27_000);
        assert_eq!(*bar.0.borrow(), vec![90]);
    }

    #[test]
    fn test_tick_while_held_skips_display() {
        let (mut t, bar) = timer();
        let now = Instant::now();
        t.start(now);
        t.hold(ms(400), now);
        assert_eq!(t.tick(now + ms(200)), TickOutcome::Held);
        // Credit and deduction both happened.
        assert_eq!(t.remaining_ms(), 30_000 + 400 - 200);
        assert!(bar.0.borrow().is_empty());
        assert!(matches!(t.tick(now + ms(1_000)), TickOutcome::Progress(_)));
    }

    #[test]
    fn test_tick_when_stopped_is_noop() {
        let (mut t, bar) = timer();
        assert_eq!(t.tick(Instant::now()), TickOutcome::Stopped);
        assert_eq!(t.remaining_ms(), 30_000);
        assert!(bar.0.borrow().is_empty());
    }

    #[test]
    fn test_expiry_reported_once() {
        let (mut t, bar) = timer();
        let now = Instant::now();
        t.start(now);
        assert_eq!(t.tick(now + ms(31_000)), TickOutcome::Expired);
        assert!(!t.is_running());
        assert_eq!(t.tick(now + ms(32_000)), TickOutcome::Stopped);
        assert_eq!(bar.0.borrow().last(), Some(&0));
    }

    #[test]
    fn test_add_time_beyond_max_clamps_display() {
        let (mut t, _) = timer();
        let now = Instant::now();
        t.start(now);
        t.add_time(ms(5_000));
        assert_eq!(t.remaining_ms(), 35_000);
        assert_eq!(t.percentage(), 100);
    }

    #[test]
    fn test_start_if_not_running_only_once() {
        let (mut t, _) = timer();
        let now = Instant::now();
        assert!(t.start_if_not_running(now));
        t.tick(now + ms(1_000));
        assert!(!t.start_if_not_running(now + ms(1_000)));
        assert_eq!(t.remaining_ms(), 29_000);
    }

    #[test]
    fn test_reset_refills_and_stops() {
        let (mut t, bar) = timer();
        let now = Instant::now();
        t.start(now);
        t.tick(now + ms(10_000));
        t.reset();
        assert!(!t.is_running());
        assert_eq!(t.remaining_ms(), 30_000);
        assert_eq!(bar.0.borrow().last(), Some(&100));
    }
}
