//! Simulated clock: converts irregular wall-clock frame deltas into a
//! smooth, rate-scaled simulation time base without drift.

use crate::constants::{MAX_FRAME_DELTA_MS, TICKS_PER_FRAME_MS, TIME_RATIO};
use crate::numbers::{i32_to_f64, trunc_f64_to_i32};

/// Monotonic campaign clock.
///
/// Real time accumulates unconditionally; game time advances by
/// `delta × ratio × rate` truncated to whole milliseconds, with the
/// fractional remainder carried into the next update so the long-run average
/// rate is exact.
#[derive(Debug, Clone, PartialEq)]
pub struct GameClock {
    real_time: i32,
    real_loop_time: i32,
    game_time: i32,
    loop_time: i32,
    accumulated: f64,
    time_rate: i32,
    frame_counter: i32,
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            real_time: 0,
            real_loop_time: 0,
            game_time: 0,
            loop_time: 0,
            accumulated: 0.0,
            time_rate: 1,
            frame_counter: 0,
        }
    }
}

impl GameClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by one frame's wall-clock delta.
    ///
    /// The delta is clamped to [`MAX_FRAME_DELTA_MS`] so stalls and debugger
    /// pauses cannot inject huge catch-up jumps. Rate changes made since the
    /// previous call take effect here, not retroactively.
    pub fn update_time(&mut self, delta_ms: i32) {
        debug_assert!(delta_ms >= 0);
        let delta = delta_ms.clamp(0, MAX_FRAME_DELTA_MS);

        self.real_loop_time = delta;
        self.real_time += delta;

        let scaled = i32_to_f64(delta) * TIME_RATIO * i32_to_f64(self.time_rate);
        self.loop_time = trunc_f64_to_i32(scaled + self.accumulated);
        self.accumulated = (scaled + self.accumulated) - i32_to_f64(self.loop_time);

        self.game_time += self.loop_time;
        self.frame_counter = (self.real_time * self.time_rate) / TICKS_PER_FRAME_MS;
    }

    /// Integer time-rate multiplier: 0 = paused, 1 = normal, higher =
    /// fast-forward.
    pub fn set_time_rate(&mut self, time_rate: i32) {
        assert!(time_rate >= 0);
        self.time_rate = time_rate;
    }

    #[must_use]
    pub const fn time_rate(&self) -> i32 {
        self.time_rate
    }

    /// Wall-clock milliseconds accumulated since campaign start.
    #[must_use]
    pub const fn real_time(&self) -> i32 {
        self.real_time
    }

    /// Clamped wall-clock delta of the last update.
    #[must_use]
    pub const fn real_loop_time(&self) -> i32 {
        self.real_loop_time
    }

    /// Simulated milliseconds accumulated since campaign start.
    #[must_use]
    pub const fn game_time(&self) -> i32 {
        self.game_time
    }

    /// Simulated increment of the last update.
    #[must_use]
    pub const fn loop_time(&self) -> i32 {
        self.loop_time
    }

    /// Coarse animation-frame counter derived from real time and rate,
    /// independent of simulated time.
    #[must_use]
    pub const fn frame_counter(&self) -> i32 {
        self.frame_counter
    }

    /// Restore persisted real time. The fractional carry is deliberately
    /// reset; it is sub-millisecond state.
    pub fn set_real_time(&mut self, real_time: i32) {
        assert!(real_time >= 0);
        self.real_time = real_time;
        self.accumulated = 0.0;
    }

    /// Restore persisted game time.
    pub fn set_game_time(&mut self, game_time: i32) {
        assert!(game_time >= 0);
        self.game_time = game_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_deltas_match_one_call() {
        let mut split = GameClock::new();
        split.update_time(50);
        split.update_time(50);
        let mut whole = GameClock::new();
        whole.update_time(100);
        assert_eq!(split.game_time(), whole.game_time());
        assert_eq!(split.real_time(), whole.real_time());
    }

    #[test]
    fn delta_clamped_to_maximum() {
        let mut clock = GameClock::new();
        clock.update_time(10_000);
        assert_eq!(clock.real_time(), MAX_FRAME_DELTA_MS);
        assert_eq!(clock.real_loop_time(), MAX_FRAME_DELTA_MS);
    }

    #[test]
    fn rate_zero_freezes_game_time_only() {
        let mut clock = GameClock::new();
        clock.set_time_rate(0);
        clock.update_time(100);
        assert_eq!(clock.game_time(), 0);
        assert_eq!(clock.real_time(), 100);
    }

    #[test]
    fn rate_changes_apply_from_next_update() {
        let mut clock = GameClock::new();
        clock.update_time(10);
        clock.set_time_rate(3);
        clock.update_time(10);
        assert_eq!(clock.game_time(), 10 + 30);
    }

    #[test]
    fn fractional_carry_keeps_long_run_average_exact() {
        let mut clock = GameClock::new();
        clock.set_time_rate(1);
        for _ in 0..10_000 {
            clock.update_time(1);
        }
        let expected = trunc_f64_to_i32(10_000.0 * TIME_RATIO);
        assert!((clock.game_time() - expected).abs() <= 1);
    }

    #[test]
    fn frame_counter_tracks_real_time_and_rate() {
        let mut clock = GameClock::new();
        for _ in 0..5 {
            clock.update_time(100);
        }
        assert_eq!(clock.frame_counter(), 5);
        clock.set_time_rate(2);
        clock.update_time(100);
        assert_eq!(clock.frame_counter(), (600 * 2) / TICKS_PER_FRAME_MS);
    }
}
