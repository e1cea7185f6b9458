//! Restart policy.
//!
//! The default policy watches the glue levels of learned clauses: when the average glue over a
//! short window exceeds the long term average by a margin, the search is likely stuck in a bad
//! area and restarting is worthwhile. Restarts are *blocked* while the trail is much longer than
//! its long term average at conflicts, as a long trail suggests the search is about to make
//! progress.
//!
//! Luby and geometric conflict count schedules are available as alternatives; both only count
//! conflicts since the last restart. Every policy merely raises a flag here; the search loop
//! performs the restart at a clause boundary.
use crate::config::{RestartStrategy, SolverConfig};

use super::average::{RunningAverage, WindowedAverage};

/// The term at the given position of the Luby restart sequence
/// ([A182105](https://oeis.org/A182105)): 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, ...
///
/// Each prefix of the sequence ends with the next higher power of two and is then repeated
/// twice before that. The term is found by locating the smallest such complete prefix
/// containing the position and descending into the repetition the position falls into.
fn luby(position: u64) -> u64 {
    let mut prefix_len = 1;
    while prefix_len < position + 1 {
        prefix_len = 2 * prefix_len + 1;
    }

    let mut position = position;
    while prefix_len - 1 != position {
        prefix_len = (prefix_len - 1) / 2;
        position %= prefix_len;
    }

    (prefix_len + 1) / 2
}

/// Restart policy state.
pub struct RestartControl {
    /// Glue of recently learned clauses.
    short_glue: WindowedAverage,
    /// Glue of all learned clauses.
    long_glue: RunningAverage,
    /// Trail size at recent conflicts.
    long_trail: RunningAverage,
    /// Conflicts since the last restart.
    conflicts_since_restart: u64,
    /// Conflict count triggering the next scheduled restart (Luby and geometric).
    next_scheduled_restart: u64,
    /// Position in the Luby sequence.
    luby_position: u64,
    geometric_interval: f64,
    /// A restart is pending until the search loop executes it.
    pending: bool,
    restarts: u64,
    blocked: u64,
}

impl Default for RestartControl {
    fn default() -> RestartControl {
        let config = SolverConfig::default();
        let mut control = RestartControl {
            short_glue: WindowedAverage::new(config.restart_short_window),
            long_glue: RunningAverage::default(),
            long_trail: RunningAverage::default(),
            conflicts_since_restart: 0,
            next_scheduled_restart: 0,
            luby_position: 0,
            geometric_interval: config.geometric_restart_base as f64,
            pending: false,
            restarts: 0,
            blocked: 0,
        };
        control.schedule_next(&config);
        control
    }
}

impl RestartControl {
    /// Apply a changed configuration.
    pub fn configure(&mut self, config: &SolverConfig) {
        self.short_glue.set_capacity(config.restart_short_window);
        self.geometric_interval = config.geometric_restart_base as f64;
        self.schedule_next(config);
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Number of restarts suppressed by the blocking condition.
    pub fn blocked(&self) -> u64 {
        self.blocked
    }

    /// Record a conflict and update the restart decision.
    pub fn on_conflict(&mut self, glue: usize, trail_len: usize, config: &SolverConfig) {
        self.conflicts_since_restart += 1;

        match config.restart {
            RestartStrategy::Glue => {
                self.short_glue.push(glue as u64);
                self.long_glue.push(glue as u64);

                // Blocking: a trail well above its long term average suggests the search is
                // closing in on a model, so do not throw it away.
                let warmed_up = self.long_trail.count() >= config.restart_long_window as u64;
                if warmed_up
                    && self.short_glue.is_full()
                    && trail_len as f64
                        > config.restart_blocking_margin * self.long_trail.average()
                {
                    self.short_glue.clear();
                    self.pending = false;
                    self.blocked += 1;
                }
                self.long_trail.push(trail_len as u64);

                let warmed_up = self.long_glue.count() >= config.restart_long_window as u64;
                if warmed_up
                    && self.short_glue.is_full()
                    && self.short_glue.average() * config.restart_margin
                        > self.long_glue.average()
                {
                    self.pending = true;
                }
            }
            RestartStrategy::Luby | RestartStrategy::Geometric => {
                if self.conflicts_since_restart >= self.next_scheduled_restart {
                    self.pending = true;
                }
            }
            RestartStrategy::Never => {}
        }
    }

    /// Whether the search loop should restart now.
    pub fn wants_restart(&self) -> bool {
        self.pending
    }

    /// Called by the search loop after performing the restart.
    pub fn on_restart(&mut self, config: &SolverConfig) {
        self.pending = false;
        self.conflicts_since_restart = 0;
        self.short_glue.clear();
        self.restarts += 1;
        self.schedule_next(config);
    }

    fn schedule_next(&mut self, config: &SolverConfig) {
        match config.restart {
            RestartStrategy::Luby => {
                self.next_scheduled_restart =
                    config.luby_restart_interval_scale * luby(self.luby_position);
                self.luby_position += 1;
            }
            RestartStrategy::Geometric => {
                self.next_scheduled_restart = self.geometric_interval as u64;
                self.geometric_interval *= config.geometric_restart_factor;
            }
            RestartStrategy::Glue | RestartStrategy::Never => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luby_terms() {
        let prefix: Vec<u64> = (0..15).map(luby).collect();
        assert_eq!(prefix, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);

        // Every prefix of length 2^k - 1 ends with its largest term.
        for k in 1..10u32 {
            assert_eq!(luby(2u64.pow(k) - 2), 2u64.pow(k - 1));
        }
    }

    #[test]
    fn luby_schedule_requests_restarts() {
        let mut config = SolverConfig::default();
        config.restart = RestartStrategy::Luby;
        config.luby_restart_interval_scale = 2;

        let mut control = RestartControl::default();
        control.configure(&config);

        // First Luby term is 1, scaled to 2 conflicts.
        control.on_conflict(3, 10, &config);
        assert!(!control.wants_restart());
        control.on_conflict(3, 10, &config);
        assert!(control.wants_restart());
        control.on_restart(&config);
        assert!(!control.wants_restart());
        assert_eq!(control.restarts(), 1);
    }

    #[test]
    fn glue_restart_fires_on_bad_streak() {
        let mut config = SolverConfig::default();
        config.restart_short_window = 5;
        config.restart_long_window = 10;

        let mut control = RestartControl::default();
        control.configure(&config);

        // A calm phase with low glue.
        for _ in 0..20 {
            control.on_conflict(2, 10, &config);
        }
        assert!(!control.wants_restart());

        // A streak of very high glue conflicts trips the ratio.
        for _ in 0..5 {
            control.on_conflict(50, 10, &config);
        }
        assert!(control.wants_restart());
    }

    #[test]
    fn never_strategy_never_restarts() {
        let mut config = SolverConfig::default();
        config.restart = RestartStrategy::Never;

        let mut control = RestartControl::default();
        control.configure(&config);

        for _ in 0..10_000 {
            control.on_conflict(100, 1, &config);
        }
        assert!(!control.wants_restart());
    }
}
