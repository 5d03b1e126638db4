//! Breathing phase sequencer.
//!
//! A deterministic state machine with no timers of its own -- the caller
//! (normally the driver in `session.rs`) decides when time has passed.
//!
//! ## Phase transitions
//!
//! ```text
//! prepare -> inhale -> hold -> exhale -> [holdAfterExhale] -> (inhale | complete)
//! ```
//!
//! `holdAfterExhale` exists only for the box exercise; the others loop from
//! `exhale` straight back to `inhale`. `complete` is terminal.

use std::time::Duration;

use super::{BreathingSettings, ExerciseKind, Phase};

/// Seconds of preparation countdown before the first inhale.
const PREPARE_SECS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PhaseSequencer {
    kind: ExerciseKind,
    settings: BreathingSettings,
    phase: Phase,
    countdown: u32,
    cycles_completed: u32,
}

impl PhaseSequencer {
    /// Start a new exercise in `prepare` with the countdown at 3.
    pub fn new(kind: ExerciseKind) -> Self {
        Self {
            kind,
            settings: kind.settings(),
            phase: Phase::Prepare,
            countdown: PREPARE_SECS,
            cycles_completed: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds left on the preparation countdown.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// How long the current phase holds before [`advance`] applies.
    ///
    /// `None` for `prepare` (driven second-by-second via
    /// [`countdown_tick`]) and for the terminal `complete`.
    ///
    /// [`advance`]: Self::advance
    /// [`countdown_tick`]: Self::countdown_tick
    pub fn phase_duration(&self) -> Option<Duration> {
        let secs = match self.phase {
            Phase::Prepare | Phase::Complete => return None,
            Phase::Inhale => self.settings.inhale_secs,
            Phase::Hold => self.settings.hold_secs,
            Phase::Exhale => self.settings.exhale_secs,
            Phase::HoldAfterExhale => self.settings.hold_after_exhale_secs?,
        };
        Some(Duration::from_secs(secs))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// One second of the preparation countdown. Returns the phase entered
    /// when the countdown reaches zero and breathing begins.
    pub fn countdown_tick(&mut self) -> Option<Phase> {
        if self.phase != Phase::Prepare {
            return None;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.phase = Phase::Inhale;
            self.cycles_completed = 0;
            return Some(Phase::Inhale);
        }
        None
    }

    /// Advance past the current breathing phase once its duration has
    /// elapsed. Returns the phase entered; `None` from `prepare` (use
    /// [`countdown_tick`]) and from the terminal `complete`.
    ///
    /// [`countdown_tick`]: Self::countdown_tick
    pub fn advance(&mut self) -> Option<Phase> {
        let next = match self.phase {
            Phase::Prepare | Phase::Complete => return None,
            Phase::Inhale => Phase::Hold,
            Phase::Hold => Phase::Exhale,
            Phase::Exhale => {
                if self.settings.hold_after_exhale_secs.is_some() {
                    Phase::HoldAfterExhale
                } else {
                    self.finish_cycle()
                }
            }
            Phase::HoldAfterExhale => self.finish_cycle(),
        };
        self.phase = next;
        Some(next)
    }

    fn finish_cycle(&mut self) -> Phase {
        self.cycles_completed += 1;
        if self.cycles_completed >= self.settings.cycles_for_completion {
            Phase::Complete
        } else {
            Phase::Inhale
        }
    }
}
