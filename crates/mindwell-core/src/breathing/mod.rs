//! Guided breathing exercises.
//!
//! The phase sequencer is a pure state machine ([`PhaseSequencer`]) with no
//! timers of its own; the tokio driver ([`BreathingSession`]) turns it into
//! wall-clock phase timing. Visual interpolation is the caller's concern, a
//! pure function of the current phase and elapsed time, so the machine
//! stays testable without a rendering surface.

mod sequencer;
mod session;

pub use sequencer::PhaseSequencer;
pub use session::BreathingSession;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Phases of a guided breathing exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Prepare,
    Inhale,
    Hold,
    Exhale,
    /// Only the box exercise holds again after the exhale.
    HoldAfterExhale,
    Complete,
}

/// The guided exercises offered by the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseKind {
    #[serde(rename = "4-7-8")]
    FourSevenEight,
    #[serde(rename = "box")]
    Box,
    #[serde(rename = "grounding")]
    Grounding,
}

/// Per-exercise phase durations (whole seconds) and completion cycle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreathingSettings {
    pub inhale_secs: u64,
    pub hold_secs: u64,
    pub exhale_secs: u64,
    pub hold_after_exhale_secs: Option<u64>,
    pub cycles_for_completion: u32,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 3] = [
        ExerciseKind::FourSevenEight,
        ExerciseKind::Box,
        ExerciseKind::Grounding,
    ];

    /// The fixed settings table.
    pub fn settings(&self) -> BreathingSettings {
        match self {
            ExerciseKind::FourSevenEight => BreathingSettings {
                inhale_secs: 4,
                hold_secs: 7,
                exhale_secs: 8,
                hold_after_exhale_secs: None,
                cycles_for_completion: 4,
            },
            ExerciseKind::Box => BreathingSettings {
                inhale_secs: 4,
                hold_secs: 4,
                exhale_secs: 4,
                hold_after_exhale_secs: Some(4),
                cycles_for_completion: 4,
            },
            ExerciseKind::Grounding => BreathingSettings {
                inhale_secs: 5,
                hold_secs: 2,
                exhale_secs: 6,
                hold_after_exhale_secs: None,
                cycles_for_completion: 5,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExerciseKind::FourSevenEight => "4-7-8",
            ExerciseKind::Box => "box",
            ExerciseKind::Grounding => "grounding",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExerciseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4-7-8" => Ok(ExerciseKind::FourSevenEight),
            "box" => Ok(ExerciseKind::Box),
            "grounding" => Ok(ExerciseKind::Grounding),
            other => Err(format!("unknown exercise: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_table_matches_exercises() {
        let s = ExerciseKind::FourSevenEight.settings();
        assert_eq!((s.inhale_secs, s.hold_secs, s.exhale_secs), (4, 7, 8));
        assert_eq!(s.hold_after_exhale_secs, None);
        assert_eq!(s.cycles_for_completion, 4);

        let s = ExerciseKind::Box.settings();
        assert_eq!(s.hold_after_exhale_secs, Some(4));

        let s = ExerciseKind::Grounding.settings();
        assert_eq!((s.inhale_secs, s.hold_secs, s.exhale_secs), (5, 2, 6));
        assert_eq!(s.cycles_for_completion, 5);
    }

    #[test]
    fn kind_round_trips_through_labels() {
        for kind in ExerciseKind::ALL {
            assert_eq!(kind.label().parse::<ExerciseKind>(), Ok(kind));
        }
        assert!("breathless".parse::<ExerciseKind>().is_err());
    }

    #[test]
    fn phase_serializes_in_camel_case() {
        let json = serde_json::to_string(&Phase::HoldAfterExhale).unwrap();
        assert_eq!(json, r#""holdAfterExhale""#);
    }
}
