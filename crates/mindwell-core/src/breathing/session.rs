//! Tokio driver for a guided breathing session.
//!
//! Runs the pure sequencer against wall-clock time: the preparation
//! countdown ticks once per second, then each phase holds for its
//! configured duration via a single deferred sleep (not a repeating tick)
//! before the machine advances.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::{ExerciseKind, Phase, PhaseSequencer};

/// Delay between entering `complete` and firing the completion callback,
/// leaving room for a closing animation on the caller's side.
const COMPLETION_DELAY: Duration = Duration::from_millis(1500);

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Handle to an active guided exercise.
///
/// The exercise runs on a spawned task until it completes or
/// [`deactivate`](Self::deactivate) is called. Dropping the handle does not
/// stop the exercise.
pub struct BreathingSession {
    task: JoinHandle<()>,
    completed: Arc<AtomicBool>,
}

impl BreathingSession {
    /// Activate an exercise.
    ///
    /// `on_phase` observes every transition exactly once, in strict order,
    /// synchronously with the state change, starting with `prepare`.
    /// `on_complete` fires once, a short fixed delay after the final
    /// transition.
    pub fn activate<P, C>(kind: ExerciseKind, on_phase: P, on_complete: C) -> Self
    where
        P: FnMut(Phase) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let completed = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(kind, on_phase, on_complete, Arc::clone(&completed)));
        Self { task, completed }
    }

    /// Whether the exercise has reached the terminal `complete` phase.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Cancel pending phase timers; no further transition fires after this
    /// returns. If the exercise already reached `complete`, the pending
    /// completion callback is left to fire.
    pub fn deactivate(self) {
        if !self.completed.load(Ordering::Acquire) {
            self.task.abort();
        }
    }
}

async fn run<P, C>(kind: ExerciseKind, mut on_phase: P, on_complete: C, completed: Arc<AtomicBool>)
where
    P: FnMut(Phase) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let mut sequencer = PhaseSequencer::new(kind);
    on_phase(sequencer.phase());

    while !sequencer.is_complete() {
        match sequencer.phase_duration() {
            // Prepare: tick the countdown once per second.
            None => {
                sleep(COUNTDOWN_TICK).await;
                if let Some(phase) = sequencer.countdown_tick() {
                    on_phase(phase);
                }
            }
            Some(duration) => {
                sleep(duration).await;
                if let Some(phase) = sequencer.advance() {
                    if phase == Phase::Complete {
                        completed.store(true, Ordering::Release);
                    }
                    on_phase(phase);
                }
            }
        }
    }

    sleep(COMPLETION_DELAY).await;
    on_complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collector() -> (Arc<Mutex<Vec<Phase>>>, impl FnMut(Phase) + Send + 'static) {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        (phases, move |phase| sink.lock().unwrap().push(phase))
    }

    #[tokio::test(start_paused = true)]
    async fn four_seven_eight_runs_in_strict_order() {
        let (phases, on_phase) = collector();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _session = BreathingSession::activate(ExerciseKind::FourSevenEight, on_phase, move || {
            let _ = tx.send(());
        });

        rx.await.expect("completion callback");

        let observed = phases.lock().unwrap().clone();
        assert_eq!(observed[0], Phase::Prepare);
        assert_eq!(observed[1], Phase::Inhale);
        assert_eq!(*observed.last().unwrap(), Phase::Complete);
        assert!(!observed.contains(&Phase::HoldAfterExhale));
        assert_eq!(observed.iter().filter(|p| **p == Phase::Inhale).count(), 4);
        // prepare + 4 cycles of (inhale, hold, exhale), last exhale -> complete
        assert_eq!(observed.len(), 1 + 4 * 3 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn box_observes_hold_after_exhale_each_cycle() {
        let (phases, on_phase) = collector();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _session = BreathingSession::activate(ExerciseKind::Box, on_phase, move || {
            let _ = tx.send(());
        });

        rx.await.expect("completion callback");

        let observed = phases.lock().unwrap().clone();
        assert_eq!(
            observed
                .iter()
                .filter(|p| **p == Phase::HoldAfterExhale)
                .count(),
            4
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deactivation_cancels_pending_transitions() {
        let (phases, on_phase) = collector();
        let session = BreathingSession::activate(ExerciseKind::Box, on_phase, || {
            panic!("completion must not fire after deactivation");
        });

        // Let the countdown finish and the first inhale begin.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        session.deactivate();
        let observed_at_cancel = phases.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(phases.lock().unwrap().len(), observed_at_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_still_fires_when_deactivated_in_complete() {
        let (_phases, on_phase) = collector();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let session = BreathingSession::activate(ExerciseKind::FourSevenEight, on_phase, move || {
            let _ = tx.send(());
        });

        // 3s countdown + 4 cycles * (4+7+8)s puts the machine in `complete`
        // at t=79s; deactivate inside the completion delay that follows.
        tokio::time::sleep(Duration::from_millis(79_500)).await;
        assert!(session.is_complete());
        session.deactivate();

        rx.await.expect("completion callback after deactivation");
    }
}
