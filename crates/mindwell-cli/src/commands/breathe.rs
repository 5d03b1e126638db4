use clap::Subcommand;
use mindwell_core::{BreathingSession, ExerciseKind, Phase};

#[derive(Subcommand)]
pub enum BreatheAction {
    /// List available exercises
    List,
    /// Run a guided exercise in the terminal
    Start {
        /// Exercise kind: 4-7-8, box, grounding
        exercise: String,
    },
}

fn instruction(phase: Phase) -> &'static str {
    match phase {
        Phase::Prepare => "Get ready...",
        Phase::Inhale => "Breathe in",
        Phase::Hold | Phase::HoldAfterExhale => "Hold",
        Phase::Exhale => "Breathe out",
        Phase::Complete => "Well done!",
    }
}

pub async fn run(action: BreatheAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        BreatheAction::List => {
            for kind in ExerciseKind::ALL {
                let s = kind.settings();
                let hold_after = s
                    .hold_after_exhale_secs
                    .map(|secs| format!(" hold {secs}s"))
                    .unwrap_or_default();
                println!(
                    "{:<10} inhale {}s, hold {}s, exhale {}s{} -- {} cycles",
                    kind.label(),
                    s.inhale_secs,
                    s.hold_secs,
                    s.exhale_secs,
                    hold_after,
                    s.cycles_for_completion,
                );
            }
        }
        BreatheAction::Start { exercise } => {
            let kind: ExerciseKind = exercise.parse()?;
            println!("Starting {kind} breathing");

            let (tx, rx) = tokio::sync::oneshot::channel();
            let _session = BreathingSession::activate(
                kind,
                |phase| println!("{}", instruction(phase)),
                move || {
                    let _ = tx.send(());
                },
            );
            rx.await?;
        }
    }
    Ok(())
}
