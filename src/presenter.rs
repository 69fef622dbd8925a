//! Visual side of the character
//!
//! The session engine only asks for an action to be played and for the
//! character's brightness to change; completion comes back through
//! [`OrchestratorHandle::action_finished`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::protocol::ActionCue;
use crate::session::OrchestratorHandle;

/// Renders action cues and brightness
pub trait Presenter: Send + Sync {
    /// Start `cue`, replacing whatever is playing
    fn play_action(&self, cue: &ActionCue);

    /// Set character brightness, clamped to `[0, 1]`
    fn set_brightness(&self, level: f32);
}

/// Presenter for terminals: logs cues and reports them finished after a
/// fixed duration
pub struct ConsolePresenter {
    handle: OrchestratorHandle,
    duration: Duration,
    generation: Arc<AtomicU64>,
}

impl ConsolePresenter {
    #[must_use]
    pub fn new(handle: OrchestratorHandle, duration: Duration) -> Self {
        Self {
            handle,
            duration,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Presenter for ConsolePresenter {
    fn play_action(&self, cue: &ActionCue) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(cue = %cue.name, looping = cue.looping, "playing action");

        if cue.looping {
            return;
        }

        let current = Arc::clone(&self.generation);
        let handle = self.handle.clone();
        let duration = self.duration;
        let name = cue.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Replaced cues never report completion
            if current.load(Ordering::SeqCst) == generation {
                handle.action_finished(name);
            }
        });
    }

    fn set_brightness(&self, level: f32) {
        tracing::debug!(level = level.clamp(0.0, 1.0), "brightness");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionInput;
    use crate::session::machine::Event;

    #[tokio::test(start_paused = true)]
    async fn reports_only_latest_cue() {
        let (handle, mut inputs) = OrchestratorHandle::new();
        let presenter = ConsolePresenter::new(handle, Duration::from_millis(100));

        presenter.play_action(&ActionCue::once("idle_6"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        presenter.play_action(&ActionCue::once("wave"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(matches!(
            inputs.try_recv(),
            Ok(SessionInput::Event(Event::ActionFinished { ref name })) if name == "wave"
        ));
        assert!(inputs.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn looping_cue_never_finishes() {
        let (handle, mut inputs) = OrchestratorHandle::new();
        let presenter = ConsolePresenter::new(handle, Duration::from_millis(10));

        presenter.play_action(&ActionCue::looping("idle_7"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(inputs.try_recv().is_err());
    }
}
