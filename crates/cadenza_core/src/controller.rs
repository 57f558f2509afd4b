//! Controller capability set
//!
//! Everything a timeline schedules is driven through this trait: native
//! keyframe animations, nested timelines, or host-provided players. The
//! timeline never inspects the concrete type behind a controller.

use crate::state::PlayState;

/// A playable animation as seen by the scheduler
///
/// Time values are in the controller's own local time (0 to
/// [`Controller::total_duration`]).
pub trait Controller {
    /// Start or resume playback
    fn play(&mut self);

    /// Halt playback at the current local time
    fn pause(&mut self);

    /// Stop playback and discard any applied effect
    fn cancel(&mut self);

    /// Jump to the end (for the current direction) and stop
    fn finish(&mut self);

    /// Move to a local time
    fn seek(&mut self, time: f64);

    /// Set the signed playback rate
    fn set_playback_rate(&mut self, rate: f64);

    /// Flip the playback direction
    fn reverse(&mut self);

    fn play_state(&self) -> PlayState;

    /// Request a play state
    ///
    /// The default maps the request onto the capability calls:
    /// `finished` finishes, `idle` cancels, `paused` pauses and
    /// `running`/`pending` play.
    fn set_play_state(&mut self, state: PlayState) {
        match state {
            PlayState::Finished => self.finish(),
            PlayState::Idle => self.cancel(),
            PlayState::Paused => self.pause(),
            PlayState::Running | PlayState::Pending => self.play(),
        }
    }

    /// Intrinsic length of the controller in its own time units
    fn total_duration(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        state: PlayState,
    }

    impl Controller for Recorder {
        fn play(&mut self) {
            self.calls.push("play");
            self.state = PlayState::Running;
        }
        fn pause(&mut self) {
            self.calls.push("pause");
            self.state = PlayState::Paused;
        }
        fn cancel(&mut self) {
            self.calls.push("cancel");
            self.state = PlayState::Idle;
        }
        fn finish(&mut self) {
            self.calls.push("finish");
            self.state = PlayState::Finished;
        }
        fn seek(&mut self, _time: f64) {
            self.calls.push("seek");
        }
        fn set_playback_rate(&mut self, _rate: f64) {
            self.calls.push("rate");
        }
        fn reverse(&mut self) {
            self.calls.push("reverse");
        }
        fn play_state(&self) -> PlayState {
            self.state
        }
        fn total_duration(&self) -> f64 {
            100.0
        }
    }

    #[test]
    fn test_set_play_state_maps_to_capabilities() {
        let mut recorder = Recorder::default();
        let controller: &mut dyn Controller = &mut recorder;

        controller.set_play_state(PlayState::Running);
        controller.set_play_state(PlayState::Paused);
        controller.set_play_state(PlayState::Finished);
        controller.set_play_state(PlayState::Idle);
        controller.set_play_state(PlayState::Pending);

        assert_eq!(
            recorder.calls,
            vec!["play", "pause", "finish", "cancel", "play"]
        );
        assert_eq!(recorder.play_state(), PlayState::Running);
    }
}
