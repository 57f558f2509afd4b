//! Play state shared by timelines and controllers

use crate::error::CadenzaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of anything that can be played
///
/// A timeline starts `Idle`, becomes `Pending` when asked to play, and turns
/// `Running` on the first tick it receives. `Paused` and `Finished` stop the
/// clock subscription; `Idle` is also what `cancel` returns to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    /// Not started, or cancelled
    #[default]
    Idle,
    /// Play requested, waiting for the first tick
    Pending,
    /// Advancing with the clock
    Running,
    /// Halted mid-timeline
    Paused,
    /// Reached the end of the timeline (in the current direction)
    Finished,
}

impl PlayState {
    /// Lower-case name used on the event bus and in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }

    /// True while the state wants clock ticks (`pending` or `running`)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PlayState {
    type Err = CadenzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "finished" => Ok(Self::Finished),
            other => Err(CadenzaError::invalid_arg(
                "playState",
                format!("unknown play state `{other}`"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(PlayState::default(), PlayState::Idle);
    }

    #[test]
    fn test_active_states() {
        assert!(PlayState::Pending.is_active());
        assert!(PlayState::Running.is_active());
        assert!(!PlayState::Idle.is_active());
        assert!(!PlayState::Paused.is_active());
        assert!(!PlayState::Finished.is_active());
    }

    #[test]
    fn test_parse_and_display() {
        for state in [
            PlayState::Idle,
            PlayState::Pending,
            PlayState::Running,
            PlayState::Paused,
            PlayState::Finished,
        ] {
            let parsed: PlayState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }

        let err = "stopped".parse::<PlayState>().unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
