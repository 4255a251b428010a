//! Stream lifecycle state machine types.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a capture stream.
///
/// ```text
/// Idle -> Starting -> Running -> Stopping -> Stopped
///            |           |          |
///            +-----------+----------+--> Failed
/// ```
///
/// `Stopped` and `Failed` streams may be started again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamState {
    /// Created, never started.
    #[default]
    Idle,

    /// Start requested, completion pending.
    Starting,

    /// Start completed; outputs may fire.
    Running,

    /// Stop requested, completion pending.
    Stopping,

    /// Stop completed.
    Stopped,

    /// The native layer reported an error.
    Failed {
        /// Description of the error that caused the failure.
        message: String,
    },
}

impl StreamState {
    /// Returns true if the stream has never been started.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a start is pending.
    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Starting)
    }

    /// Returns true if the stream is running.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if a stop is pending.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    /// Returns true if the stream was stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if the stream failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns true while native capture is (or may be) in progress.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Whether `start_capture` is valid from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Failed { .. })
    }

    /// Whether `stop_capture` is valid from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether configuration or filter updates are valid from this state.
    pub fn can_update(&self) -> bool {
        self.is_running()
    }

    /// Whether outputs may be added in this state.
    pub fn accepts_outputs(&self) -> bool {
        !self.is_active()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Failed { .. } => "Failed",
        }
    }
}
