//! Lifecycle events published by a stream.

use serde::{Deserialize, Serialize};

use crate::state::StreamState;

/// Events a stream publishes on its event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Stream state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<StreamState>,

        /// Current state.
        current: Box<StreamState>,
    },

    /// A new configuration became active.
    ConfigurationUpdated {
        /// Output width in pixels.
        width: u32,

        /// Output height in pixels.
        height: u32,
    },

    /// A new content filter became active.
    FilterUpdated,

    /// The native layer reported an error.
    Error {
        /// Error description.
        message: String,
    },
}
