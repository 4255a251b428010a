//! Bridge-wide tunables.

use serde::{Deserialize, Serialize};

use crate::{EVENT_CHANNEL_CAPACITY, OUTPUT_CHANNEL_CAPACITY};

/// Settings applied to every stream a bridge creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Samples buffered per stream between the native layer and the
    /// dispatcher before new samples are dropped.
    pub output_queue_capacity: usize,

    /// Lifecycle events buffered per stream.
    pub event_queue_capacity: usize,

    /// Prefix for dispatcher thread names.
    pub dispatcher_thread_prefix: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            output_queue_capacity: OUTPUT_CHANNEL_CAPACITY,
            event_queue_capacity: EVENT_CHANNEL_CAPACITY,
            dispatcher_thread_prefix: "scbridge-dispatch".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: BridgeSettings =
            serde_json::from_str(r#"{ "output_queue_capacity": 2 }"#).unwrap();
        assert_eq!(settings.output_queue_capacity, 2);
        assert_eq!(settings.event_queue_capacity, EVENT_CHANNEL_CAPACITY);
        assert_eq!(settings.dispatcher_thread_prefix, "scbridge-dispatch");
    }
}
