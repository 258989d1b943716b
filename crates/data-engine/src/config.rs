use serde::{Deserialize, Serialize};

/// Data engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataEngineConfig {
    /// Emit time bars for intervals without updates (repeating the last close)
    pub time_bars_build_with_no_updates: bool,
    /// Stamp time bars with their close rather than their open
    pub time_bars_timestamp_on_close: bool,
    /// Drop quotes, trades and bars older than the latest cached one
    pub validate_data_sequence: bool,
}

impl Default for DataEngineConfig {
    fn default() -> Self {
        Self {
            time_bars_build_with_no_updates: false,
            time_bars_timestamp_on_close: true,
            validate_data_sequence: false,
        }
    }
}
