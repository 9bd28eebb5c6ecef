//! Telemetry sample emitted once per sampling period

use serde::{Deserialize, Serialize};

/// One sampling period's worth of engine data
///
/// Parameters the adapter did not deliver are `None` (serialised as
/// `null`), never a silent zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Timestamp (Unix ms)
    pub timestamp_ms: u64,
    /// Engine RPM
    pub rpm: Option<u16>,
    /// Vehicle speed (km/h)
    pub speed_kph: Option<u8>,
    /// Mass air flow rate (g/s)
    pub maf_g_s: Option<f32>,
    /// Throttle position (0-100%)
    pub throttle_pct: Option<u8>,
    /// Instantaneous MPG; `None` unless both speed and MAF were read
    pub instant_mpg: Option<f32>,
    /// Trip average MPG so far
    pub average_mpg: f32,
    /// Trip distance (km)
    pub trip_distance_km: f64,
    /// Trip fuel burned (g)
    pub trip_fuel_g: f64,
}

impl TelemetrySample {
    /// Create a new empty sample with the given timestamp
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    /// Whether any engine parameter was read this period
    pub fn has_engine_data(&self) -> bool {
        self.rpm.is_some()
            || self.speed_kph.is_some()
            || self.maf_g_s.is_some()
            || self.throttle_pct.is_some()
    }
}
