//! GNSS position boundary
//!
//! The receiver itself lives outside this crate. Positions arrive as
//! signed fixed-point integers scaled by 10,000,000.

use serde::{Deserialize, Serialize};

/// Fixed-point scale of latitude/longitude
pub const DEGREES_SCALE: f64 = 10_000_000.0;

/// A position fix as reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude (degrees * 1e7)
    pub latitude_e7: i32,
    /// Longitude (degrees * 1e7)
    pub longitude_e7: i32,
}

impl Position {
    pub fn new(latitude_e7: i32, longitude_e7: i32) -> Self {
        Self {
            latitude_e7,
            longitude_e7,
        }
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_e7 as f64 / DEGREES_SCALE
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_e7 as f64 / DEGREES_SCALE
    }

    /// Latitude within ±90° and longitude within ±180°
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude_deg())
            && (-180.0..=180.0).contains(&self.longitude_deg())
    }
}

/// Position in degrees as written to the log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Position> for PositionFix {
    fn from(p: Position) -> Self {
        Self {
            latitude: p.latitude_deg(),
            longitude: p.longitude_deg(),
        }
    }
}

/// Anything that can report the current position
pub trait PositionSource: Send {
    /// Latest fix, or `None` without one
    fn position(&mut self) -> Option<Position>;
}

/// Source for installs without a GNSS receiver
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFix;

impl PositionSource for NoFix {
    fn position(&mut self) -> Option<Position> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_conversion() {
        let p = Position::new(515_007_000, -1_246_000);
        assert!((p.latitude_deg() - 51.5007).abs() < 1e-9);
        assert!((p.longitude_deg() + 0.1246).abs() < 1e-9);
        assert!(p.is_valid());
    }

    #[test]
    fn test_out_of_range() {
        assert!(!Position::new(900_000_001, 0).is_valid());
        assert!(!Position::new(0, i32::MIN).is_valid());
        assert!(Position::new(-900_000_000, 1_800_000_000).is_valid());
    }

    #[test]
    fn test_no_fix() {
        assert_eq!(NoFix.position(), None);
    }
}
