//! Fuel Economy Estimator
//!
//! Pure conversions from speed and mass air flow to US miles per gallon,
//! plus an explicitly owned trip accumulator for session averages.
//!
//! Fuel mass is derived from air mass with a fixed stoichiometric ratio.
//! The constants are fixed so results are comparable across sessions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reading::Reading;

/// Air/fuel mass ratio for gasoline at stoichiometry
pub const STOICHIOMETRIC_AFR: f64 = 14.7;

/// Gasoline density (lb per US gallon)
pub const GASOLINE_DENSITY_LB_PER_GAL: f64 = 6.17;

pub const GRAMS_PER_POUND: f64 = 453.592;

pub const MILES_PER_KM: f64 = 0.621371;

const SECONDS_PER_HOUR: f64 = 3600.0;

fn grams_fuel_to_gallons(grams: f64) -> f64 {
    grams / GRAMS_PER_POUND / GASOLINE_DENSITY_LB_PER_GAL
}

/// Instantaneous MPG from one speed (km/h) and MAF (g/s) sample.
///
/// Returns 0.0 unless both inputs are finite and strictly positive. For
/// valid input the result is always finite and strictly positive.
pub fn calculate_instant_mpg(speed_kph: f32, maf_g_s: f32) -> f32 {
    if !is_positive(speed_kph) || !is_positive(maf_g_s) {
        return 0.0;
    }

    let fuel_g_per_hour = maf_g_s as f64 * SECONDS_PER_HOUR / STOICHIOMETRIC_AFR;
    let gallons_per_hour = grams_fuel_to_gallons(fuel_g_per_hour);
    let mph = speed_kph as f64 * MILES_PER_KM;

    // f32 extremes would otherwise round to 0 or overflow to inf
    ((mph / gallons_per_hour) as f32).clamp(f32::MIN_POSITIVE, f32::MAX)
}

/// Average MPG over caller-supplied totals: distance (km) and fuel mass (g).
///
/// Stateless: accumulation belongs to the caller, see [`TripAccumulator`].
/// Returns 0.0 for non-positive fuel, negative distance, or non-finite input.
pub fn calculate_average_mpg(distance_km: f32, fuel_g: f32) -> f32 {
    if !is_positive(fuel_g) || !distance_km.is_finite() || distance_km < 0.0 {
        return 0.0;
    }

    let miles = distance_km as f64 * MILES_PER_KM;
    let gallons = grams_fuel_to_gallons(fuel_g as f64);

    ((miles / gallons) as f32).min(f32::MAX)
}

fn is_positive(x: f32) -> bool {
    x.is_finite() && x > 0.0
}

/// Running totals for one trip.
///
/// Owned by the sampling loop; there is no process-wide state. Only
/// consistent speed/MAF pairs are integrated so distance and fuel cover
/// the same time span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TripAccumulator {
    distance_km: f64,
    fuel_g: f64,
    elapsed_s: f64,
}

impl TripAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate one sample pair over `elapsed`.
    ///
    /// Negative or non-finite inputs are ignored.
    pub fn record(&mut self, speed_kph: f32, maf_g_s: f32, elapsed: Duration) {
        if !speed_kph.is_finite() || !maf_g_s.is_finite() || speed_kph < 0.0 || maf_g_s < 0.0 {
            return;
        }
        let secs = elapsed.as_secs_f64();
        self.distance_km += speed_kph as f64 * secs / SECONDS_PER_HOUR;
        self.fuel_g += maf_g_s as f64 * secs / STOICHIOMETRIC_AFR;
        self.elapsed_s += secs;
    }

    /// Integrate resolved readings; a pair with a missing side is skipped.
    ///
    /// Returns whether the pair was recorded.
    pub fn record_readings(
        &mut self,
        speed_kph: Reading<u8>,
        maf_g_s: Reading<f32>,
        elapsed: Duration,
    ) -> bool {
        match (speed_kph, maf_g_s) {
            (Reading::Available(speed), Reading::Available(maf)) => {
                self.record(speed as f32, maf, elapsed);
                true
            }
            _ => false,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Fuel burned so far (g)
    pub fn fuel_g(&self) -> f64 {
        self.fuel_g
    }

    /// Time covered by recorded pairs
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_s)
    }

    /// Session average MPG
    pub fn average_mpg(&self) -> f32 {
        calculate_average_mpg(self.distance_km as f32, self.fuel_g as f32)
    }

    /// Start a new trip
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_instant_zero_for_non_positive(s in -1000.0f32..=0.0, m in any::<f32>()) {
            prop_assert_eq!(calculate_instant_mpg(s, m), 0.0);
            prop_assert_eq!(calculate_instant_mpg(m, s), 0.0);
        }

        #[test]
        fn prop_instant_positive_finite(
            s in f32::MIN_POSITIVE..f32::MAX,
            m in f32::MIN_POSITIVE..f32::MAX,
        ) {
            let mpg = calculate_instant_mpg(s, m);
            prop_assert!(mpg > 0.0 && mpg.is_finite(), "mpg {} for ({}, {})", mpg, s, m);
        }

        #[test]
        fn prop_average_zero_for_non_positive_fuel(d in any::<f32>(), f in -1.0e6f32..=0.0) {
            prop_assert_eq!(calculate_average_mpg(d, f), 0.0);
        }

        #[test]
        fn prop_average_monotonic_in_distance(
            d1 in 0.0f32..1.0e6,
            d2 in 0.0f32..1.0e6,
            f in 0.001f32..1.0e6,
        ) {
            let (lo, hi) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            prop_assert!(calculate_average_mpg(lo, f) <= calculate_average_mpg(hi, f));
        }
    }
}
