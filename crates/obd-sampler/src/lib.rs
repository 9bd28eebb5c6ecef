//! OBD-II Sampling Loop
//!
//! Polls RPM, speed, MAF and throttle at a fixed cadence, applies the
//! retry policy the client deliberately leaves to its caller, integrates
//! trip distance and fuel, and emits one [`TelemetrySample`] per period.

mod sample;
mod sampler;

pub use sample::TelemetrySample;
pub use sampler::{Sampler, SamplerConfig, SamplerError};
