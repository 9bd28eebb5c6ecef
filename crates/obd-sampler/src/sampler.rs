//! Sampling loop implementation

use obd_protocol::{ObdClient, Pid, Reading, Transport, TripAccumulator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::sample::TelemetrySample;

/// Sampling loop errors
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Sample receiver was dropped
    #[error("Sample channel closed")]
    ChannelClosed,
}

/// Configuration for the sampling loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Sampling period in milliseconds (default: 1000)
    pub period_ms: u64,
    /// Extra attempts per parameter after an unavailable read
    pub retries: u8,
    /// Pause before every request, for adapters that need spacing (ms)
    pub inter_request_delay_ms: u64,
    /// Consecutive failures before a PID is reported as lost
    pub warn_after_failures: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            retries: 1,
            inter_request_delay_ms: 0,
            warn_after_failures: 5,
        }
    }
}

impl SamplerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.max(1))
    }
}

/// Reads one parameter with the configured retries and failure tracking.
macro_rules! read_with_retry {
    ($self:ident, $read:ident, $pid:expr) => {{
        let mut reading = Reading::Unavailable;
        for attempt in 1..=u32::from($self.config.retries) + 1 {
            pace($self.config.inter_request_delay_ms).await;
            reading = $self.client.$read().await;
            if reading.is_available() {
                break;
            }
            debug!("PID {:02X} attempt {} unavailable", $pid.as_hex(), attempt);
        }
        $self.track($pid, reading.is_available());
        reading
    }};
}

/// Fixed-cadence sampler over an [`ObdClient`]
///
/// Owns the client and the trip accumulator; nothing else mutates either.
pub struct Sampler<T> {
    client: ObdClient<T>,
    config: SamplerConfig,
    trip: TripAccumulator,
    /// Consecutive failure count per PID
    failures: HashMap<Pid, u32>,
    last_sample: Option<Instant>,
}

impl<T: Transport> Sampler<T> {
    pub fn new(client: ObdClient<T>, config: SamplerConfig) -> Self {
        info!(
            "Sampler created: period {}ms, {} retries",
            config.period_ms, config.retries
        );
        Self {
            client,
            config,
            trip: TripAccumulator::new(),
            failures: HashMap::new(),
            last_sample: None,
        }
    }

    fn track(&mut self, pid: Pid, ok: bool) {
        let count = self.failures.entry(pid).or_insert(0);
        if ok {
            if *count >= self.config.warn_after_failures {
                info!("PID {:02X} recovered after {} failures", pid.as_hex(), count);
            }
            *count = 0;
        } else {
            *count += 1;
            if *count == self.config.warn_after_failures {
                warn!("PID {:02X} unavailable for {} consecutive samples", pid.as_hex(), count);
            }
        }
    }

    /// Take one sample.
    ///
    /// Runs the handshake first if the client is not ready; on failure the
    /// sample carries no engine data and the next period tries again.
    pub async fn sample_once(&mut self) -> TelemetrySample {
        let now = Instant::now();
        let elapsed = self.last_sample.map(|t| now.duration_since(t));
        self.last_sample = Some(now);

        let mut sample = TelemetrySample::new(unix_ms());

        let ready = self.client.is_ready();
        if !ready && !self.client.initialise().await {
            debug!("Adapter not ready, skipping engine reads");
            self.fill_trip(&mut sample);
            return sample;
        }

        let rpm = read_with_retry!(self, read_rpm, Pid::Rpm);
        let speed = read_with_retry!(self, read_speed, Pid::Speed);
        let maf = read_with_retry!(self, read_maf, Pid::Maf);
        let throttle = read_with_retry!(self, read_throttle, Pid::ThrottlePosition);

        if let Some(elapsed) = elapsed {
            self.trip.record_readings(speed, maf, elapsed);
        }

        sample.instant_mpg = match (speed, maf) {
            (Reading::Available(s), Reading::Available(m)) => {
                Some(self.client.calculate_instant_mpg(s as f32, m))
            }
            _ => None,
        };
        sample.rpm = rpm.value();
        sample.speed_kph = speed.value();
        sample.maf_g_s = maf.value();
        sample.throttle_pct = throttle.value();
        self.fill_trip(&mut sample);
        sample
    }

    fn fill_trip(&self, sample: &mut TelemetrySample) {
        sample.average_mpg = self.trip.average_mpg();
        sample.trip_distance_km = self.trip.distance_km();
        sample.trip_fuel_g = self.trip.fuel_g();
    }

    /// Sample every period until `shutdown` flips to `true`.
    ///
    /// Returns `ChannelClosed` if the receiver goes away first.
    pub async fn run(
        &mut self,
        sample_tx: mpsc::Sender<TelemetrySample>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SamplerError> {
        info!("Starting sampler");
        let mut ticker = tokio::time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let sample = self.sample_once().await;
            if sample_tx.send(sample).await.is_err() {
                warn!("Sample receiver dropped, stopping sampler");
                return Err(SamplerError::ChannelClosed);
            }
        }

        info!("Sampler stopped");
        Ok(())
    }

    /// Start a new trip
    pub fn reset_trip(&mut self) {
        info!(
            "Resetting trip ({:.2} km, {:.1} g fuel)",
            self.trip.distance_km(),
            self.trip.fuel_g()
        );
        self.trip.reset();
    }

    pub fn trip(&self) -> &TripAccumulator {
        &self.trip
    }

    pub fn client(&self) -> &ObdClient<T> {
        &self.client
    }

    /// Consecutive failures recorded for `pid`
    pub fn failures(&self, pid: Pid) -> u32 {
        self.failures.get(&pid).copied().unwrap_or(0)
    }
}

async fn pace(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
