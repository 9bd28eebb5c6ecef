//! Vehicle Telemetry Logger
//!
//! Wires an OBD-II adapter, the sampling loop, a position source and the
//! JSON-lines sink together. Each sample is stamped with the current
//! position and appended to the session file.

mod config;
mod error;
mod position;
mod sink;

pub use config::{AdapterConfig, LoggerConfig, StorageConfig, ENV_PREFIX};
pub use error::LoggerError;
pub use position::{NoFix, Position, PositionFix, PositionSource};
pub use sink::{session_path, JsonLinesSink, LogRecord};

use chrono::{TimeZone, Utc};
use obd_protocol::{ObdClient, SerialTransport, SimulatedEcu, Transport};
use obd_sampler::{Sampler, TelemetrySample};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Samples buffered between the sampler and the sink
const SAMPLE_CHANNEL_CAPACITY: usize = 32;

/// Initialize logging
pub fn init_logging(level: &str) -> Result<(), LoggerError> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggerError::Logging(e.to_string()))
}

/// Open the configured adapter link
pub fn open_transport(adapter: &AdapterConfig) -> Result<Box<dyn Transport>, LoggerError> {
    if adapter.simulate {
        info!("Using simulated ECU");
        return Ok(Box::new(SimulatedEcu::new()));
    }
    let transport = SerialTransport::open(&adapter.device, adapter.baud_rate)?;
    Ok(Box::new(transport))
}

/// Build the log line for one sample
pub fn stamp(sample: TelemetrySample, source: &mut dyn PositionSource) -> LogRecord {
    let timestamp = Utc
        .timestamp_millis_opt(sample.timestamp_ms as i64)
        .single()
        .unwrap_or_else(Utc::now);
    let position = source
        .position()
        .filter(Position::is_valid)
        .map(PositionFix::from);
    LogRecord {
        timestamp,
        position,
        sample,
    }
}

/// Run the logger until `shutdown` flips to `true`
pub async fn run<T, P>(
    config: LoggerConfig,
    transport: T,
    mut positions: P,
    shutdown: watch::Receiver<bool>,
) -> Result<(), LoggerError>
where
    T: Transport + 'static,
    P: PositionSource,
{
    let mut sink = JsonLinesSink::create(&config.storage.root, Utc::now()).await?;

    let client = ObdClient::new(transport, config.adapter.client_config());
    let mut sampler = Sampler::new(client, config.sampler.clone());
    let (sample_tx, mut sample_rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);

    let sampler_task = tokio::spawn(async move { sampler.run(sample_tx, shutdown).await });

    while let Some(sample) = sample_rx.recv().await {
        let record = stamp(sample, &mut positions);
        sink.write(&record).await?;
    }

    match sampler_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Sampler ended: {}", e),
        Err(e) => warn!("Sampler task failed: {}", e),
    }

    info!(
        "Logger stopped after {} records in {}",
        sink.records(),
        sink.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Fixed(Position);

    impl PositionSource for Fixed {
        fn position(&mut self) -> Option<Position> {
            Some(self.0)
        }
    }

    #[test]
    fn test_stamp_drops_invalid_position() {
        let sample = TelemetrySample::new(1_741_091_696_000);
        let record = stamp(sample.clone(), &mut Fixed(Position::new(0, 2_000_000_000)));
        assert_eq!(record.position, None);
        assert_eq!(record.timestamp.timestamp_millis(), 1_741_091_696_000);

        let record = stamp(sample, &mut Fixed(Position::new(515_000_000, 0)));
        assert_eq!(record.position.map(|p| p.latitude), Some(51.5));
    }

    #[tokio::test]
    async fn test_run_with_simulated_ecu() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.storage.root = dir.path().to_path_buf();
        config.adapter.simulate = true;
        config.sampler.period_ms = 10;

        let transport = open_transport(&config.adapter).unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let logger = tokio::spawn(run(config, transport, NoFix, stop_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        stop_tx.send(true).unwrap();
        logger.await.unwrap().unwrap();

        let day = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap();
        let file = std::fs::read_dir(day.path()).unwrap().next().unwrap().unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.lines().count() >= 2);
        for line in text.lines() {
            let record: LogRecord = serde_json::from_str(line).unwrap();
            assert!(record.sample.rpm.is_some());
            assert_eq!(record.position, None);
        }
    }
}
