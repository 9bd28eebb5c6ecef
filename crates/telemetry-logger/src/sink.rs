//! JSON-lines log files
//!
//! One file per session at `<root>/<YYYY-MM-DD>/<HH-MM>.json`, one JSON
//! object per line, synced after every record so a pulled card loses at
//! most the sample in flight.

use chrono::{DateTime, Utc};
use obd_sampler::TelemetrySample;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::LoggerError;
use crate::position::PositionFix;

/// One line of the log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub position: Option<PositionFix>,
    #[serde(flatten)]
    pub sample: TelemetrySample,
}

/// Session file path for a logger started at `started`
pub fn session_path(root: &Path, started: DateTime<Utc>) -> PathBuf {
    root.join(started.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", started.format("%H-%M")))
}

/// Append-only writer for one session file
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
    records: u64,
}

impl JsonLinesSink {
    /// Create the dated folder if needed and open the session file for append
    pub async fn create(root: &Path, started: DateTime<Utc>) -> Result<Self, LoggerError> {
        let path = session_path(root, started);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!("Logging to {}", path.display());
        Ok(Self {
            path,
            file,
            records: 0,
        })
    }

    /// Append one record and sync it to storage
    pub async fn write(&mut self, record: &LogRecord) -> Result<(), LoggerError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.sync_data().await?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written this session
    pub fn records(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 34, 56).unwrap()
    }

    #[test]
    fn test_session_path_layout() {
        let path = session_path(Path::new("/sd"), started());
        assert_eq!(path, PathBuf::from("/sd/2025-03-04/12-34.json"));
    }

    #[tokio::test]
    async fn test_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::create(dir.path(), started()).await.unwrap();

        let mut sample = TelemetrySample::new(1);
        sample.rpm = Some(1726);
        let record = LogRecord {
            timestamp: started(),
            position: Some(PositionFix {
                latitude: 51.5,
                longitude: -0.12,
            }),
            sample,
        };
        sink.write(&record).await.unwrap();
        sink.write(&record).await.unwrap();
        assert_eq!(sink.records(), 2);

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["rpm"], 1726);
        assert_eq!(value["speed_kph"], serde_json::Value::Null);
        assert_eq!(value["position"]["latitude"], 51.5);

        let parsed: LogRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, record);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let record = LogRecord {
            timestamp: started(),
            position: None,
            sample: TelemetrySample::new(2),
        };

        for _ in 0..2 {
            let mut sink = JsonLinesSink::create(dir.path(), started()).await.unwrap();
            sink.write(&record).await.unwrap();
        }

        let text = std::fs::read_to_string(session_path(dir.path(), started())).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
