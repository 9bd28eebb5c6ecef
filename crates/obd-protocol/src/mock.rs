//! Test doubles for the Transport Link.
//!
//! `MockTransport` replays scripted adapter output and records every frame
//! sent, so reader and client behaviour can be asserted without hardware.
//! `SimulatedEcu` behaves like an ELM327 in front of a running engine and
//! lets the logger run end to end on a bench.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::ObdError;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct MockState {
    /// Chunks returned by `receive` (FIFO order); an empty chunk is a timeout.
    replies: VecDeque<Vec<u8>>,
    /// All frames passed to `send`.
    sent: Vec<Vec<u8>>,
    closed: bool,
}

/// Mock transport with scripted replies and frame recording.
///
/// Clones share state, so a test can keep a handle after moving the
/// transport into a client.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a new open mock with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-loaded with reply chunks.
    pub fn with_replies<I, B>(replies: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mock = Self::new();
        for reply in replies {
            mock.queue_reply(reply);
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue an additional reply chunk.
    pub fn queue_reply(&self, reply: impl AsRef<[u8]>) {
        self.lock().replies.push_back(reply.as_ref().to_vec());
    }

    /// Queue a receive that times out with no bytes.
    pub fn queue_silence(&self) {
        self.lock().replies.push_back(Vec::new());
    }

    /// Copies of all frames that were sent.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Sent frames as text, for readable assertions.
    pub fn sent_commands(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .map(|f| String::from_utf8_lossy(f).trim_end().to_string())
            .collect()
    }

    /// Number of replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.lock().replies.len()
    }

    pub fn set_open(&self, open: bool) {
        self.lock().closed = !open;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ObdError::LinkClosed);
        }
        state.sent.push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, ObdError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ObdError::LinkClosed);
        }
        let Some(mut chunk) = state.replies.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            state.replies.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn is_open(&self) -> bool {
        !self.lock().closed
    }
}

/// Supported-PID bitmap advertised by the simulator: 01 04 05 0B 0C 0D 10 11
const SIMULATED_SUPPORTED: u32 = 0x9839_8000;

/// Simulated ELM327 adapter attached to an idling-to-cruising engine.
///
/// Answers AT commands with `OK` and Mode 01 requests with values derived
/// from a request counter, so runs are reproducible.
#[derive(Debug, Default)]
pub struct SimulatedEcu {
    pending: VecDeque<u8>,
    tick: u32,
}

impl SimulatedEcu {
    pub fn new() -> Self {
        Self::default()
    }

    fn respond(&mut self, command: &str) -> String {
        let command = command.trim().to_ascii_uppercase();
        if command == "ATZ" {
            return "ELM327 v1.5".to_string();
        }
        if command.starts_with("AT") {
            return "OK".to_string();
        }
        if command.len() != 4 || !command.starts_with("01") {
            return "?".to_string();
        }
        let Ok(pid) = u8::from_str_radix(&command[2..], 16) else {
            return "?".to_string();
        };

        self.tick = self.tick.wrapping_add(1);
        let t = self.tick;
        let data: Vec<u8> = match pid {
            0x00 => SIMULATED_SUPPORTED.to_be_bytes().to_vec(),
            // Engine load: 20-80%
            0x04 => vec![(51 + t.wrapping_mul(13) % 153) as u8],
            // Coolant: 80-89°C
            0x05 => vec![(120 + t % 10) as u8],
            // MAP: 30-99 kPa
            0x0B => vec![(30 + t % 70) as u8],
            // RPM: 800-3499
            0x0C => {
                let encoded = (800 + t.wrapping_mul(37) % 2700) * 4;
                vec![(encoded >> 8) as u8, (encoded & 0xFF) as u8]
            }
            // Speed: 0-119 km/h
            0x0D => vec![(t.wrapping_mul(7) % 120) as u8],
            // MAF: 5-50 g/s
            0x10 => {
                let maf = 500 + t.wrapping_mul(53) % 4500;
                vec![(maf >> 8) as u8, (maf & 0xFF) as u8]
            }
            // Throttle byte: 20-119
            0x11 => vec![(20 + t.wrapping_mul(11) % 100) as u8],
            _ => return "NO DATA".to_string(),
        };

        let mut line = format!("41 {pid:02X}");
        for byte in data {
            line.push_str(&format!(" {byte:02X}"));
        }
        line
    }
}

#[async_trait]
impl Transport for SimulatedEcu {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        let command = String::from_utf8_lossy(bytes);
        let reply = self.respond(&command);
        self.pending.clear();
        self.pending.extend(reply.bytes());
        self.pending.extend(b"\r\r>");
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, ObdError> {
        let n = self.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::{decode_frame, Pid};

    #[tokio::test]
    async fn test_records_sent_frames() {
        let mut mock = MockTransport::new();
        mock.send(b"010C\r").await.unwrap();

        assert_eq!(mock.sent(), vec![b"010C\r".to_vec()]);
        assert_eq!(mock.sent_commands(), vec!["010C".to_string()]);
    }

    #[tokio::test]
    async fn test_replies_in_order_and_split() {
        let mut mock = MockTransport::with_replies(["41 0C 1A F8\r>"]);
        let handle = mock.clone();
        let mut buf = [0u8; 4];

        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"41 0");
        assert_eq!(handle.pending_replies(), 1);
    }

    #[tokio::test]
    async fn test_silence_and_closed() {
        let mut mock = MockTransport::new();
        mock.queue_silence();
        let mut buf = [0u8; 16];
        assert_eq!(mock.receive(&mut buf, Duration::ZERO).await.unwrap(), 0);

        mock.set_open(false);
        assert!(!mock.is_open());
        assert_eq!(mock.send(b"ATZ\r").await, Err(ObdError::LinkClosed));
    }

    #[tokio::test]
    async fn test_simulator_answers_in_range() {
        let mut ecu = SimulatedEcu::new();
        let mut buf = [0u8; 64];

        ecu.send(b"010C\r").await.unwrap();
        let n = ecu.receive(&mut buf, Duration::ZERO).await.unwrap();
        let rpm = decode_frame(&buf[..n], Pid::Rpm).unwrap().rpm();
        assert!((800..3500).contains(&rpm));

        ecu.send(b"0100\r").await.unwrap();
        let n = ecu.receive(&mut buf, Duration::ZERO).await.unwrap();
        let supported = decode_frame(&buf[..n], Pid::SupportedPids)
            .unwrap()
            .supported_pids();
        for pid in [0x04, 0x05, 0x0B, 0x0C, 0x0D, 0x10, 0x11] {
            assert!(supported.contains(pid), "PID {pid:02X} not advertised");
        }
    }
}
