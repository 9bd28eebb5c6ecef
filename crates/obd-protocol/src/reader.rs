//! Parameter Reader
//!
//! One request/response exchange per call, bounded by a timeout. No
//! retries happen here: retry cadence belongs to the sampling loop.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ObdError;
use crate::pid::{answers, decode_frame, Pid, PidRequest, RawPayload};
use crate::reading::Reading;
use crate::transport::Transport;

/// ELM327 ready prompt terminating every response
pub const PROMPT: u8 = b'>';

/// Upper bound on buffered response bytes
const MAX_RESPONSE_LEN: usize = 512;

const READ_CHUNK: usize = 64;

/// Issues single requests over a [`Transport`] and resolves the replies
pub struct ParameterReader<T> {
    transport: T,
}

impl<T: Transport> ParameterReader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send `request` and collect bytes until the prompt or the deadline.
    ///
    /// Fails with `Timeout` only if nothing at all arrived; a partial reply
    /// is returned as is and rejected later by the decoder.
    pub async fn exchange(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, ObdError> {
        self.exchange_until(request, timeout, |_| true).await
    }

    /// Like [`exchange`](Self::exchange), but a prompt only ends the read
    /// once `answered` accepts everything up to it.
    ///
    /// A reply cut off by an earlier timeout can still be in flight; its
    /// tail and prompt are read past instead of ending this exchange.
    pub async fn exchange_until<F>(
        &mut self,
        request: &[u8],
        timeout: Duration,
        answered: F,
    ) -> Result<Vec<u8>, ObdError>
    where
        F: Fn(&[u8]) -> bool,
    {
        if !self.transport.is_open() {
            return Err(ObdError::LinkClosed);
        }
        self.transport.send(request).await?;

        let deadline = Instant::now() + timeout;
        let mut response = Vec::new();
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let n = self.transport.receive(&mut buf, remaining).await?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
            if response.len() >= MAX_RESPONSE_LEN {
                break;
            }
            if let Some(end) = response.iter().rposition(|&b| b == PROMPT) {
                if answered(&response[..=end]) {
                    break;
                }
                debug!(
                    "Skipping stale adapter output {:?}",
                    String::from_utf8_lossy(&response[..=end]).trim()
                );
            }
        }

        if response.is_empty() {
            return Err(ObdError::Timeout(timeout.as_millis() as u64));
        }
        Ok(response)
    }

    /// Read one parameter, keeping the failure cause
    pub async fn try_read_parameter(
        &mut self,
        pid: Pid,
        timeout: Duration,
    ) -> Result<RawPayload, ObdError> {
        let request = PidRequest::current(pid);
        let response = self
            .exchange_until(&request.encode(), timeout, |raw| answers(raw, pid))
            .await?;
        decode_frame(&response, pid)
    }

    /// Read one parameter; every transport or protocol failure is `Unavailable`
    pub async fn read_parameter(&mut self, pid: Pid, timeout: Duration) -> Reading<RawPayload> {
        match self.try_read_parameter(pid, timeout).await {
            Ok(payload) => Reading::Available(payload),
            Err(e) => {
                debug!("PID {:02X} unavailable: {}", pid.as_hex(), e);
                Reading::Unavailable
            }
        }
    }
}
