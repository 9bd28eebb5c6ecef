//! OBD-II Client for ELM327 Adapters
//!
//! The surface the sampling loop talks to: `initialise`, the four typed
//! reads and the fuel economy calculations. Reads never fail loudly; each
//! returns a [`Reading`] that callers check before trusting the value.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::economy;
use crate::error::ObdError;
use crate::pid::{Pid, RawPayload, SupportedPids};
use crate::protocol::ObdProtocol;
use crate::reader::ParameterReader;
use crate::reading::Reading;
use crate::transport::Transport;

/// Default timeout for OBD commands
const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default timeout for handshake commands (ATZ is slow)
const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 2000;

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bus protocol selected during the handshake
    pub protocol: ObdProtocol,
    /// Per-read timeout (ms)
    pub timeout_ms: u64,
    /// Per-command timeout during the handshake (ms)
    pub handshake_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: ObdProtocol::Auto,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

/// Client lifecycle
///
/// A read in progress holds `&mut ObdClient`, so there is no observable
/// "reading" state and no way to overlap two requests on one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    /// No successful handshake yet; every read is `Unavailable`
    Uninitialised,
    /// Handshake done; reads go to the adapter
    Ready,
}

/// OBD-II client for communicating with ELM327-compatible adapters
pub struct ObdClient<T> {
    reader: ParameterReader<T>,
    config: ClientConfig,
    state: ClientState,
    supported: SupportedPids,
}

impl<T: Transport> ObdClient<T> {
    /// Create a client over `transport`; call [`initialise`](Self::initialise) before reading
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            reader: ParameterReader::new(transport),
            config,
            state: ClientState::Uninitialised,
            supported: SupportedPids::default(),
        }
    }

    /// Run the adapter handshake.
    ///
    /// Resets the adapter, turns off echo, linefeeds and headers, selects
    /// the configured protocol and checks the ECU answers `0100`. Once
    /// `Ready` on an open link, further calls return `true` without sending
    /// anything.
    pub async fn initialise(&mut self) -> bool {
        if !self.reader.transport().is_open() {
            warn!("Cannot initialise OBD client: transport link is closed");
            self.state = ClientState::Uninitialised;
            return false;
        }
        if self.state == ClientState::Ready {
            debug!("OBD client already initialised");
            return true;
        }

        info!("Initialising OBD adapter (protocol {:?})", self.config.protocol);
        match self.handshake().await {
            Ok(supported) => {
                self.supported = supported;
                self.state = ClientState::Ready;
                info!("OBD adapter initialised, supported PIDs {:08X}", supported.0);
                true
            }
            Err(e) => {
                warn!("OBD handshake failed: {}", e);
                false
            }
        }
    }

    async fn handshake(&mut self) -> Result<SupportedPids, ObdError> {
        let timeout = Duration::from_millis(self.config.handshake_timeout_ms);

        let reset = self.reader.exchange(b"ATZ\r", timeout).await?;
        debug!("ATZ -> {:?}", String::from_utf8_lossy(&reset).trim());

        let select = self.config.protocol.select_command();
        for command in ["ATE0", "ATL0", "ATH0", select.as_str()] {
            self.expect_ok(command, timeout).await?;
        }

        let payload = self
            .reader
            .try_read_parameter(Pid::SupportedPids, timeout)
            .await?;
        Ok(payload.supported_pids())
    }

    async fn expect_ok(&mut self, command: &str, timeout: Duration) -> Result<(), ObdError> {
        let mut frame = command.as_bytes().to_vec();
        frame.push(b'\r');
        let response = self.reader.exchange(&frame, timeout).await?;
        let text = String::from_utf8_lossy(&response);
        let last_line = text
            .split(|c: char| c == '\r' || c == '\n' || c == '>')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last();
        if last_line == Some("OK") {
            Ok(())
        } else {
            Err(ObdError::HandshakeFailed(format!(
                "{} -> {:?}",
                command,
                text.trim()
            )))
        }
    }

    /// Read one PID, keeping the failure cause
    pub async fn try_read(&mut self, pid: Pid) -> Result<RawPayload, ObdError> {
        if self.state != ClientState::Ready {
            return Err(ObdError::NotInitialised);
        }
        let timeout = Duration::from_millis(self.config.timeout_ms);
        self.reader.try_read_parameter(pid, timeout).await
    }

    async fn read(&mut self, pid: Pid) -> Reading<RawPayload> {
        match self.try_read(pid).await {
            Ok(payload) => Reading::Available(payload),
            Err(e) => {
                debug!("PID {:02X} unavailable: {}", pid.as_hex(), e);
                Reading::Unavailable
            }
        }
    }

    /// Engine speed (rev/min)
    pub async fn read_rpm(&mut self) -> Reading<u16> {
        self.read(Pid::Rpm).await.map(|p| p.rpm())
    }

    /// Vehicle speed (km/h)
    pub async fn read_speed(&mut self) -> Reading<u8> {
        self.read(Pid::Speed).await.map(|p| p.speed())
    }

    /// Mass air flow (g/s)
    pub async fn read_maf(&mut self) -> Reading<f32> {
        self.read(Pid::Maf).await.map(|p| p.maf())
    }

    /// Throttle position (%, 0-100)
    pub async fn read_throttle(&mut self) -> Reading<u8> {
        self.read(Pid::ThrottlePosition).await.map(|p| p.throttle())
    }

    /// Physical value of any scalar PID
    pub async fn read_value(&mut self, pid: Pid) -> Reading<f64> {
        self.read(pid)
            .await
            .and_then(|p| pid.physical_value(&p).into())
    }

    /// See [`economy::calculate_instant_mpg`]
    pub fn calculate_instant_mpg(&self, speed_kph: f32, maf_g_s: f32) -> f32 {
        economy::calculate_instant_mpg(speed_kph, maf_g_s)
    }

    /// See [`economy::calculate_average_mpg`]
    pub fn calculate_average_mpg(&self, distance_km: f32, fuel_g: f32) -> f32 {
        economy::calculate_average_mpg(distance_km, fuel_g)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ClientState::Ready && self.reader.transport().is_open()
    }

    /// PIDs 0x01-0x20 the ECU reported during the handshake
    pub fn supported_pids(&self) -> SupportedPids {
        self.supported
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set per-read timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout_ms = timeout.as_millis() as u64;
    }

    pub fn transport(&self) -> &T {
        self.reader.transport()
    }

    /// Forget the handshake; the next `initialise` runs it again
    pub fn disconnect(&mut self) {
        if self.state == ClientState::Ready {
            info!("Disconnecting OBD client");
            self.state = ClientState::Uninitialised;
        }
    }
}
