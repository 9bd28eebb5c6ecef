//! OBD-II PID Definitions and Frame Codec
//!
//! Defines the Mode 01 Parameter IDs (PIDs) this client reads, the ELM327
//! request encoding, and the response decoder that validates echo fields
//! and payload width before any formula is applied.

use crate::error::ObdError;
use crate::mode;
use crate::reading::Reading;
use serde::{Deserialize, Serialize};

/// Offset added to the request mode in a positive response
pub const RESPONSE_MODE_OFFSET: u8 = 0x40;

/// Line terminator expected by ELM327 adapters
pub const REQUEST_TERMINATOR: u8 = b'\r';

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Supported PIDs 0x01-0x20 bitmap (0x00)
    SupportedPids = 0x00,
    /// Calculated engine load (0x04)
    EngineLoad = 0x04,
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Intake manifold absolute pressure (0x0B)
    IntakeManifoldPressure = 0x0B,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
}

impl Pid {
    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Get the number of payload bytes for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::SupportedPids => 4,
            Pid::Rpm | Pid::Maf => 2,
            _ => 1,
        }
    }

    /// Physical value of a payload, for PIDs that carry a scalar
    ///
    /// Returns `None` for the supported-PIDs bitmap.
    pub fn physical_value(&self, payload: &RawPayload) -> Option<f64> {
        let a = payload.a() as f64;
        match self {
            Pid::SupportedPids => None,
            // Engine Load: A * 100 / 255 (%)
            Pid::EngineLoad => Some(a * 100.0 / 255.0),
            // Coolant Temp: A - 40 (°C)
            Pid::CoolantTemp => Some(a - 40.0),
            // Intake manifold pressure: A (kPa)
            Pid::IntakeManifoldPressure => Some(a),
            Pid::Rpm => Some(payload.rpm() as f64),
            Pid::Speed => Some(payload.speed() as f64),
            Pid::Maf => Some(payload.maf() as f64),
            Pid::ThrottlePosition => Some(payload.throttle() as f64),
        }
    }
}

impl TryFrom<u8> for Pid {
    type Error = ObdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Pid::SupportedPids),
            0x04 => Ok(Pid::EngineLoad),
            0x05 => Ok(Pid::CoolantTemp),
            0x0B => Ok(Pid::IntakeManifoldPressure),
            0x0C => Ok(Pid::Rpm),
            0x0D => Ok(Pid::Speed),
            0x10 => Ok(Pid::Maf),
            0x11 => Ok(Pid::ThrottlePosition),
            other => Err(ObdError::AdapterError(format!("unknown PID {other:02X}"))),
        }
    }
}

/// A single Mode 01 request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRequest {
    mode: u8,
    pid: Pid,
}

impl PidRequest {
    /// Request for current data of the given PID
    pub fn current(pid: Pid) -> Self {
        Self {
            mode: mode::CURRENT_DATA,
            pid,
        }
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Mode byte a positive response must echo
    pub fn response_mode(&self) -> u8 {
        self.mode + RESPONSE_MODE_OFFSET
    }

    /// ASCII hex command without terminator, e.g. `010C`
    pub fn command(&self) -> String {
        format!("{:02X}{:02X}", self.mode, self.pid.as_hex())
    }

    /// Wire bytes: ASCII hex command plus `\r`
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.command().into_bytes();
        bytes.push(REQUEST_TERMINATOR);
        bytes
    }
}

/// Encode a current-data request for `pid`
pub fn encode(pid: Pid) -> Vec<u8> {
    PidRequest::current(pid).encode()
}

/// Payload bytes of a validated response, exactly as wide as the PID requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pid: Pid,
    bytes: Vec<u8>,
}

impl RawPayload {
    /// Build a payload, checking it is wide enough for `pid`.
    ///
    /// Extra trailing bytes are dropped.
    pub fn new(pid: Pid, bytes: &[u8]) -> Result<Self, ObdError> {
        let expected = pid.response_bytes();
        if bytes.len() < expected {
            return Err(ObdError::PayloadTooShort {
                pid: pid.as_hex(),
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            pid,
            bytes: bytes[..expected].to_vec(),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn a(&self) -> u8 {
        self.bytes[0]
    }

    fn b(&self) -> u8 {
        self.bytes.get(1).copied().unwrap_or(0)
    }

    /// RPM: ((A*256)+B)/4, truncated
    pub fn rpm(&self) -> u16 {
        rpm_from_bytes(self.a(), self.b())
    }

    /// Speed: A (km/h)
    pub fn speed(&self) -> u8 {
        self.a()
    }

    /// MAF: ((A*256)+B) / 100 (g/s)
    pub fn maf(&self) -> f32 {
        maf_from_bytes(self.a(), self.b())
    }

    /// Throttle: A * 100 / 255 (%), truncated
    pub fn throttle(&self) -> u8 {
        throttle_from_byte(self.a())
    }

    /// Supported PID bitmap (only meaningful for [`Pid::SupportedPids`])
    pub fn supported_pids(&self) -> SupportedPids {
        let mut word = [0u8; 4];
        let n = self.bytes.len().min(4);
        word[..n].copy_from_slice(&self.bytes[..n]);
        SupportedPids(u32::from_be_bytes(word))
    }
}

pub fn rpm_from_bytes(a: u8, b: u8) -> u16 {
    ((a as u32 * 256 + b as u32) / 4) as u16
}

pub fn maf_from_bytes(a: u8, b: u8) -> f32 {
    (a as u32 * 256 + b as u32) as f32 / 100.0
}

pub fn throttle_from_byte(a: u8) -> u8 {
    (a as u16 * 100 / 255) as u8
}

/// Bitmap of PIDs 0x01-0x20 answered by the ECU
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedPids(pub u32);

impl SupportedPids {
    /// Whether the ECU reports support for `pid` (0x01-0x20)
    pub fn contains(&self, pid: u8) -> bool {
        if !(0x01..=0x20).contains(&pid) {
            return false;
        }
        self.0 & (1u32 << (32 - pid as u32)) != 0
    }
}

/// Status lines ELM327 adapters print instead of data
const ADAPTER_STATUSES: &[&str] = &[
    "NODATA",
    "?",
    "UNABLETOCONNECT",
    "CANERROR",
    "BUSERROR",
    "BUSBUSY",
    "DATAERROR",
    "FBERROR",
    "STOPPED",
    "ERROR",
];

/// Decode a raw adapter response for `pid`, keeping the failure cause.
///
/// Accepts the text an ELM327 prints up to its `>` prompt: echoed commands,
/// `SEARCHING...` and blank lines are skipped, hex pairs may or may not be
/// space separated. The first line whose mode/PID echo matches the request
/// wins; lines for other PIDs are treated as stale.
pub fn decode_frame(raw: &[u8], pid: Pid) -> Result<RawPayload, ObdError> {
    let request = PidRequest::current(pid);
    let echo = request.command();
    let text = String::from_utf8_lossy(raw);

    let mut last_error = ObdError::MalformedHex(text.trim().to_string());

    for line in text.split(|c: char| c == '\r' || c == '\n' || c == '>') {
        let compact: String = line
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if compact.is_empty() || compact.starts_with("SEARCHING") || compact == echo {
            continue;
        }
        if compact.starts_with("BUSINIT") {
            if compact.contains("ERROR") {
                last_error = ObdError::AdapterError(line.trim().to_string());
            }
            continue;
        }
        if ADAPTER_STATUSES.iter().any(|s| compact == *s) {
            last_error = ObdError::AdapterError(line.trim().to_string());
            continue;
        }

        let bytes = match parse_hex(&compact) {
            Some(bytes) => bytes,
            None => {
                last_error = ObdError::MalformedHex(line.trim().to_string());
                continue;
            }
        };

        if bytes.len() < 2 {
            last_error = ObdError::PayloadTooShort {
                pid: pid.as_hex(),
                expected: pid.response_bytes(),
                actual: 0,
            };
            continue;
        }

        if bytes[0] != request.response_mode() || bytes[1] != pid.as_hex() {
            last_error = ObdError::EchoMismatch {
                expected_mode: request.response_mode(),
                expected_pid: pid.as_hex(),
                mode: bytes[0],
                pid: bytes[1],
            };
            continue;
        }

        match RawPayload::new(pid, &bytes[2..]) {
            Ok(payload) => return Ok(payload),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Whether `raw` holds the adapter's answer to a request for `pid`.
///
/// True once a line echoes the request's mode and PID or an adapter status
/// line appears. Output that only carries the tail of an earlier reply is
/// not an answer, even when it ends with a prompt.
pub fn answers(raw: &[u8], pid: Pid) -> bool {
    let request = PidRequest::current(pid);
    let text = String::from_utf8_lossy(raw);

    text.split(|c: char| c == '\r' || c == '\n' || c == '>')
        .map(|line| {
            line.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .any(|compact| {
            ADAPTER_STATUSES.iter().any(|s| compact == *s)
                || (compact.starts_with("BUSINIT") && compact.contains("ERROR"))
                || matches!(
                    parse_hex(&compact).as_deref(),
                    Some([mode, id, ..]) if *mode == request.response_mode() && *id == pid.as_hex()
                )
        })
}

/// Decode a raw adapter response, collapsing every failure to `Unavailable`
pub fn decode(raw: &[u8], pid: Pid) -> Reading<RawPayload> {
    decode_frame(raw, pid).ok().into()
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request() {
        assert_eq!(encode(Pid::Rpm), b"010C\r".to_vec());
        assert_eq!(encode(Pid::ThrottlePosition), b"0111\r".to_vec());
        assert_eq!(PidRequest::current(Pid::Speed).response_mode(), 0x41);
    }

    #[test]
    fn test_rpm_decode() {
        // 1A F8 => (26*256 + 248) / 4 = 6904/4 = 1726
        let payload = decode_frame(b"41 0C 1A F8\r\r>", Pid::Rpm).unwrap();
        assert_eq!(payload.rpm(), 1726);
    }

    #[test]
    fn test_rpm_truncates() {
        // 1A 2B => 6699/4 = 1674.75, truncated
        let payload = decode_frame(b"410C1A2B", Pid::Rpm).unwrap();
        assert_eq!(payload.rpm(), 1674);
    }

    #[test]
    fn test_throttle_decode() {
        // 0x80 = 128, so throttle = 12800 / 255 = 50
        let payload = decode_frame(b"41 11 80\r>", Pid::ThrottlePosition).unwrap();
        assert_eq!(payload.throttle(), 50);
    }

    #[test]
    fn test_speed_and_maf_decode() {
        let payload = decode_frame(b"41 0D 55", Pid::Speed).unwrap();
        assert_eq!(payload.speed(), 85);

        // 0x01F4 = 500, so MAF = 5.00 g/s
        let payload = decode_frame(b"41 10 01 F4", Pid::Maf).unwrap();
        assert!((payload.maf() - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_coolant_temp_physical_value() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        let payload = decode_frame(b"41 05 73", Pid::CoolantTemp).unwrap();
        let value = Pid::CoolantTemp.physical_value(&payload).unwrap();
        assert!((value - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_skips_echo_and_searching() {
        let raw = b"010C\rSEARCHING...\r41 0C 0F A0\r\r>";
        let payload = decode_frame(raw, Pid::Rpm).unwrap();
        assert_eq!(payload.rpm(), 1000);
    }

    #[test]
    fn test_stale_line_skipped_for_matching_one() {
        let raw = b"41 0D 20\r41 0C 0F A0\r>";
        let payload = decode_frame(raw, Pid::Rpm).unwrap();
        assert_eq!(payload.rpm(), 1000);
    }

    #[test]
    fn test_echo_mismatch() {
        let err = decode_frame(b"41 0D 20\r>", Pid::Rpm).unwrap_err();
        assert_eq!(
            err,
            ObdError::EchoMismatch {
                expected_mode: 0x41,
                expected_pid: 0x0C,
                mode: 0x41,
                pid: 0x0D,
            }
        );
    }

    #[test]
    fn test_payload_too_short() {
        let err = decode_frame(b"41 0C 1A\r>", Pid::Rpm).unwrap_err();
        assert!(matches!(
            err,
            ObdError::PayloadTooShort {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_and_status_lines() {
        assert!(matches!(
            decode_frame(b"41 0C 1G F8", Pid::Rpm),
            Err(ObdError::MalformedHex(_))
        ));
        assert!(matches!(
            decode_frame(b"NO DATA\r\r>", Pid::Rpm),
            Err(ObdError::AdapterError(_))
        ));
        assert!(matches!(
            decode_frame(b"", Pid::Rpm),
            Err(ObdError::MalformedHex(_))
        ));
        assert_eq!(decode(b"?\r>", Pid::Speed), Reading::Unavailable);
    }

    #[test]
    fn test_short_line_followed_by_full_one() {
        let payload = decode_frame(b"41 0C 1A\r41 0C 1A F8\r>", Pid::Rpm).unwrap();
        assert_eq!(payload.rpm(), 1726);
    }

    #[test]
    fn test_answers_request() {
        assert!(answers(b"41 0C 1A F8\r\r>", Pid::Rpm));
        assert!(answers(b"41 0C 1A", Pid::Rpm));
        assert!(answers(b"NO DATA\r\r>", Pid::Rpm));
        assert!(answers(b" 20\r\r>41 0C 1A F8\r\r>", Pid::Rpm));
        assert!(!answers(b" 20\r\r>", Pid::Rpm));
        assert!(!answers(b"41 0D 20\r\r>", Pid::Rpm));
        assert!(!answers(b"", Pid::Rpm));
    }

    #[test]
    fn test_extra_bytes_dropped() {
        let payload = decode_frame(b"41 0D 32 00 00", Pid::Speed).unwrap();
        assert_eq!(payload.bytes(), &[0x32]);
    }

    #[test]
    fn test_supported_pids_bitmap() {
        // BE 3E B8 11: typical petrol car
        let payload = decode_frame(b"41 00 BE 3E B8 11", Pid::SupportedPids).unwrap();
        let supported = payload.supported_pids();
        assert!(supported.contains(0x01));
        assert!(supported.contains(0x0C));
        assert!(supported.contains(0x0D));
        assert!(supported.contains(0x11));
        assert!(!supported.contains(0x02));
        assert!(!supported.contains(0x00));
    }

    #[test]
    fn test_pid_try_from() {
        assert_eq!(Pid::try_from(0x10).unwrap(), Pid::Maf);
        assert!(Pid::try_from(0x42).is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// RPM is exact integer division of the 16-bit word by 4.
        #[test]
        fn prop_rpm_formula(a in any::<u8>(), b in any::<u8>()) {
            let raw = format!("41 0C {a:02X} {b:02X}\r>");
            let payload = decode_frame(raw.as_bytes(), Pid::Rpm).unwrap();
            prop_assert_eq!(payload.rpm() as u32, (256 * a as u32 + b as u32) / 4);
        }

        /// Throttle is truncated and always within [0, 100].
        #[test]
        fn prop_throttle_formula(a in any::<u8>()) {
            let raw = format!("41 11 {a:02X}\r>");
            let payload = decode_frame(raw.as_bytes(), Pid::ThrottlePosition).unwrap();
            prop_assert_eq!(payload.throttle() as u32, 100 * a as u32 / 255);
            prop_assert!(payload.throttle() <= 100);
        }

        /// Arbitrary adapter output never panics the decoder.
        #[test]
        fn prop_arbitrary_bytes_no_panic(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&data, Pid::Maf);
        }
    }
}
