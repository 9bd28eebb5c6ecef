//! OBD-II Protocol Implementation
//!
//! Async client for ELM327-compatible OBD-II adapters. Requests one PID at
//! a time over a [`Transport`], validates the echoed mode/PID and payload
//! width, converts payloads into physical units and derives fuel economy.
//!
//! Transport and protocol failures are never raised to the caller: every
//! read resolves to a [`Reading`], either `Available(value)` or
//! `Unavailable`.

mod client;
mod economy;
mod error;
mod mock;
mod pid;
mod protocol;
mod reader;
mod reading;
mod transport;

pub use client::{ClientConfig, ClientState, ObdClient};
pub use economy::{
    calculate_average_mpg, calculate_instant_mpg, TripAccumulator, GASOLINE_DENSITY_LB_PER_GAL,
    GRAMS_PER_POUND, MILES_PER_KM, STOICHIOMETRIC_AFR,
};
pub use error::ObdError;
pub use mock::{MockTransport, SimulatedEcu};
pub use pid::{
    answers, decode, decode_frame, encode, maf_from_bytes, rpm_from_bytes, throttle_from_byte, Pid,
    PidRequest, RawPayload, SupportedPids,
};
pub use protocol::ObdProtocol;
pub use reader::{ParameterReader, PROMPT};
pub use reading::Reading;
pub use transport::{SerialTransport, Transport};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
}
