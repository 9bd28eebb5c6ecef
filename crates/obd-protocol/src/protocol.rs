//! OBD-II bus protocol selection

use serde::{Deserialize, Serialize};

/// Bus protocols an ELM327 can be told to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObdProtocol {
    /// Let the adapter search
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (5 baud init)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// ELM327 protocol number used by `ATSPn`
    pub fn elm_number(&self) -> u8 {
        match self {
            ObdProtocol::Auto => 0,
            ObdProtocol::J1850Pwm => 1,
            ObdProtocol::J1850Vpw => 2,
            ObdProtocol::Iso9141_2 => 3,
            ObdProtocol::Iso14230_4Kwp => 4,
            ObdProtocol::Iso14230_4KwpFast => 5,
            ObdProtocol::Iso15765_4Can11bit500 => 6,
            ObdProtocol::Iso15765_4Can29bit500 => 7,
            ObdProtocol::Iso15765_4Can11bit250 => 8,
            ObdProtocol::Iso15765_4Can29bit250 => 9,
        }
    }

    /// The `ATSPn` select command
    pub fn select_command(&self) -> String {
        format!("ATSP{}", self.elm_number())
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        (6..=9).contains(&self.elm_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_command() {
        assert_eq!(ObdProtocol::default().select_command(), "ATSP0");
        assert_eq!(ObdProtocol::Iso15765_4Can11bit500.select_command(), "ATSP6");
        assert!(ObdProtocol::Iso15765_4Can29bit250.is_can());
        assert!(!ObdProtocol::Iso9141_2.is_can());
    }
}
