//! Diagnostic Trouble Code Codec
//!
//! A trouble code travels as two bytes:
//!
//! ```text
//! bits 15-14  class        P / C / B / U
//! bits 13-12  first digit  0-3
//! bits 11-0   three hex digits
//! ```
//!
//! Mode 03 and Mode 07 replies carry up to three codes per frame after the
//! response mode byte; unused slots are zero.

use crate::normalize::compact;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Codes carried by one response frame
pub const CODES_PER_FRAME: usize = 3;

/// Hex characters of the response mode byte leading each frame
const FRAME_HEADER_LEN: usize = 2;

/// Hex characters per code
const CODE_LEN: usize = 4;

/// System a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtcClass {
    /// Powertrain
    P,
    /// Chassis
    C,
    /// Body
    B,
    /// Network
    U,
}

impl DtcClass {
    const TABLE: [DtcClass; 4] = [DtcClass::P, DtcClass::C, DtcClass::B, DtcClass::U];

    pub fn letter(&self) -> char {
        match self {
            DtcClass::P => 'P',
            DtcClass::C => 'C',
            DtcClass::B => 'B',
            DtcClass::U => 'U',
        }
    }
}

/// Whether a code was read as stored (Mode 03) or pending/freeze (Mode 07)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtcStatus {
    Active,
    Passive,
}

impl fmt::Display for DtcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DtcStatus::Active => f.write_str("Active"),
            DtcStatus::Passive => f.write_str("Passive"),
        }
    }
}

/// A decoded trouble code, e.g. `P0133`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticCode {
    pub class: DtcClass,
    /// First digit is 0-3, the rest are hex nibbles
    pub digits: [u8; 4],
}

impl DiagnosticCode {
    /// Decode a packed 16-bit code
    pub fn decode(val: u16) -> Self {
        Self {
            class: DtcClass::TABLE[((val & 0xC000) >> 14) as usize],
            digits: [
                ((val & 0x3000) >> 12) as u8,
                ((val & 0x0F00) >> 8) as u8,
                ((val & 0x00F0) >> 4) as u8,
                (val & 0x000F) as u8,
            ],
        }
    }

    /// Decode from the two bytes as they appear on the wire
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self::decode(u16::from_be_bytes([high, low]))
    }

    /// Identifier string, e.g. `"P0133"`
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [d1, d2, d3, d4] = self.digits;
        write!(f, "{}{d1}{d2:X}{d3:X}{d4:X}", self.class.letter())
    }
}

/// A code together with the mode it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TroubleCode {
    pub status: DtcStatus,
    pub code: DiagnosticCode,
}

impl fmt::Display for TroubleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.code)
    }
}

/// Codes extracted from one Mode 03/07 frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCodes {
    pub codes: Vec<DiagnosticCode>,
    /// A zero slot was reached; no further codes follow
    pub padded: bool,
}

/// Extract up to three codes from a raw Mode 03/07 reply
///
/// Extraction stops at the first zero (padding) slot. A slot that is missing
/// or not hex ends the frame as well.
pub fn codes_from_frame(raw: &str) -> FrameCodes {
    let frame = compact(raw);
    let mut result = FrameCodes::default();

    for slot in 0..CODES_PER_FRAME {
        let start = FRAME_HEADER_LEN + slot * CODE_LEN;
        let val = match frame
            .get(start..start + CODE_LEN)
            .and_then(|hex| u16::from_str_radix(hex, 16).ok())
        {
            Some(val) => val,
            None => {
                warn!(frame = %frame, slot, "Trouble code frame truncated");
                result.padded = true;
                break;
            }
        };

        if val == 0 {
            result.padded = true;
            break;
        }
        result.codes.push(DiagnosticCode::decode(val));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_p0133() {
        let code = DiagnosticCode::from_bytes(0x01, 0x33);
        assert_eq!(code.class, DtcClass::P);
        assert_eq!(code.code(), "P0133");
    }

    #[test]
    fn test_decode_all_classes() {
        assert_eq!(DiagnosticCode::decode(0x0300).code(), "P0300");
        assert_eq!(DiagnosticCode::decode(0x4123).code(), "C0123");
        assert_eq!(DiagnosticCode::decode(0x9234).code(), "B1234");
        assert_eq!(DiagnosticCode::decode(0xC001).code(), "U0001");
        assert_eq!(DiagnosticCode::decode(0xFFFF).code(), "U3FFF");
    }

    #[test]
    fn test_hex_digits_are_uppercase() {
        assert_eq!(DiagnosticCode::decode(0x0ABC).code(), "P0ABC");
    }

    #[test]
    fn test_frame_with_padding() {
        let frame = codes_from_frame("43 01 33 00 00 00 00");
        assert_eq!(frame.codes, vec![DiagnosticCode::decode(0x0133)]);
        assert!(frame.padded);
    }

    #[test]
    fn test_full_frame() {
        let frame = codes_from_frame("43 01 33 03 00 41 23");
        let codes: Vec<String> = frame.codes.iter().map(DiagnosticCode::code).collect();
        assert_eq!(codes, ["P0133", "P0300", "C0123"]);
        assert!(!frame.padded);
    }

    #[test]
    fn test_compact_frame() {
        let frame = codes_from_frame("4701710000");
        assert_eq!(frame.codes.len(), 1);
        assert_eq!(frame.codes[0].code(), "P0171");
    }

    #[test]
    fn test_truncated_frame() {
        let frame = codes_from_frame("43 01 33 03");
        assert_eq!(frame.codes.len(), 1);
        assert!(frame.padded);
    }

    #[test]
    fn test_trouble_code_display() {
        let code = TroubleCode {
            status: DtcStatus::Passive,
            code: DiagnosticCode::decode(0x0171),
        };
        assert_eq!(code.to_string(), "[Passive] P0171");
    }

    proptest! {
        #[test]
        fn decoded_code_is_well_formed(val in any::<u16>()) {
            let code = DiagnosticCode::decode(val).code();
            prop_assert_eq!(code.len(), 5);

            let letter = code.chars().next().unwrap();
            prop_assert_eq!(letter, ['P', 'C', 'B', 'U'][(val >> 14) as usize]);
            prop_assert!(('0'..='3').contains(&code.chars().nth(1).unwrap()));
            prop_assert_eq!(u16::from_str_radix(&code[2..], 16).unwrap(), val & 0x0FFF);
        }
    }
}
