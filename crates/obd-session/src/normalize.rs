//! Response Normalization
//!
//! Turns a raw adapter reply into the hex payload a sensor decoder expects:
//! first line only, whitespace removed, response mode and PID bytes stripped.

use tracing::warn;

/// Shortest reply that can carry a mode byte, a PID byte and data
pub const MIN_RESPONSE_LEN: usize = 7;

/// Characters occupied by the echoed response mode and PID
const HEADER_LEN: usize = 4;

/// Adapter marker for an unsupported or unavailable PID (spaces removed)
const NO_DATA: &str = "NODATA";

/// A normalized reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreted {
    /// The adapter reported no data for this request
    NoData,
    /// Hex payload following the header
    Payload(String),
}

/// First non-empty line of a reply
pub fn first_line(raw: &str) -> &str {
    raw.split(['\r', '\n'])
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

/// Reply line with all whitespace removed
pub fn compact(raw: &str) -> String {
    first_line(raw).split_whitespace().collect()
}

/// Whether the reply is the adapter's `NO DATA` marker
pub fn is_no_data(raw: &str) -> bool {
    compact(raw).starts_with(NO_DATA)
}

/// Strip the reply header and return the payload
///
/// Short replies are logged and still processed best-effort.
pub fn interpret_result(raw: &str) -> Interpreted {
    if raw.len() < MIN_RESPONSE_LEN {
        warn!(response = raw, "Malformed response: shorter than {MIN_RESPONSE_LEN} characters");
    }

    let code = compact(raw);
    if code.starts_with(NO_DATA) {
        return Interpreted::NoData;
    }

    Interpreted::Payload(code.chars().skip(HEADER_LEN).collect())
}
