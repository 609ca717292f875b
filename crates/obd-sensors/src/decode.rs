//! Payload decode functions
//!
//! Every decoder takes the hex payload that follows the response mode and PID
//! bytes (e.g. `"1AF8"` for an RPM reply `41 0C 1A F8`) and never fails: a
//! payload that is too short or not hex decodes to [`SensorValue::Unparsed`].

use crate::value::{MonitorStatus, MonitorTest, SensorValue};

/// Continuous monitors reported in byte B of PID 01, bit order
const CONTINUOUS_MONITORS: [&str; 3] = ["Misfire", "Fuel System", "Components"];

/// Parse the `index`-th byte (two hex characters) of a payload
pub fn hex_byte(payload: &str, index: usize) -> Option<u8> {
    let start = index * 2;
    let pair = payload.get(start..start + 2)?;
    u8::from_str_radix(pair, 16).ok()
}

/// Parse the leading `count` bytes of a payload
pub fn hex_bytes(payload: &str, count: usize) -> Option<Vec<u8>> {
    (0..count).map(|i| hex_byte(payload, i)).collect()
}

/// Expand each hex digit into four '0'/'1' characters, most significant first
pub fn hex_to_bitstring(payload: &str) -> Option<String> {
    let mut bits = String::with_capacity(payload.len() * 4);
    for c in payload.chars() {
        let nibble = c.to_digit(16)?;
        bits.push_str(&format!("{nibble:04b}"));
    }
    Some(bits)
}

fn number(payload: &str, count: usize, formula: impl Fn(&[f64]) -> f64) -> SensorValue {
    match hex_bytes(payload, count) {
        Some(bytes) => {
            let bytes: Vec<f64> = bytes.into_iter().map(f64::from).collect();
            SensorValue::Number(formula(&bytes))
        }
        None => SensorValue::Unparsed(payload.to_string()),
    }
}

/// Supported-PID bitmap
pub fn bitmap(payload: &str) -> SensorValue {
    match hex_to_bitstring(payload) {
        Some(bits) => SensorValue::Bitmap(bits),
        None => SensorValue::Unparsed(payload.to_string()),
    }
}

/// Monitor status since DTCs cleared (PID 01)
pub fn monitor_status(payload: &str) -> SensorValue {
    let (a, b) = match (hex_byte(payload, 0), hex_byte(payload, 1)) {
        (Some(a), Some(b)) => (a, b),
        _ => return SensorValue::Unparsed(payload.to_string()),
    };

    // Byte B: bits 0-2 test available, bits 4-6 test incomplete
    let tests = CONTINUOUS_MONITORS
        .iter()
        .enumerate()
        .map(|(i, name)| MonitorTest {
            name: (*name).to_string(),
            available: b & (1 << i) != 0,
            complete: b & (1 << (i + 4)) == 0,
        })
        .collect();

    SensorValue::Monitor(MonitorStatus {
        mil: a & 0x80 != 0,
        stored_count: a & 0x7F,
        compression_ignition: b & 0x08 != 0,
        tests,
    })
}

/// Payload passed through as-is
pub fn raw(payload: &str) -> SensorValue {
    SensorValue::Raw(payload.to_string())
}

/// A * 100 / 255 (%)
pub fn percent_scale(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0] * 100.0 / 255.0)
}

/// A - 40 (°C)
pub fn temperature(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0] - 40.0)
}

/// (A - 128) * 100 / 128 (%)
pub fn fuel_trim_percent(payload: &str) -> SensorValue {
    number(payload, 1, |b| (b[0] - 128.0) * 100.0 / 128.0)
}

/// A * 3 (kPa)
pub fn fuel_pressure(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0] * 3.0)
}

/// A (kPa)
pub fn intake_pressure(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0])
}

/// ((A * 256) + B) / 4 (rpm)
pub fn rpm(payload: &str) -> SensorValue {
    number(payload, 2, |b| (b[0] * 256.0 + b[1]) / 4.0)
}

/// A (km/h)
pub fn speed(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0])
}

/// (A - 128) / 2 (degrees before TDC)
pub fn timing_advance(payload: &str) -> SensorValue {
    number(payload, 1, |b| (b[0] - 128.0) / 2.0)
}

/// ((A * 256) + B) / 100 (g/s)
pub fn maf(payload: &str) -> SensorValue {
    number(payload, 2, |b| (b[0] * 256.0 + b[1]) / 100.0)
}

/// A / 200 (V)
pub fn o2_voltage(payload: &str) -> SensorValue {
    number(payload, 1, |b| b[0] / 200.0)
}

/// ((A * 256) + B) seconds, reported in minutes
pub fn seconds_to_minutes(payload: &str) -> SensorValue {
    number(payload, 2, |b| (b[0] * 256.0 + b[1]) / 60.0)
}

/// (A * 256) + B (minutes)
pub fn minutes(payload: &str) -> SensorValue {
    number(payload, 2, |b| b[0] * 256.0 + b[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value(v: SensorValue) -> f64 {
        v.as_number().expect("numeric value")
    }

    #[test]
    fn test_rpm_decode() {
        // 1A 2B => ((0x1A * 256) + 0x2B) / 4 = 6699 / 4
        assert!((value(rpm("1A2B")) - 1674.75).abs() < 0.01);
    }

    #[test]
    fn test_coolant_temp_decode() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        assert!((value(temperature("73")) - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_fuel_trim_decode() {
        assert!((value(fuel_trim_percent("80")) - 0.0).abs() < 0.01);
        // 0x90 = 144, so trim = (144-128)*100/128 = 12.5%
        assert!((value(fuel_trim_percent("90")) - 12.5).abs() < 0.01);
    }

    #[test]
    fn test_timing_and_maf_decode() {
        assert!((value(timing_advance("8C")) - 6.0).abs() < 0.01);
        assert!((value(maf("01F4")) - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_short_payload_is_unparsed() {
        assert_eq!(rpm("1A"), SensorValue::Unparsed("1A".to_string()));
        assert_eq!(speed(""), SensorValue::Unparsed(String::new()));
        assert_eq!(speed("ZZ"), SensorValue::Unparsed("ZZ".to_string()));
    }

    #[test]
    fn test_bitmap_decode() {
        assert_eq!(
            bitmap("BE1FA813"),
            SensorValue::Bitmap("10111110000111111010100000010011".to_string())
        );
        assert!(matches!(bitmap("BEXX"), SensorValue::Unparsed(_)));
    }

    #[test]
    fn test_monitor_status_decode() {
        // A = 0x83: MIL on, 3 codes; B = 0x07: all three tests available and complete
        let status = match monitor_status("83076504") {
            SensorValue::Monitor(status) => status,
            other => panic!("unexpected value {other:?}"),
        };
        assert!(status.mil);
        assert_eq!(status.stored_count, 3);
        assert!(!status.compression_ignition);
        assert_eq!(status.tests.len(), 3);
        assert!(status.tests.iter().all(|t| t.available && t.complete));
    }

    #[test]
    fn test_monitor_status_incomplete_test() {
        // B = 0x15: misfire available + incomplete, components available
        let status = match monitor_status("0015") {
            SensorValue::Monitor(status) => status,
            other => panic!("unexpected value {other:?}"),
        };
        assert!(!status.mil);
        assert_eq!(status.stored_count, 0);
        assert_eq!(status.tests[0].status_text(), "Supported - Incompleted");
        assert_eq!(status.tests[1].status_text(), "Unsupported");
        assert_eq!(status.tests[2].status_text(), "Supported - Completed");
    }

    proptest! {
        #[test]
        fn bitstring_has_four_bits_per_digit(n in any::<u32>()) {
            let payload = format!("{n:08X}");
            let bits = hex_to_bitstring(&payload).unwrap();
            prop_assert_eq!(bits.len(), 32);
            prop_assert_eq!(u32::from_str_radix(&bits, 2).unwrap(), n);
        }
    }
}
