//! Pure formatting helpers shared by the widget renderer.

mod color;

pub use color::{color_for_percentage, hsl_for_percentage, Hsl};

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Units for base-1000 byte scaling
const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Operands above this are scaled down before dividing
const PERCENT_SCALE_THRESHOLD: f64 = 1e15;
const PERCENT_SCALE_DIVISOR: f64 = 1e10;

/// A scaled byte count ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSize {
    /// Formatted number ("1.50", "999")
    pub value: String,
    /// Unit label ("KB")
    pub unit: &'static str,
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Scale a byte count by 1000 until it drops below 1000 or units run out.
///
/// Whole bytes print without decimals, scaled values with two.
pub fn format_byte_size(bytes: f64) -> ByteSize {
    if bytes == 0.0 || !bytes.is_finite() {
        return ByteSize {
            value: "0".to_string(),
            unit: BYTE_UNITS[0],
        };
    }

    let mut value = bytes;
    let mut index = 0;
    while value.abs() >= 1000.0 && index < BYTE_UNITS.len() - 1 {
        value /= 1000.0;
        index += 1;
    }

    let value = if index == 0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    };
    ByteSize {
        value,
        unit: BYTE_UNITS[index],
    }
}

/// `used / total * 100` with two decimals.
///
/// The result is not clamped: over-quota usage yields values above 100.
/// Very large counters are scaled down first to keep the division precise.
pub fn compute_percentage(used: f64, total: f64) -> String {
    let (mut used, mut total) = (used, total);
    if used > PERCENT_SCALE_THRESHOLD || total > PERCENT_SCALE_THRESHOLD {
        used /= PERCENT_SCALE_DIVISOR;
        total /= PERCENT_SCALE_DIVISOR;
    }
    if total == 0.0 {
        return "0.00".to_string();
    }
    format!("{:.2}", used / total * 100.0)
}

/// Format a timestamp or date as `YYYY-MM-DD` in local time.
///
/// Returns an empty string when the input cannot be parsed, so a bad value
/// renders as a blank field instead of failing the whole widget.
pub fn format_date(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return dt.with_timezone(&Local).format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, pattern) {
            return dt.format("%Y-%m-%d").to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y/%m/%d") {
        return date.format("%Y-%m-%d").to_string();
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn size(value: &str, unit: &'static str) -> ByteSize {
        ByteSize {
            value: value.to_string(),
            unit,
        }
    }

    #[test]
    fn test_format_byte_size() {
        assert_eq!(format_byte_size(0.0), size("0", "B"));
        assert_eq!(format_byte_size(999.0), size("999", "B"));
        assert_eq!(format_byte_size(1500.0), size("1.50", "KB"));
        assert_eq!(format_byte_size(5_000_000_000.0), size("5.00", "GB"));
        assert_eq!(format_byte_size(1000.0), size("1.00", "KB"));
    }

    #[test]
    fn test_format_byte_size_stops_at_pb() {
        assert_eq!(format_byte_size(2e21), size("2000000.00", "PB"));
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(format_byte_size(1500.0).to_string(), "1.50 KB");
    }

    #[test]
    fn test_compute_percentage() {
        assert_eq!(compute_percentage(50.0, 200.0), "25.00");
        assert_eq!(compute_percentage(1.0, 3.0), "33.33");
        assert_eq!(compute_percentage(123.0, 0.0), "0.00");
        assert_eq!(compute_percentage(0.0, 0.0), "0.00");
    }

    #[test]
    fn test_compute_percentage_large_counters() {
        assert_eq!(compute_percentage(2e15, 1e16), "20.00");
        // Scaling applies when only one operand is large
        assert_eq!(compute_percentage(5e14, 2e15), "25.00");
    }

    #[test]
    fn test_compute_percentage_is_not_clamped() {
        assert_eq!(compute_percentage(300.0, 200.0), "150.00");
        assert_eq!(compute_percentage(-50.0, 200.0), "-25.00");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-01-01"), "2025-01-01");
        assert_eq!(format_date("2025-02-01 08:30:00"), "2025-02-01");
        assert_eq!(format_date("2025-02-01T12:00:00Z"), "2025-02-01");
        assert_eq!(format_date("2025/03/04"), "2025-03-04");
    }

    #[test]
    fn test_format_date_unparseable() {
        assert_eq!(format_date(""), "");
        assert_eq!(format_date("not a date"), "");
        assert_eq!(format_date("2025-13-40"), "");
    }
}
