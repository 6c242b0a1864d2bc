//! Human readable sizes, speeds and durations for log lines and the progress line.

use std::time::Duration;

static SIZE_UNITS: [&str; 5] = ["bytes", "K", "M", "G", "T"];
static SPEED_UNITS: [&str; 5] = ["bytes/s", "K/s", "M/s", "G/s", "T/s"];

pub fn format_size(size: u64) -> String {
    format_number(size as f64, &SIZE_UNITS)
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    format_number(bytes_per_sec, &SPEED_UNITS)
}

/// Whole seconds only, e.g. `1h 2m 5s`.
pub fn format_eta(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

fn format_number(mut number: f64, units: &[&str]) -> String {
    let mut i = 0;
    while number >= 1024.0 && i < units.len() - 1 {
        number /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{:.0}{}", number, units[i])
    } else {
        format!("{:.1}{}", number, units[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0bytes");
        assert_eq!(format_size(1023), "1023bytes");
        assert_eq!(format_size(1024), "1.0K");
        assert_eq!(format_size(3 * 1024 * 1024 / 2), "1.5M");
        assert_eq!(format_size(40 * 1024 * 1024 * 1024), "40.0G");
    }

    #[test]
    fn test_format_size_caps_at_largest_unit() {
        assert_eq!(format_size(2048 * 1024 * 1024 * 1024 * 1024), "2048.0T");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(512.0), "512bytes/s");
        assert_eq!(format_speed(2.5 * 1024.0 * 1024.0), "2.5M/s");
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(3725.4), "1h 2m 5s");
        assert_eq!(format_eta(f64::INFINITY), "0s");
        assert_eq!(format_eta(-4.0), "0s");
    }
}
