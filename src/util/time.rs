//! Throughput and duration helpers
//!
//! Units here are binary: `MB` means 1024 * 1024 bytes throughout reports and
//! CSV columns.

use std::time::Duration;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Bytes per second over `elapsed`; zero when no time elapsed
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use filepulse::util::time::calculate_throughput;
///
/// let rate = calculate_throughput(30 * 1024 * 1024, Duration::from_secs(2));
/// assert_eq!(rate, 15.0 * 1024.0 * 1024.0);
/// assert_eq!(calculate_throughput(1024, Duration::ZERO), 0.0);
/// ```
pub fn calculate_throughput(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        bytes as f64 / seconds
    } else {
        0.0
    }
}

/// Convert a byte quantity (or rate) to MB
pub fn to_mb(bytes: f64) -> f64 {
    bytes / MB
}

/// Format a byte count with the largest fitting unit
///
/// ```
/// use filepulse::util::time::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(10 * 1024 * 1024), "10.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let value = bytes as f64;
    if value >= TB {
        format!("{:.2} TB", value / TB)
    } else if value >= GB {
        format!("{:.2} GB", value / GB)
    } else if value >= MB {
        format!("{:.2} MB", value / MB)
    } else if value >= KB {
        format!("{:.2} KB", value / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a transfer rate (B/s up to TB/s)
pub fn format_throughput(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= TB {
        format!("{:.2} TB/s", bytes_per_sec / TB)
    } else if bytes_per_sec >= GB {
        format!("{:.2} GB/s", bytes_per_sec / GB)
    } else if bytes_per_sec >= MB {
        format!("{:.2} MB/s", bytes_per_sec / MB)
    } else if bytes_per_sec >= KB {
        format!("{:.2} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.2} B/s", bytes_per_sec)
    }
}

/// Format a transfer time; sub-second values in ms, the rest in seconds
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_secs_f64() * 1000.0;
    if millis < 1.0 {
        format!("{}us", duration.as_micros())
    } else if millis < 1000.0 {
        format!("{:.2}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottleneck_throughput() {
        // 3 x 10MB, slowest worker took 2s
        let rate = calculate_throughput(30 * 1024 * 1024, Duration::from_secs(2));
        assert_eq!(to_mb(rate), 15.0);
    }

    #[test]
    fn test_zero_elapsed() {
        assert_eq!(calculate_throughput(100, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_throughput() {
        assert_eq!(format_throughput(500.0), "500.00 B/s");
        assert_eq!(format_throughput(1536.0), "1.50 KB/s");
        assert_eq!(format_throughput(15.0 * 1024.0 * 1024.0), "15.00 MB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(250)), "250us");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.500s");
    }
}
