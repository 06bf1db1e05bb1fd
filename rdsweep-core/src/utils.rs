//! Utility functions for formatting and file operations.
//!
//! General-purpose helpers used by the orchestrator and the CLI: duration
//! and byte formatting, base-name extraction and bitrate arithmetic.

use crate::error::{CoreError, CoreResult};

use std::path::Path;

/// Formats seconds as HH:MM:SS (e.g., 3725.0 -> "01:02:05"). Returns "??:??:??" for invalid inputs.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return "??:??:??".to_string();
    }

    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Formats bytes with appropriate binary units (B, KiB, MiB, GiB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let bytes_f64 = bytes as f64;
    if bytes_f64 >= GIB {
        format!("{:.2} GiB", bytes_f64 / GIB)
    } else if bytes_f64 >= MIB {
        format!("{:.2} MiB", bytes_f64 / MIB)
    } else if bytes_f64 >= KIB {
        format!("{:.2} KiB", bytes_f64 / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Extracts the file name of `path` as the base for artifact names.
pub fn base_name(path: &Path) -> CoreResult<String> {
    Ok(path
        .file_name()
        .ok_or_else(|| CoreError::PathError(format!("Failed to get filename for {}", path.display())))?
        .to_string_lossy()
        .to_string())
}

/// Average bitrate in kbps of `size_bytes` spread over `duration_secs`.
#[must_use]
pub fn bitrate_kbps(size_bytes: u64, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return 0.0;
    }
    8.0 * size_bytes as f64 / duration_secs / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3725.0), "01:02:05");
        assert_eq!(format_duration(-1.0), "??:??:??");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MiB");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/media/in/clip.mp4")).unwrap(), "clip.mp4");
        assert!(base_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_bitrate_kbps() {
        assert!((bitrate_kbps(700_000, 10.0) - 560.0).abs() < 1e-9);
        assert_eq!(bitrate_kbps(100, 0.0), 0.0);
    }
}
