//! Logging utilities for raw serial traffic so byte dumps stay bounded and
//! single-line.

/// Hex-encode up to `max` leading bytes of a buffer for log output.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    use std::cmp::min;
    data.iter()
        .take(min(max, data.len()))
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}
