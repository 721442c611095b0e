//! Human-readable formatting for terminal output.

use artifactdrop_protocol::ProgressSnapshot;

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "--".into();
    }
    let total = seconds.ceil() as u64;
    if total >= 60 {
        format!("{}m {:02}s", total / 60, total % 60)
    } else {
        format!("{total}s")
    }
}

/// One-line progress, e.g. `42% 1.2 MB/3.0 MB 512.0 KB/s ETA 4s`.
pub fn progress_line(p: &ProgressSnapshot) -> String {
    format!(
        "{:>3}% {}/{} {}/s ETA {}",
        p.percentage,
        format_size(p.loaded),
        format_size(p.total),
        format_size(p.speed.max(0.0) as u64),
        format_eta(p.estimated_time_remaining)
    )
}
