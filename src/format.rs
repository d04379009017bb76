use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const NSEC_PER_SEC: u64 = 1_000_000_000;

pub fn truncate_unicode(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            result.push('\u{2026}');
            break;
        }
        result.push(ch);
        width += ch_width;
    }
    result
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Wall-clock time of day (UTC) of a nanosecond epoch timestamp, as
/// `HH:MM:SS.nnnnnnnnn`.
pub fn format_clock(timestamp_ns: u64) -> String {
    let secs = timestamp_ns / NSEC_PER_SEC;
    let nanos = timestamp_ns % NSEC_PER_SEC;
    let of_day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}.{:09}",
        of_day / 3600,
        (of_day / 60) % 60,
        of_day % 60,
        nanos
    )
}

/// Compact duration for the header, e.g. `1.00s`, `250ms`, `12us`.
pub fn format_duration_ns(ns: u64) -> String {
    if ns >= NSEC_PER_SEC {
        format!("{:.2}s", ns as f64 / NSEC_PER_SEC as f64)
    } else if ns >= 1_000_000 {
        format!("{}ms", ns / 1_000_000)
    } else if ns >= 1_000 {
        format!("{}us", ns / 1_000)
    } else {
        format!("{ns}ns")
    }
}

/// Share of `window_ns` spent in `busy_ns`, as a percentage.
pub fn percent_of(busy_ns: u64, window_ns: u64) -> f64 {
    if window_ns == 0 {
        return 0.0;
    }
    (busy_ns as f64 / window_ns as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate_unicode("postgres", 20), "postgres");
        assert_eq!(truncate_unicode("postgres", 5), "post\u{2026}");
    }

    #[test]
    fn bytes_scale() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(4096), "4 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(format_clock(0), "00:00:00.000000000");
        assert_eq!(format_clock(86_400 * NSEC_PER_SEC + 3_723_000_000_042), "01:02:03.000000042");
    }

    #[test]
    fn durations_pick_a_unit() {
        assert_eq!(format_duration_ns(1_000_000_000), "1.00s");
        assert_eq!(format_duration_ns(250_000_000), "250ms");
        assert_eq!(format_duration_ns(12_345), "12us");
        assert_eq!(format_duration_ns(7), "7ns");
    }

    #[test]
    fn percent_is_capped() {
        assert_eq!(percent_of(0, 0), 0.0);
        assert_eq!(percent_of(500, 1_000), 50.0);
        assert_eq!(percent_of(2_000, 1_000), 100.0);
    }
}
