use crate::{DusqlError, Result};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format bytes into human-readable string
pub fn format_size(bytes: u64) -> String {
    if bytes >= TB {
        format!("{:.1} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Calculate percentage of size relative to total
pub fn size_percentage(size: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (size as f64 / total as f64) * 100.0
    }
}

/// Parse a human size such as `16m`, `1GB` or `2KiB` into bytes
///
/// Suffixes k, m, g and t are powers of 1024; a trailing `b` or `ib` is
/// accepted. The sign is kept, so `-1g` parses to minus one gibibyte.
pub fn parse_size(arg: &str) -> Result<f64> {
    let invalid = || DusqlError::InvalidUnit {
        kind: "size",
        value: arg.to_string(),
    };

    let lower = arg.trim().to_ascii_lowercase();
    let mut rest = lower.as_str();
    if let Some(stripped) = rest.strip_suffix("ib") {
        rest = stripped;
    } else if let Some(stripped) = rest.strip_suffix('b') {
        rest = stripped;
    }

    let (number, scale) = match rest.as_bytes().last() {
        Some(b't') => (&rest[..rest.len() - 1], TB),
        Some(b'g') => (&rest[..rest.len() - 1], GB),
        Some(b'm') => (&rest[..rest.len() - 1], MB),
        Some(b'k') => (&rest[..rest.len() - 1], KB),
        _ => (rest, 1),
    };

    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(value * scale as f64)
}

/// Format a number with thousand separators (e.g., 1,234,567)
pub fn format_count(n: u64) -> String {
    if n < 1000 {
        return n.to_string();
    }

    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}
