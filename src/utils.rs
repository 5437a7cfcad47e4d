//! Shared utility functions.

/// Parse a memory size such as `128m`, `512k`, `2g` or `4096` into bytes.
///
/// Suffixes are case-insensitive and binary (`k` = 1024). Returns `None` for
/// empty, zero, non-numeric or overflowing input.
///
/// # Examples
///
/// ```
/// use minicluster::utils::parse_size;
///
/// assert_eq!(parse_size("128m"), Some(128 * 1024 * 1024));
/// assert_eq!(parse_size("4096"), Some(4096));
/// assert_eq!(parse_size("lots"), None);
/// ```
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1024),
        (i, 'm' | 'M') => (&value[..i], 1024 * 1024),
        (i, 'g' | 'G') => (&value[..i], 1024 * 1024 * 1024),
        _ => (value, 1),
    };

    let amount: u64 = digits.parse().ok()?;
    if amount == 0 {
        return None;
    }
    amount.checked_mul(multiplier)
}

/// Format bytes in human-readable form.
///
/// # Examples
///
/// ```
/// use minicluster::utils::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 bytes");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(128 * 1024 * 1024), "128.0 MB");
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes == 0 {
        "0 bytes".to_string()
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}
