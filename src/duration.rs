//! Human-readable durations for command-line flags.

use std::time::Duration;

/// Parse a duration such as `10s`, `1m`, `500ms` or `2h`.
///
/// A bare number is taken as seconds.
///
/// # Examples
/// ```
/// use switchbot_listener::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    // "ms" must be tried before "m" and "s".
    let (number, unit, millis_per_unit) = if let Some(n) = src.strip_suffix("ms") {
        (n, "milliseconds", 1)
    } else if let Some(n) = src.strip_suffix('h') {
        (n, "hours", 3_600_000)
    } else if let Some(n) = src.strip_suffix('m') {
        (n, "minutes", 60_000)
    } else if let Some(n) = src.strip_suffix('s') {
        (n, "seconds", 1_000)
    } else {
        (src, "duration", 1_000)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid {unit}: {number}"))?;
    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("{unit} out of range: {number}"))
}
