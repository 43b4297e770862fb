use anyhow::{bail, Result};
use std::time::Duration;

/// Parse a duration string of the shape accepted by spec.md §6: a bare
/// integer (treated as seconds) or a humantime-style string with a trailing
/// unit (`"10s"`, `"500ms"`, ...).
pub fn parse_duration_secs(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("empty duration string");
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let secs: u64 = trimmed.parse()?;
        return Ok(Duration::from_secs(secs));
    }
    Ok(humantime::parse_duration(trimmed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_is_seconds() {
        assert_eq!(parse_duration_secs("10").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn trailing_s_suffix() {
        assert_eq!(parse_duration_secs("10s").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn other_humantime_units() {
        assert_eq!(
            parse_duration_secs("500ms").unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn empty_is_error() {
        assert!(parse_duration_secs("").is_err());
    }
}
