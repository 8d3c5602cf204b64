//! Parsers for human-readable sizes (`"5G"`) and intervals (`"1h30m"`).

use crate::error::{AlertError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Binary size suffixes; the position is the power of 1024.
const SIZE_SUFFIXES: &str = "KMGTPEZY";

static INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[1-9]\d*[smhd]\s*)+$").expect("interval regex"));

static INTERVAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([1-9]\d*)([smhd])").expect("interval part regex"));

/// Parses a size literal into bytes.
///
/// A trailing `K`, `M`, `G`, `T`, `P`, `E`, `Z` or `Y` (any case) multiplies
/// the numeric prefix by `1024^n`. Without a suffix the whole string must be
/// an integer. Values that do not fit in a `u64` are rejected.
///
/// # Examples
///
/// ```
/// use disku_alert::units::parse_size;
///
/// assert_eq!(parse_size("5G").unwrap(), 5 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert!(parse_size("5X").is_err());
/// ```
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let last = s.chars().last().ok_or_else(|| AlertError::parse("size", s))?;

    let rank = SIZE_SUFFIXES.find(last.to_ascii_uppercase());
    let (digits, rank) = match rank {
        Some(idx) => (&s[..s.len() - last.len_utf8()], idx as u32 + 1),
        None => (s, 0),
    };

    let value: u64 = digits.parse().map_err(|_| AlertError::parse("size", s))?;
    1024u64
        .checked_pow(rank)
        .and_then(|unit| value.checked_mul(unit))
        .ok_or_else(|| AlertError::parse("size", s))
}

/// Parses an interval into seconds.
///
/// A bare integer is taken as seconds. Otherwise the input must consist
/// entirely of `<n><unit>` pairs (`s`, `m`, `h`, `d`), optionally separated by
/// whitespace, which are summed.
///
/// # Examples
///
/// ```
/// use disku_alert::units::parse_interval;
///
/// assert_eq!(parse_interval("90").unwrap(), 90);
/// assert_eq!(parse_interval("1h30m").unwrap(), 5400);
/// assert_eq!(parse_interval("1d 12h").unwrap(), 129_600);
/// ```
pub fn parse_interval(s: &str) -> Result<u64> {
    if let Ok(secs) = s.trim().parse::<u64>() {
        return Ok(secs);
    }

    if !INTERVAL.is_match(s) {
        return Err(AlertError::parse("interval", s));
    }

    INTERVAL_PART.captures_iter(s).try_fold(0u64, |total, caps| {
        let unit_secs = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            _ => 60 * 60 * 24,
        };
        caps[1]
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(unit_secs))
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| AlertError::parse("interval", s))
    })
}
