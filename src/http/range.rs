//! HTTP Range request parsing module
//!
//! Range header parsing for chunked downloads, compliant with RFC 7233.
//! Only a single interval is ever produced: when a client sends several
//! comma-separated specs, the first one is resolved and the rest are ignored.

use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// Inclusive byte interval, validated against the total size it was parsed for
///
/// Fields are private: the only way to obtain one is through
/// [`parse_range_header`] or [`parse_content_range`], both of which check
/// `start <= end < total_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteInterval {
    start: u64,
    end: u64,
}

impl ByteInterval {
    #[inline]
    pub const fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered, never zero
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a 206 response
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// Why a Range header could not be honored
///
/// Both variants surface as 416 with `Content-Range: bytes */{total}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range spec '{0}'")]
    Malformed(String),
    #[error("range '{spec}' not satisfiable for {total_size} bytes")]
    Unsatisfiable { spec: String, total_size: u64 },
}

/// Range header parse result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeParseResult {
    /// Valid single range
    Valid(ByteInterval),
    /// No Range header, or a unit other than bytes: serve the whole resource
    NotRequested,
    /// Bytes range that cannot be served - 416
    NotSatisfiable(RangeError),
}

impl RangeParseResult {
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Parse HTTP Range header (bytes unit, first spec only)
///
/// Supported formats:
/// - `bytes=start-end` - Specific range
/// - `bytes=start-` - From start to end
/// - `bytes=-suffix` - Last suffix bytes
///
/// Bounds at or past `total_size` are rejected, never clamped.
///
/// # Examples
/// ```
/// use hap_range_proxy::http::range::{parse_range_header, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=0-99"), 1000);
/// assert!(matches!(result, RangeParseResult::Valid(_)));
///
/// let result = parse_range_header(None, 1000);
/// assert!(matches!(result, RangeParseResult::NotRequested));
///
/// let result = parse_range_header(Some("bytes=2000-3000"), 1000);
/// assert!(matches!(result, RangeParseResult::NotSatisfiable(_)));
/// ```
pub fn parse_range_header(range_header: Option<&str>, total_size: u64) -> RangeParseResult {
    let Some(spec) = range_header.and_then(first_range_spec) else {
        return RangeParseResult::NotRequested;
    };

    match resolve_spec(spec, total_size) {
        Ok(interval) => RangeParseResult::Valid(interval),
        Err(e) => RangeParseResult::NotSatisfiable(e),
    }
}

/// Extract the first spec of a bytes Range header
///
/// Returns `None` when the header does not use the bytes unit. Empty list
/// elements (`bytes=, 0-9`) are skipped; an empty spec list yields `Some("")`
/// so that it is rejected as malformed.
pub fn first_range_spec(range_header: &str) -> Option<&str> {
    let specs = range_header.trim_start().strip_prefix(BYTES_UNIT)?;
    Some(
        specs
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(""),
    )
}

/// Range header carrying only the first spec, for forwarding to an origin
pub fn normalize_range_header(range_header: &str) -> Option<String> {
    first_range_spec(range_header).map(|spec| format!("{BYTES_UNIT}{spec}"))
}

fn resolve_spec(spec: &str, total_size: u64) -> Result<ByteInterval, RangeError> {
    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Err(RangeError::Malformed(spec.to_string()));
    };
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    let unsatisfiable = || RangeError::Unsatisfiable {
        spec: spec.to_string(),
        total_size,
    };

    // Suffix range: "-500" means last 500 bytes
    if start_str.is_empty() {
        let suffix = parse_bound(end_str).ok_or_else(|| RangeError::Malformed(spec.to_string()))?;
        if suffix == 0 || total_size == 0 {
            return Err(unsatisfiable());
        }
        return Ok(ByteInterval {
            start: total_size.saturating_sub(suffix),
            end: total_size - 1,
        });
    }

    let start = parse_bound(start_str).ok_or_else(|| RangeError::Malformed(spec.to_string()))?;

    // Open-ended range: "500-"
    if end_str.is_empty() {
        if start >= total_size {
            return Err(unsatisfiable());
        }
        return Ok(ByteInterval {
            start,
            end: total_size - 1,
        });
    }

    let end = parse_bound(end_str).ok_or_else(|| RangeError::Malformed(spec.to_string()))?;
    if start > end || end >= total_size || start >= total_size {
        return Err(unsatisfiable());
    }

    Ok(ByteInterval { start, end })
}

/// Parse a `Content-Range` value (`bytes start-end/total`) sent by an origin
///
/// Returns the interval and the total size, or `None` when the value is
/// malformed, uses an unknown total (`*`), or is inconsistent.
pub fn parse_content_range(value: &str) -> Option<(ByteInterval, u64)> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let total_size = parse_bound(total.trim())?;
    let (start, end) = range.trim().split_once('-')?;
    let (start, end) = (parse_bound(start)?, parse_bound(end)?);

    (start <= end && end < total_size).then_some((ByteInterval { start, end }, total_size))
}

/// Total size from an unsatisfied-range `Content-Range` (`bytes */total`)
pub fn parse_unsatisfied_content_range(value: &str) -> Option<u64> {
    let total = value.trim().strip_prefix("bytes */")?;
    parse_bound(total.trim())
}

/// Digits only: rejects signs, whitespace and empty strings that `u64::from_str` would not
fn parse_bound(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn valid(header: &str, total: u64) -> ByteInterval {
        match parse_range_header(Some(header), total) {
            RangeParseResult::Valid(r) => r,
            other => panic!("Expected Valid for {header}/{total}, got {other:?}"),
        }
    }

    fn rejected(header: &str, total: u64) -> RangeError {
        match parse_range_header(Some(header), total) {
            RangeParseResult::NotSatisfiable(e) => e,
            other => panic!("Expected rejection for {header}/{total}, got {other:?}"),
        }
    }

    #[test]
    fn test_no_range() {
        assert_eq!(parse_range_header(None, 100), RangeParseResult::NotRequested);
        assert_eq!(
            parse_range_header(Some("items=0-5"), 100),
            RangeParseResult::NotRequested
        );
    }

    #[test]
    fn test_standard_range() {
        let r = valid("bytes=0-9", 100);
        assert_eq!((r.start(), r.end()), (0, 9));
        assert_eq!(r.len(), 10);
        assert_eq!(r.content_range(100), "bytes 0-9/100");
    }

    #[test]
    fn test_open_range() {
        let r = valid("bytes=50-", 100);
        assert_eq!((r.start(), r.end()), (50, 99));
        assert_eq!(r.len(), 50);
    }

    #[test]
    fn test_suffix_range() {
        let r = valid("bytes=-20", 100);
        assert_eq!((r.start(), r.end()), (80, 99));

        // Suffix longer than the resource selects all of it
        let r = valid("bytes=-500", 100);
        assert_eq!((r.start(), r.end()), (0, 99));
    }

    #[test]
    fn test_scenarios_on_thousand_bytes() {
        assert_eq!(valid("bytes=0-499", 1000).content_range(1000), "bytes 0-499/1000");
        assert_eq!(valid("bytes=-100", 1000).content_range(1000), "bytes 900-999/1000");
        assert!(matches!(
            rejected("bytes=2000-3000", 1000),
            RangeError::Unsatisfiable { total_size: 1000, .. }
        ));
    }

    #[test]
    fn test_not_satisfiable() {
        rejected("bytes=200-", 100);
        rejected("bytes=100-100", 100);
        rejected("bytes=9-3", 100);
        rejected("bytes=-0", 100);
        // End past the resource is rejected, not clamped
        rejected("bytes=0-100", 100);
    }

    #[test]
    fn test_empty_resource() {
        rejected("bytes=0-0", 0);
        rejected("bytes=0-", 0);
        rejected("bytes=-1", 0);
        assert_eq!(parse_range_header(None, 0), RangeParseResult::NotRequested);
    }

    #[test]
    fn test_malformed() {
        for header in [
            "bytes=",
            "bytes=a-b",
            "bytes=-",
            "bytes=5",
            "bytes=+5-9",
            "bytes=-5-10",
            "bytes=1-2-3",
            "bytes=0x10-20",
        ] {
            assert!(
                matches!(rejected(header, 100), RangeError::Malformed(_)),
                "{header} should be malformed"
            );
        }
    }

    #[test]
    fn test_first_spec_only() {
        let r = valid("bytes=0-9,20-29", 100);
        assert_eq!((r.start(), r.end()), (0, 9));

        let r = valid("bytes= , 10-19, 0-1", 100);
        assert_eq!((r.start(), r.end()), (10, 19));

        // A bad first spec is not rescued by a later good one
        rejected("bytes=500-600,0-9", 100);
    }

    #[test]
    fn test_whitespace_tolerated() {
        let r = valid("bytes= 10 - 19 ", 100);
        assert_eq!((r.start(), r.end()), (10, 19));
    }

    #[test]
    fn test_normalize_range_header() {
        assert_eq!(
            normalize_range_header("bytes=0-9, 20-29").as_deref(),
            Some("bytes=0-9")
        );
        assert_eq!(normalize_range_header("items=1-2"), None);
    }

    #[test]
    fn test_parse_content_range() {
        let (r, total) = parse_content_range("bytes 200-1023/146515").unwrap();
        assert_eq!((r.start(), r.end(), total), (200, 1023, 146_515));
        assert!(parse_content_range("bytes 200-1023/*").is_none());
        assert!(parse_content_range("bytes 10-5/100").is_none());
        assert!(parse_content_range("bytes 0-100/100").is_none());
        assert!(parse_content_range("invalid").is_none());
        assert_eq!(parse_unsatisfied_content_range("bytes */1000"), Some(1000));
        assert_eq!(parse_unsatisfied_content_range("bytes 0-1/2"), None);
    }

    #[quickcheck]
    fn prop_closed_range_roundtrips(total: u32, a: u32, b: u32) -> TestResult {
        let total = u64::from(total);
        if total == 0 {
            return TestResult::discard();
        }
        let (start, end) = {
            let (x, y) = (u64::from(a) % total, u64::from(b) % total);
            (x.min(y), x.max(y))
        };
        let r = valid(&format!("bytes={start}-{end}"), total);
        TestResult::from_bool(r.start() == start && r.end() == end && r.len() == end - start + 1)
    }

    #[quickcheck]
    fn prop_suffix_range(total: u32, n: u32) -> TestResult {
        if total == 0 || n == 0 {
            return TestResult::discard();
        }
        let (total, n) = (u64::from(total), u64::from(n));
        let r = valid(&format!("bytes=-{n}"), total);
        TestResult::from_bool(r.start() == total.saturating_sub(n) && r.end() == total - 1)
    }

    #[quickcheck]
    fn prop_open_range(total: u32, start: u32) -> TestResult {
        let (total, start) = (u64::from(total), u64::from(start));
        if start >= total {
            return TestResult::discard();
        }
        let r = valid(&format!("bytes={start}-"), total);
        TestResult::from_bool(r.start() == start && r.end() == total - 1)
    }

    #[quickcheck]
    fn prop_out_of_bounds_rejected(total: u32, start: u32, end: u32) -> TestResult {
        let (total, start, end) = (u64::from(total), u64::from(start), u64::from(end));
        if start <= end && end < total {
            return TestResult::discard();
        }
        let result = parse_range_header(Some(&format!("bytes={start}-{end}")), total);
        TestResult::from_bool(matches!(result, RangeParseResult::NotSatisfiable(_)))
    }

    #[quickcheck]
    fn prop_parse_is_deterministic(header: String, total: u64) -> bool {
        parse_range_header(Some(&header), total) == parse_range_header(Some(&header), total)
    }
}
