//! HTTP byte-range parsing.
//!
//! Only `bytes=A-B` syntax is accepted. Anything malformed degrades to
//! serving the whole object; an explicit start at or past the end of the
//! object is unsatisfiable and reported as such.

/// Outcome of parsing a Range header against an object of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range; serve the whole object with 200.
    Full,
    /// Serve `[start, end]` inclusive with 206.
    Bounded { start: u64, end: u64 },
    /// Start lies beyond the object; answer 416.
    Unsatisfiable,
}

/// Parse an optional `Range` header value for an object of `size` bytes.
///
/// - `A-B`: bytes A through B inclusive; B clamps to `size - 1`
/// - `A-`: bytes A through end
/// - `-N`: the last N bytes; `-0` is malformed
/// - malformed unit, non-numeric values, or `A > B` fall back to `Full`
/// - `A >= size` is unsatisfiable
pub fn parse(header: Option<&str>, size: u64) -> RangeRequest {
    let Some(header) = header else {
        return RangeRequest::Full;
    };
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    let Some((start_str, end_str)) = ranges.split_once('-') else {
        return RangeRequest::Full;
    };
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    if start_str.is_empty() {
        // Suffix range: the last N bytes.
        let Ok(n) = end_str.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if n == 0 || size == 0 {
            return RangeRequest::Full;
        }
        return RangeRequest::Bounded {
            start: size.saturating_sub(n),
            end: size - 1,
        };
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return RangeRequest::Full;
    };
    if start >= size {
        return RangeRequest::Unsatisfiable;
    }

    let end = if end_str.is_empty() {
        size - 1
    } else {
        let Ok(end) = end_str.parse::<u64>() else {
            return RangeRequest::Full;
        };
        if start > end {
            return RangeRequest::Full;
        }
        end.min(size - 1)
    };

    RangeRequest::Bounded { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_range() {
        assert_eq!(
            parse(Some("bytes=0-999"), 10_000),
            RangeRequest::Bounded { start: 0, end: 999 }
        );
    }

    #[test]
    fn open_range_runs_to_end() {
        assert_eq!(
            parse(Some("bytes=1000-"), 10_000),
            RangeRequest::Bounded { start: 1000, end: 9_999 }
        );
    }

    #[test]
    fn suffix_range() {
        assert_eq!(
            parse(Some("bytes=-1000"), 1_000_000),
            RangeRequest::Bounded { start: 999_000, end: 999_999 }
        );
        // Suffix longer than the object covers it entirely.
        assert_eq!(
            parse(Some("bytes=-5000"), 1_000),
            RangeRequest::Bounded { start: 0, end: 999 }
        );
    }

    #[test]
    fn zero_length_suffix_is_malformed() {
        assert_eq!(parse(Some("bytes=-0"), 1_000), RangeRequest::Full);
    }

    #[test]
    fn end_clamps_to_size() {
        assert_eq!(
            parse(Some("bytes=10-99999"), 100),
            RangeRequest::Bounded { start: 10, end: 99 }
        );
    }

    #[test]
    fn start_past_end_is_unsatisfiable() {
        assert_eq!(parse(Some("bytes=100-"), 100), RangeRequest::Unsatisfiable);
        assert_eq!(parse(Some("bytes=500-600"), 100), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn last_byte_range_is_satisfiable() {
        assert_eq!(
            parse(Some("bytes=99-"), 100),
            RangeRequest::Bounded { start: 99, end: 99 }
        );
    }

    #[test]
    fn malformed_falls_back_to_full() {
        for header in [
            "bites=0-1",
            "bytes=a-b",
            "bytes=5",
            "bytes=-",
            "bytes=9-5",
            "bytes=-12x",
            "bytes=--5",
            "",
        ] {
            assert_eq!(parse(Some(header), 1_000), RangeRequest::Full, "{header}");
        }
        assert_eq!(parse(None, 1_000), RangeRequest::Full);
    }

    #[test]
    fn negative_values_are_malformed() {
        // "-5-10" splits as ("", "5-10"): a non-numeric suffix.
        assert_eq!(parse(Some("bytes=-5-10"), 1_000), RangeRequest::Full);
    }
}
