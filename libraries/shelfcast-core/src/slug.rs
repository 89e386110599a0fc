//! Stable identifiers derived from author and title strings.

/// Derive a URL-safe book id from a display string.
///
/// Lowercases, collapses every run of non-alphanumeric characters into a
/// single hyphen, and trims leading/trailing hyphens. Idempotent: applying
/// it to its own output returns the same string.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Render a millisecond timestamp as lowercase base-36.
///
/// Used to build cache file names (`cover-<slug>-<mtime36>.jpg`,
/// `<slug>-<mtime36>.mp3`) that change whenever the source file does.
pub fn base36_ms(ms: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = ms.unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(slugify("Ursula K. Le Guin-The Dispossessed"), "ursula-k-le-guin-the-dispossessed");
        assert_eq!(slugify("  A   B  "), "a-b");
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn trims_edge_hyphens() {
        assert_eq!(slugify("---abc---"), "abc");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn idempotent() {
        for input in ["Author-Title", "a b c", "déjà vu", "01. Intro"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn non_ascii_is_treated_as_separator() {
        assert_eq!(slugify("déjà vu"), "d-j-vu");
    }

    #[test]
    fn base36_round_digits() {
        assert_eq!(base36_ms(0), "0");
        assert_eq!(base36_ms(35), "z");
        assert_eq!(base36_ms(36), "10");
        assert_eq!(base36_ms(1_700_000_000_000), base36_ms(1_700_000_000_000));
    }
}
