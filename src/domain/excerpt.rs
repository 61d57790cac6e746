//! Excerpt extraction on a configurable marker token.

use crate::util::bytes;

/// Split `content` on the first occurrence of `marker`.
///
/// Returns the bytes preceding the marker and whether the marker was found. When
/// the marker is absent the whole content is returned with `false`. Only the first
/// occurrence matters; anything after it, including further markers, is ignored.
pub fn excerpt_and_flag<'a>(content: &'a [u8], marker: &[u8]) -> (&'a [u8], bool) {
    match bytes::find(content, marker) {
        Some(index) => (&content[..index], true),
        None => (content, false),
    }
}

#[cfg(test)]
mod tests {
    use super::excerpt_and_flag;

    const MORE: &[u8] = b"[[more]]";

    #[test]
    fn missing_marker_returns_whole_content() {
        let (excerpt, truncated) = excerpt_and_flag(b"Just one paragraph.", MORE);
        assert_eq!(excerpt, b"Just one paragraph.");
        assert!(!truncated);
    }

    #[test]
    fn splits_on_first_marker() {
        let (excerpt, truncated) = excerpt_and_flag(b"Intro [[more]] Rest", MORE);
        assert_eq!(excerpt, b"Intro ");
        assert!(truncated);
    }

    #[test]
    fn second_marker_is_part_of_the_remainder() {
        let (excerpt, truncated) = excerpt_and_flag(b"a[[more]]b[[more]]c", MORE);
        assert_eq!(excerpt, b"a");
        assert!(truncated);
    }

    #[test]
    fn trailing_marker_still_counts_as_truncated() {
        let (excerpt, truncated) = excerpt_and_flag(b"Everything[[more]]", MORE);
        assert_eq!(excerpt, b"Everything");
        assert!(truncated);
    }

    #[test]
    fn leading_marker_yields_empty_excerpt() {
        let (excerpt, truncated) = excerpt_and_flag(b"[[more]]body", MORE);
        assert!(excerpt.is_empty());
        assert!(truncated);
    }

    #[test]
    fn operates_on_raw_bytes() {
        let content = [0xff, 0xfe, b'|', 0x00, 0x80];
        let (excerpt, truncated) = excerpt_and_flag(&content, b"|");
        assert_eq!(excerpt, &[0xff, 0xfe]);
        assert!(truncated);
    }
}
