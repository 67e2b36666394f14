//! Download verification
//!
//! Compares a downloaded payload against the fixture it was uploaded from.
//! The default check only looks at a short prefix, which is enough to catch
//! swapped or garbage files without paying for a full compare on large
//! payloads. Full comparison is opt-in.

use serde::{Deserialize, Serialize};

/// Default number of leading bytes compared
pub const DEFAULT_PREFIX_LEN: usize = 10;

/// How much of a download is checked against the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Compare the first N bytes
    Prefix(usize),
    /// Compare length and every byte
    Full,
}

impl Default for VerifyMode {
    fn default() -> Self {
        VerifyMode::Prefix(DEFAULT_PREFIX_LEN)
    }
}

/// Verification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Content matches under the chosen mode
    Match,
    /// Content differs
    Mismatch {
        /// Offset of first mismatch (or of the shorter end on length mismatch)
        offset: usize,
        /// Byte in the source, if the source extends that far
        expected: Option<u8>,
        /// Byte in the download, if the download extends that far
        actual: Option<u8>,
    },
}

impl VerifyResult {
    pub fn is_match(&self) -> bool {
        matches!(self, VerifyResult::Match)
    }
}

/// Check `downloaded` against `source`
///
/// In prefix mode both sides are cut to at most `len` bytes before comparing,
/// so a download shorter than the prefix only matches a source of the same
/// short length.
pub fn verify(downloaded: &[u8], source: &[u8], mode: VerifyMode) -> VerifyResult {
    match mode {
        VerifyMode::Prefix(len) => {
            let d = &downloaded[..len.min(downloaded.len())];
            let s = &source[..len.min(source.len())];
            compare(d, s)
        }
        VerifyMode::Full => compare(downloaded, source),
    }
}

fn compare(actual: &[u8], expected: &[u8]) -> VerifyResult {
    if let Some(offset) = actual.iter().zip(expected).position(|(a, e)| a != e) {
        return VerifyResult::Mismatch {
            offset,
            expected: Some(expected[offset]),
            actual: Some(actual[offset]),
        };
    }
    if actual.len() != expected.len() {
        let offset = actual.len().min(expected.len());
        return VerifyResult::Mismatch {
            offset,
            expected: expected.get(offset).copied(),
            actual: actual.get(offset).copied(),
        };
    }
    VerifyResult::Match
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match_ignores_tail() {
        let source = b"0123456789abcdef";
        let downloaded = b"0123456789XXXXXX";
        assert!(verify(downloaded, source, VerifyMode::Prefix(10)).is_match());
        assert!(!verify(downloaded, source, VerifyMode::Full).is_match());
    }

    #[test]
    fn test_prefix_mismatch() {
        let result = verify(b"01X3456789", b"0123456789", VerifyMode::default());
        assert_eq!(
            result,
            VerifyResult::Mismatch {
                offset: 2,
                expected: Some(b'2'),
                actual: Some(b'X'),
            }
        );
    }

    #[test]
    fn test_short_download() {
        let result = verify(b"0123", b"0123456789", VerifyMode::Prefix(10));
        assert_eq!(
            result,
            VerifyResult::Mismatch {
                offset: 4,
                expected: Some(b'4'),
                actual: None,
            }
        );
    }

    #[test]
    fn test_short_source_and_download() {
        assert!(verify(b"abc", b"abc", VerifyMode::Prefix(10)).is_match());
    }

    #[test]
    fn test_full_length_mismatch() {
        let result = verify(b"abcd", b"abc", VerifyMode::Full);
        assert_eq!(
            result,
            VerifyResult::Mismatch {
                offset: 3,
                expected: None,
                actual: Some(b'd'),
            }
        );
    }

    #[test]
    fn test_empty_both() {
        assert!(verify(b"", b"", VerifyMode::Full).is_match());
    }
}
