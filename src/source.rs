//! Immutable source units and content fingerprints.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 digest of file content, used as the cache-invalidation key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint raw content bytes.
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse a lowercase or uppercase hex rendering.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps logs readable
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid fingerprint: {}", hex)))
    }
}

/// One file's decoded content plus identity. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    path: String,
    text: Arc<str>,
    language: &'static str,
    fingerprint: Fingerprint,
    /// Byte offset of the start of each line.
    line_starts: Arc<[usize]>,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, text: impl Into<Arc<str>>, language: &'static str) -> Self {
        let text: Arc<str> = text.into();
        let fingerprint = Fingerprint::of(text.as_bytes());
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect::<Vec<_>>()
            .into();
        Self {
            path: path.into(),
            text,
            language,
            fingerprint,
            line_starts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Number of lines (a trailing newline does not start a new line).
    pub fn line_count(&self) -> usize {
        if self.text.is_empty() {
            return 0;
        }
        let starts = self.line_starts.len();
        if self.text.ends_with('\n') {
            starts - 1
        } else {
            starts
        }
    }

    /// Slice the original text by byte range.
    ///
    /// Ranges that do not fall on char boundaries yield an empty string.
    pub fn slice(&self, range: Range<usize>) -> &str {
        self.text.get(range).unwrap_or("")
    }

    /// Text of a 1-based line, without its terminator.
    pub fn line(&self, line: usize) -> Option<&str> {
        if line == 0 || line > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line - 1];
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let raw = self.text.get(start..end)?;
        Some(raw.strip_suffix('\r').unwrap_or(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = Fingerprint::of(b"def f(): pass\n");
        let b = Fingerprint::of(b"def f(): pass\n");
        let c = Fingerprint::of(b"def g(): pass\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_hex() {
        let fp = Fingerprint::of(b"");
        assert_eq!(
            fp.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()), Some(fp));
        assert_eq!(Fingerprint::from_hex("zz"), None);
    }

    #[test]
    fn test_lines() {
        let unit = SourceUnit::new("a.py", "first\r\nsecond\n\nfourth", "python");
        assert_eq!(unit.line_count(), 4);
        assert_eq!(unit.line(1), Some("first"));
        assert_eq!(unit.line(2), Some("second"));
        assert_eq!(unit.line(3), Some(""));
        assert_eq!(unit.line(4), Some("fourth"));
        assert_eq!(unit.line(5), None);
        assert_eq!(unit.line(0), None);
    }

    #[test]
    fn test_line_count_trailing_newline() {
        assert_eq!(SourceUnit::new("a", "", "python").line_count(), 0);
        assert_eq!(SourceUnit::new("a", "x\n", "python").line_count(), 1);
        assert_eq!(SourceUnit::new("a", "x\ny", "python").line_count(), 2);
    }

    #[test]
    fn test_slice_respects_char_boundaries() {
        let unit = SourceUnit::new("a", "héllo", "python");
        assert_eq!(unit.slice(0..1), "h");
        assert_eq!(unit.slice(1..2), "");
        assert_eq!(unit.slice(1..3), "é");
    }
}
