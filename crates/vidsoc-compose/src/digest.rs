//! Content fingerprints for reproducibility checks.
//!
//! Composing the same declarations twice must yield byte-identical maps and
//! constraints; the fingerprint makes that comparable across builds. The
//! result is hashed section by section. Every section is framed by its label
//! and a length prefix, so moving data between sections changes the digest
//! even when the concatenated bytes would not.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Domain tag mixed in ahead of every section.
const TAG: &[u8] = b"vidsoc-composition/v1";

/// A finished 32-byte SHA-256 fingerprint. `Display` renders lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

/// Streaming fingerprint over labelled sections.
///
/// Sections are order sensitive. Each label should appear once.
pub struct Fingerprinter {
    hasher: Sha256,
    sections: usize,
}

impl Fingerprinter {
    pub fn new() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(TAG);
        Self {
            hasher,
            sections: 0,
        }
    }

    /// Mix in `value` under `label`.
    pub fn section<T: Serialize + ?Sized>(&mut self, label: &str, value: &T) -> Result<&mut Self> {
        let body = serde_json::to_vec(value)?;
        self.frame(label.as_bytes());
        self.frame(&body);
        self.sections += 1;
        Ok(self)
    }

    /// Number of sections mixed in so far.
    pub fn sections(&self) -> usize {
        self.sections
    }

    pub fn finish(self) -> Fingerprint {
        let mut hasher = self.hasher;
        hasher.update((self.sections as u64).to_le_bytes());
        Fingerprint(hasher.finalize().into())
    }

    fn frame(&mut self, bytes: &[u8]) {
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(label: &str, value: &[u32]) -> Fingerprint {
        let mut fp = Fingerprinter::new();
        fp.section(label, value).unwrap();
        fp.finish()
    }

    #[test]
    fn deterministic() {
        assert_eq!(single("registers", &[11, 12]), single("registers", &[11, 12]));
    }

    #[test]
    fn label_is_part_of_the_digest() {
        assert_ne!(single("registers", &[3]), single("interrupts", &[3]));
    }

    #[test]
    fn section_boundaries_matter() {
        let mut split = Fingerprinter::new();
        split.section("a", "bc").unwrap().section("d", "").unwrap();
        let mut joined = Fingerprinter::new();
        joined.section("a", "b").unwrap().section("cd", "").unwrap();
        assert_eq!(split.sections(), 2);
        assert_ne!(split.finish(), joined.finish());
    }

    #[test]
    fn section_order_matters() {
        let mut ab = Fingerprinter::new();
        ab.section("registers", &[1u32]).unwrap().section("interrupts", &[2u32]).unwrap();
        let mut ba = Fingerprinter::new();
        ba.section("interrupts", &[2u32]).unwrap().section("registers", &[1u32]).unwrap();
        assert_ne!(ab.finish(), ba.finish());
    }

    #[test]
    fn empty_differs_from_empty_section() {
        let mut one = Fingerprinter::new();
        one.section("constants", &[] as &[u32]).unwrap();
        assert_ne!(Fingerprinter::new().finish(), one.finish());
    }

    #[test]
    fn hex_display() {
        let hex = single("constants", &[100]).to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }
}
