//! Content fingerprints for change classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit XXH3 fingerprint of a byte stream.
///
/// Two inputs with the same `Fingerprint` are treated as identical content.
/// The engine uses fingerprints in two places: the modification fingerprint
/// a source unit carries across builds, and the content fingerprint recorded
/// for every artifact so structural-change predicates can compare against
/// the previous build without rereading output files.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Computes the fingerprint of a byte slice using XXH3-128.
    pub fn of(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:08x}..)", (self.0 >> 96) as u32)
    }
}
