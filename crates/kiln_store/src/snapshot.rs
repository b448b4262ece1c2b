//! Validated binary snapshot framing for persisted build state.
//!
//! A snapshot file is `4-byte header length (little-endian) + bincode header
//! + payload`. The header carries magic bytes, a format version, and a
//! checksum of the payload. Reads validate all three and report any mismatch
//! as "no snapshot" so that a damaged state file costs a full rebuild, never
//! a wrong one.

use std::io::ErrorKind;
use std::path::Path;

use kiln_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Magic bytes identifying a Kiln state snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"KILN";

/// Current snapshot format version. Increment on breaking changes to the
/// header or payload encoding.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every snapshot for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    /// Magic bytes: must be `b"KILN"`.
    magic: [u8; 4],

    /// Snapshot format version.
    format_version: u32,

    /// Fingerprint of the payload data (for integrity checks).
    checksum: Fingerprint,
}

/// Writes a snapshot payload to `path` with a validated header.
pub fn write_snapshot(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        format_version: SNAPSHOT_FORMAT_VERSION,
        checksum: Fingerprint::of(payload),
    };

    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);

    std::fs::write(path, &output).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Reads a snapshot payload from `path`, validating its header.
///
/// Returns `Ok(None)` if the file does not exist, or if the header is
/// invalid, the format version does not match, or the checksum fails.
/// Only an I/O failure on an existing file is an error.
pub fn read_snapshot(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    Ok(decode_snapshot(&raw))
}

/// Splits raw snapshot bytes into a validated payload, or `None` if any
/// part of the framing fails to check out.
fn decode_snapshot(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }

    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    if raw.len() < 4 + header_len {
        return None;
    }

    let header: SnapshotHeader =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .ok()?
            .0;

    if header.magic != SNAPSHOT_MAGIC {
        return None;
    }
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return None;
    }

    let payload = &raw[4 + header_len..];
    if Fingerprint::of(payload) != header.checksum {
        return None;
    }

    Some(payload.to_vec())
}
