//! Fingerprints for diff results, trait configurations and dumps.
//!
//! Two runs over the same inputs must produce byte-identical dumps and
//! equal fingerprints. Structured values are hashed from their canonical
//! JSON form; textual dumps are hashed after line normalization, so a dump
//! copied out of a log on another platform still matches.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Configuration sets serialize in first-sight order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data
//! - NaN agreements serialize as `null`

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Canonical JSON bytes of a value.
pub fn canonical_json<T: Serialize>(value: &T) -> Vec<u8> {
    // Only string-keyed maps and plain data are hashed here.
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// xxh64 of the canonical JSON form.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&canonical_json(value), 0)
}

/// Hex fingerprint of a serializable value.
pub fn fingerprint<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Hex fingerprint of a textual dump.
///
/// `\r\n` and trailing whitespace on each line are ignored, as is a
/// missing final newline.
pub fn dump_fingerprint(dump: &str) -> String {
    let mut normalized = String::with_capacity(dump.len());
    for line in dump.lines() {
        normalized.push_str(line.trim_end());
        normalized.push('\n');
    }
    format!("{:016x}", xxh64(normalized.as_bytes(), 0))
}
