//! Stored-name convention for encrypted blobs
//!
//! `report.pdf` is stored as `report.pdf.encrypted` and shown back as
//! `report.pdf`. Only a trailing suffix is stripped, so a name that merely
//! contains `.encrypted` somewhere in the middle is left intact.

/// Suffix appended to the original filename of every stored blob
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// `name.ext` → `name.ext.encrypted`
pub fn append_suffix(name: &str) -> String {
    let mut stored = String::with_capacity(name.len() + ENCRYPTED_SUFFIX.len());
    stored.push_str(name);
    stored.push_str(ENCRYPTED_SUFFIX);
    stored
}

/// `name.ext.encrypted` → `name.ext`; names without the suffix are returned
/// unchanged.
pub fn strip_suffix(stored: &str) -> &str {
    stored.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(stored)
}

/// Whether `name` carries the encrypted-blob suffix.
pub fn has_suffix(name: &str) -> bool {
    name.ends_with(ENCRYPTED_SUFFIX)
}
