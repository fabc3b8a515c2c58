use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a metadata record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Fresh random (UUID v4) identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for one stored blob, as submitted to the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub owner_id: String,
    /// Display filename (no `.encrypted` suffix)
    pub file_name: String,
    /// Filename the blob was stored under (with suffix)
    pub stored_name: String,
    /// Blob path in the blob store
    pub storage_path: String,
    /// Plaintext size in bytes
    pub size: u64,
    pub mime_type: String,
    /// Unix timestamp (seconds)
    pub uploaded_at: u64,
}

/// A persisted metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub meta: NewRecord,
}

impl FileRecord {
    pub fn new(id: RecordId, meta: NewRecord) -> Self {
        Self { id, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewRecord {
        NewRecord {
            owner_id: "alice".into(),
            file_name: "report.pdf".into(),
            stored_name: "report.pdf.encrypted".into(),
            storage_path: "users/alice/1700000000000_report.pdf.encrypted".into(),
            size: 1234,
            mime_type: "application/pdf".into(),
            uploaded_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = FileRecord::new(RecordId::from("abc"), sample());
        let text = toml::to_string(&record).unwrap();
        assert!(text.contains("id = \"abc\""));
        assert!(text.contains("file_name = \"report.pdf\""));
        assert!(!text.contains("[meta]"));
    }

    #[test]
    fn test_record_roundtrip() {
        let record = FileRecord::new(RecordId::generate(), sample());
        let text = toml::to_string(&record).unwrap();
        let parsed: FileRecord = toml::from_str(&text).unwrap();
        assert_eq!(parsed, record);
    }
}
