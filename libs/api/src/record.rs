use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Number of auxiliary string slots carried by every record.
pub const RESERVED_SLOTS: usize = 10;

// ════════════════════════════════════════════════════════════════
//  RecordId
// ════════════════════════════════════════════════════════════════

/// Identifier of a record in the sequence.
///
/// Parsing from text accepts only plain ASCII decimal digits that fit in
/// `u64`; signs, whitespace and hex are rejected as `InvalidIdentifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StoreError::invalid_identifier(format!("wrong id '{s}'")));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| StoreError::invalid_identifier(format!("wrong id '{s}': {e}")))
    }
}

// ════════════════════════════════════════════════════════════════
//  Record
// ════════════════════════════════════════════════════════════════

/// Fixed-shape unit of data exchanged between producers and consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub id: u64,
    /// Opaque payload reference.
    pub file_name: String,
    /// Network-endpoint-shaped payload reference (`host:port`).
    pub buffer_address: String,
    pub segment_id: i64,
    /// Extension slots, empty unless populated.
    pub reserved: [String; RESERVED_SLOTS],
}

impl Record {
    /// Record with the given id and empty payload fields.
    pub fn new(id: u64) -> Self {
        Self { id, ..Default::default() }
    }

    pub fn record_id(&self) -> RecordId {
        RecordId(self.id)
    }

    /// Apply the fields set in `patch`. The id is never touched.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(ref v) = patch.file_name {
            self.file_name = v.clone();
        }
        if let Some(ref v) = patch.buffer_address {
            self.buffer_address = v.clone();
        }
        if let Some(v) = patch.segment_id {
            self.segment_id = v;
        }
        for (slot, value) in &patch.reserved {
            if let Some(target) = self.reserved.get_mut(*slot) {
                *target = value.clone();
            }
        }
    }
}

/// Partial update for an existing record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<i64>,
    /// `(slot, value)` pairs; slots outside `0..RESERVED_SLOTS` are ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved: Vec<(usize, String)>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none()
            && self.buffer_address.is_none()
            && self.segment_id.is_none()
            && self.reserved.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════
//  Cursor
// ════════════════════════════════════════════════════════════════

/// Result of one atomic cursor increment: the values immediately before and
/// after the delta was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorAdvance {
    pub old: u64,
    pub new: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn record_id_accepts_decimal_digits() {
        let id: RecordId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        let max: RecordId = u64::MAX.to_string().parse().unwrap();
        assert_eq!(max.get(), u64::MAX);
    }

    #[test]
    fn record_id_rejects_malformed_strings() {
        for bad in ["", "-1", "+1", " 1", "0x10", "12a", "5e0c1f", "18446744073709551616"] {
            let err = bad.parse::<RecordId>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidIdentifier, "input {bad:?}");
        }
    }

    #[test]
    fn new_record_has_ten_empty_reserved_slots() {
        let rec = Record::new(7);
        assert_eq!(rec.id, 7);
        assert_eq!(rec.reserved.len(), RESERVED_SLOTS);
        assert!(rec.reserved.iter().all(String::is_empty));
    }

    #[test]
    fn apply_patch_keeps_id_and_unset_fields() {
        let mut rec = Record::new(3);
        rec.file_name = "/data/a".into();
        rec.segment_id = 3;

        let patch = RecordPatch {
            buffer_address: Some("10.0.0.1:4500".into()),
            reserved: vec![(0, "x".into()), (99, "ignored".into())],
            ..Default::default()
        };
        rec.apply(&patch);

        assert_eq!(rec.id, 3);
        assert_eq!(rec.file_name, "/data/a");
        assert_eq!(rec.buffer_address, "10.0.0.1:4500");
        assert_eq!(rec.segment_id, 3);
        assert_eq!(rec.reserved[0], "x");
    }

    #[test]
    fn record_json_keeps_reserved_length() {
        let mut rec = Record::new(1);
        rec.reserved[9] = "last".into();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["reserved"].as_array().unwrap().len(), RESERVED_SLOTS);

        let short = serde_json::json!({
            "id": 1, "file_name": "", "buffer_address": "", "segment_id": 0,
            "reserved": ["a", "b"],
        });
        assert!(serde_json::from_value::<Record>(short).is_err());
    }

    #[test]
    fn record_json_fills_missing_fields() {
        let rec: Record = serde_json::from_str(r#"{"file_name":"/f","segment_id":4}"#).unwrap();
        assert_eq!(rec.id, 0);
        assert_eq!(rec.file_name, "/f");
        assert_eq!(rec.segment_id, 4);
        assert!(rec.reserved.iter().all(String::is_empty));
    }
}
