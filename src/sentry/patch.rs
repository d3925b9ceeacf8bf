//! Incremental byte-range patches to the shared secret.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::EventRecord;
use crate::error::{KilnError, KilnResult};

/// A byte-range write into the shared secret, as instructed by the remote
/// service.
#[derive(Debug, Clone)]
pub struct UpdatePatch {
    /// Byte offset the write starts at.
    pub offset: usize,
    /// Bytes to copy in.
    pub bytes: Bytes,
    /// Number of bytes the remote expects to land.
    pub expected_len: usize,
    /// New remote filename, when the service renames the key.
    pub remote_filename: Option<String>,
}

/// Wire shape of the patch payload carried in the update event.
#[derive(Debug, Deserialize)]
struct PatchWire {
    offset: f64,
    bytes_base64: String,
    expected_len: usize,
    #[serde(default)]
    filename: Option<String>,
}

impl UpdatePatch {
    /// Extract and validate a patch from an update event's first argument.
    pub fn from_record(record: &EventRecord) -> KilnResult<Self> {
        let raw = record.args.first().ok_or_else(|| {
            KilnError::Validation("update event carries no payload".to_string())
        })?;
        let wire: PatchWire = serde_json::from_value(raw.clone())
            .map_err(|e| KilnError::Validation(format!("malformed update payload: {}", e)))?;
        let bytes = BASE64.decode(wire.bytes_base64.as_bytes()).map_err(|e| {
            KilnError::Validation(format!("bytes_base64 is not valid base64: {}", e))
        })?;
        Self::from_parts(
            wire.offset,
            Bytes::from(bytes),
            wire.expected_len,
            wire.filename,
        )
    }

    /// Validate the offset and assemble a patch.
    ///
    /// The offset arrives as a JSON number; it must be finite, non-negative,
    /// and integral before it can index a buffer.
    pub fn from_parts(
        offset: f64,
        bytes: Bytes,
        expected_len: usize,
        remote_filename: Option<String>,
    ) -> KilnResult<Self> {
        if !offset.is_finite() || offset < 0.0 || offset.fract() != 0.0 {
            return Err(KilnError::Validation(format!(
                "expected a finite non-negative integer offset, got {}",
                offset
            )));
        }
        Ok(Self {
            offset: offset as usize,
            bytes,
            expected_len,
            remote_filename,
        })
    }

    /// The wire form of this patch, as the transport would deliver it.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "offset": self.offset,
            "bytes_base64": BASE64.encode(&self.bytes),
            "expected_len": self.expected_len,
        });
        if let Some(filename) = &self.remote_filename {
            value["filename"] = json!(filename);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn update_record(args: Vec<Value>) -> EventRecord {
        EventRecord {
            id: 0,
            channel: "auth".to_string(),
            name: "update_machine_auth".to_string(),
            time: Utc::now(),
            args,
            confirm: None,
        }
    }

    #[test]
    fn test_from_parts_accepts_zero_offset() {
        let patch =
            UpdatePatch::from_parts(0.0, Bytes::from_static(&[1, 2]), 2, None).unwrap();
        assert_eq!(patch.offset, 0);
        assert_eq!(patch.expected_len, 2);
    }

    #[test]
    fn test_from_parts_rejects_negative_offset() {
        let result = UpdatePatch::from_parts(-1.0, Bytes::new(), 0, None);
        assert!(matches!(result, Err(KilnError::Validation(_))));
    }

    #[test]
    fn test_from_parts_rejects_non_finite_offset() {
        for offset in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = UpdatePatch::from_parts(offset, Bytes::new(), 0, None);
            assert!(matches!(result, Err(KilnError::Validation(_))));
        }
    }

    #[test]
    fn test_from_parts_rejects_fractional_offset() {
        let result = UpdatePatch::from_parts(1.5, Bytes::new(), 0, None);
        assert!(matches!(result, Err(KilnError::Validation(_))));
    }

    #[test]
    fn test_from_record_round_trip() {
        let patch = UpdatePatch {
            offset: 5,
            bytes: Bytes::from_static(&[0xFF, 0xFF]),
            expected_len: 2,
            remote_filename: Some("sentry.bin".to_string()),
        };
        let record = update_record(vec![patch.to_value()]);

        let parsed = UpdatePatch::from_record(&record).unwrap();
        assert_eq!(parsed.offset, 5);
        assert_eq!(parsed.bytes, Bytes::from_static(&[0xFF, 0xFF]));
        assert_eq!(parsed.expected_len, 2);
        assert_eq!(parsed.remote_filename, Some("sentry.bin".to_string()));
    }

    #[test]
    fn test_from_record_without_payload() {
        let record = update_record(vec![]);
        let result = UpdatePatch::from_record(&record);
        assert!(matches!(result, Err(KilnError::Validation(_))));
    }

    #[test]
    fn test_from_record_malformed_payload() {
        let record = update_record(vec![json!({"offset": "not a number"})]);
        let result = UpdatePatch::from_record(&record);
        assert!(matches!(result, Err(KilnError::Validation(_))));
    }

    #[test]
    fn test_from_record_bad_base64() {
        let record = update_record(vec![json!({
            "offset": 0,
            "bytes_base64": "@@@",
            "expected_len": 1,
        })]);
        let result = UpdatePatch::from_record(&record);
        assert!(matches!(result, Err(KilnError::Validation(_))));
    }
}
