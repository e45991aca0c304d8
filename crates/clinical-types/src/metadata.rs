//! Structured metadata extracted from filenames and document content.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Metadata fields derived by the extractor.
///
/// Unresolved fields stay `None` rather than being guessed; the pipeline
/// uses `missing_fields` to flag incomplete records instead of silently
/// mis-tagging them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Patient identifier (e.g. "P001")
    pub patient_id: Option<String>,

    /// Date of clinical relevance
    pub document_date: Option<NaiveDate>,

    /// Clinical category tag (cardiac, radiology, ...)
    pub category: Option<String>,
}

impl RecordMetadata {
    /// Names of fields the extractor could not resolve.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.patient_id.is_none() {
            missing.push("patient_id");
        }
        if self.document_date.is_none() {
            missing.push("document_date");
        }
        if self.category.is_none() {
            missing.push("category");
        }
        missing
    }

    /// Whether every field was resolved.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fill any unset fields from another extraction pass.
    ///
    /// Earlier passes win: filename rules run before content rules, and a
    /// field resolved by the filename is never overwritten by content.
    pub fn merge(mut self, other: RecordMetadata) -> Self {
        if self.patient_id.is_none() {
            self.patient_id = other.patient_id;
        }
        if self.document_date.is_none() {
            self.document_date = other.document_date;
        }
        if self.category.is_none() {
            self.category = other.category;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_all_unset() {
        let meta = RecordMetadata::default();
        assert_eq!(
            meta.missing_fields(),
            vec!["patient_id", "document_date", "category"]
        );
        assert!(!meta.is_complete());
    }

    #[test]
    fn test_merge_keeps_existing_values() {
        let first = RecordMetadata {
            patient_id: Some("P001".to_string()),
            document_date: None,
            category: None,
        };
        let second = RecordMetadata {
            patient_id: Some("P999".to_string()),
            document_date: NaiveDate::from_ymd_opt(2023, 6, 1),
            category: Some("cardiac".to_string()),
        };

        let merged = first.merge(second);
        assert_eq!(merged.patient_id.as_deref(), Some("P001"));
        assert_eq!(merged.document_date, NaiveDate::from_ymd_opt(2023, 6, 1));
        assert_eq!(merged.category.as_deref(), Some("cardiac"));
        assert!(merged.is_complete());
    }
}
