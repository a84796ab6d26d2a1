use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Audit record of one import attempt. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLog {
    pub id: i64,
    pub import_source: String,
    pub nodes_count: usize,
    pub links_count: usize,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub imported_at: OffsetDateTime,
    pub imported_by: Option<String>,
}

/// Fields for a new import log row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportLogDraft {
    pub import_source: String,
    pub nodes_count: usize,
    pub links_count: usize,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: Value,
    pub imported_by: Option<String>,
}

impl ImportLogDraft {
    /// Creates a log entry for a successful import.
    pub fn succeeded(
        import_source: impl Into<String>,
        nodes_count: usize,
        links_count: usize,
        metadata: Value,
        imported_by: Option<&str>,
    ) -> Self {
        Self {
            import_source: import_source.into(),
            nodes_count,
            links_count,
            success: true,
            error: None,
            metadata,
            imported_by: imported_by.map(String::from),
        }
    }

    /// Creates a log entry for a failed import.
    pub fn failed(
        import_source: impl Into<String>,
        error: impl Into<String>,
        imported_by: Option<&str>,
    ) -> Self {
        Self {
            import_source: import_source.into(),
            nodes_count: 0,
            links_count: 0,
            success: false,
            error: Some(error.into()),
            metadata: Value::Object(Default::default()),
            imported_by: imported_by.map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_draft_carries_error_and_zero_counts() {
        let draft = ImportLogDraft::failed("upload", "boom", Some("ana"));

        assert!(!draft.success);
        assert_eq!(draft.error.as_deref(), Some("boom"));
        assert_eq!(draft.nodes_count, 0);
        assert_eq!(draft.imported_by.as_deref(), Some("ana"));
    }
}
