//! Generated documentation artifacts.

use serde::{Deserialize, Serialize};

/// The documents a janitor run generates for a repository.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Readme,
    Architecture,
    Contributing,
}

impl DocKind {
    /// Every kind, in generation order.
    pub const ALL: [DocKind; 3] = [DocKind::Readme, DocKind::Architecture, DocKind::Contributing];

    /// Target filename in the repository root.
    pub fn filename(&self) -> &'static str {
        match self {
            DocKind::Readme => "README.md",
            DocKind::Architecture => "ARCHITECTURE.md",
            DocKind::Contributing => "CONTRIBUTING.md",
        }
    }

    /// Short label used in status maps and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            DocKind::Readme => "readme",
            DocKind::Architecture => "architecture",
            DocKind::Contributing => "contributing",
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque structured-text summary of a codebase.
///
/// Produced by the summarization activity and consumed verbatim by
/// document generation; the orchestration layer never parses it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodebaseSummary(pub String);

impl CodebaseSummary {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of generating one document. Exactly one of `content` and
/// `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentResult {
    pub doc_type: DocKind,
    pub filename: String,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl DocumentResult {
    /// Successful generation.
    pub fn ok(doc_type: DocKind, content: impl Into<String>) -> Self {
        Self {
            doc_type,
            filename: doc_type.filename().to_string(),
            content: Some(content.into()),
            error: None,
        }
    }

    /// Failed generation.
    pub fn failed(doc_type: DocKind, error: impl Into<String>) -> Self {
        Self {
            doc_type,
            filename: doc_type.filename().to_string(),
            content: None,
            error: Some(error.into()),
        }
    }

    /// True when the document was generated.
    pub fn succeeded(&self) -> bool {
        self.content.is_some()
    }
}
