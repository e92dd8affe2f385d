//! Repository structure snapshots.
//!
//! A deep scan maps a repository into a file tree plus the contents of
//! well-known tech-stack files. The shaping helpers here (tree
//! normalisation, content truncation) are pure so that scanner
//! implementations and fakes produce byte-identical snapshots for the
//! same input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of lines kept per tech-stack file.
pub const MAX_TECH_FILE_LINES: usize = 200;

/// Well-known manifest files captured during a deep scan.
pub const TECH_MANIFESTS: &[&str] = &[
    "package.json",
    "pyproject.toml",
    "requirements.txt",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "Makefile",
    "Cargo.toml",
    "go.mod",
];

/// Conventional entry-point files captured during a deep scan.
pub const ENTRY_POINTS: &[&str] = &[
    "main.py",
    "app.py",
    "index.js",
    "index.ts",
    "src/main.py",
    "src/app.py",
    "src/index.js",
    "src/index.ts",
];

/// Whether a tree node is a file or a directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Dir,
}

/// One node in a repository file tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileNode {
    /// Base name of the entry.
    pub name: String,

    /// File or directory.
    pub kind: FileKind,

    /// Path relative to the repository root.
    pub path: String,

    /// Child entries; always empty for files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Construct a file node.
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::File,
            path: path.into(),
            children: Vec::new(),
        }
    }

    /// Construct a directory node with the given children.
    pub fn dir(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<FileNode>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Dir,
            path: path.into(),
            children,
        }
    }
}

/// Output of a deep scan of one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    /// Normalised file tree of the repository.
    pub file_tree: Vec<FileNode>,

    /// Contents of recognised manifests and entry points, keyed by path,
    /// each truncated to [`MAX_TECH_FILE_LINES`] lines.
    pub tech_stack_files: BTreeMap<String, String>,
}

/// Truncate `content` to at most `max_lines` lines.
///
/// When truncation occurs, an elision marker is appended so downstream
/// consumers know the file continues.
pub fn truncate_lines(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }
    let mut truncated = lines[..max_lines].join("\n");
    truncated.push_str("\n... (truncated)");
    truncated
}

/// Normalise a file tree in place: drop dot-prefixed entries, then sort
/// each directory level with directories first and names compared
/// case-insensitively. Applied recursively.
pub fn normalize_file_tree(nodes: &mut Vec<FileNode>) {
    nodes.retain(|node| !node.name.starts_with('.'));
    nodes.sort_by(|a, b| {
        let rank = |kind: FileKind| match kind {
            FileKind::Dir => 0,
            FileKind::File => 1,
        };
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    for node in nodes {
        normalize_file_tree(&mut node.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_content_verbatim() {
        let content = "line 1\nline 2\nline 3";
        assert_eq!(truncate_lines(content, 200), content);
        assert_eq!(truncate_lines(content, 3), content);
    }

    #[test]
    fn test_truncate_appends_elision_marker() {
        let content = (1..=5).map(|n| format!("line {n}")).collect::<Vec<_>>().join("\n");
        let truncated = truncate_lines(&content, 2);
        assert_eq!(truncated, "line 1\nline 2\n... (truncated)");
    }

    #[test]
    fn test_normalize_sorts_dirs_first_case_insensitive() {
        let mut nodes = vec![
            FileNode::file("README.md", "README.md"),
            FileNode::dir("src", "src", vec![]),
            FileNode::file("cargo.toml", "cargo.toml"),
            FileNode::dir("Docs", "Docs", vec![]),
        ];
        normalize_file_tree(&mut nodes);
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Docs", "src", "cargo.toml", "README.md"]);
    }

    #[test]
    fn test_normalize_drops_hidden_entries_recursively() {
        let mut nodes = vec![
            FileNode::dir(
                "src",
                "src",
                vec![
                    FileNode::file(".DS_Store", "src/.DS_Store"),
                    FileNode::file("main.rs", "src/main.rs"),
                ],
            ),
            FileNode::dir(".github", ".github", vec![]),
            FileNode::file(".gitignore", ".gitignore"),
        ];
        normalize_file_tree(&mut nodes);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "src");
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].children[0].name, "main.rs");
    }

    #[test]
    fn test_file_kind_serializes_snake_case() {
        let node = FileNode::file("main.rs", "src/main.rs");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["kind"], "file");
        // Empty children are omitted entirely.
        assert!(json.get("children").is_none());
    }
}
