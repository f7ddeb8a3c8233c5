// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::backend::BackendAttrs;

/// Logical size reported for directories whose backend does not track one.
pub const DIRECTORY_SIZE: u64 = 4096;

/// Kind of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
            NodeKind::Symlink => "symlink",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consolidated metadata for a filesystem node, as reported to callers.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeMetadata {
    pub kind: NodeKind,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub birthtime: i64,
}

impl NodeMetadata {
    /// Shape raw backend attributes into caller-facing metadata.
    ///
    /// A directory with no backend-tracked size gets the fixed logical size;
    /// any other node with no size reports zero.
    pub fn from_attrs(attrs: BackendAttrs) -> Self {
        let size = match (attrs.kind, attrs.size) {
            (NodeKind::Directory, None) => DIRECTORY_SIZE,
            (_, None) => 0,
            (_, Some(size)) => size,
        };
        Self {
            kind: attrs.kind,
            size,
            atime: attrs.atime,
            mtime: attrs.mtime,
            ctime: attrs.ctime,
            birthtime: attrs.birthtime,
        }
    }

    /// Metadata for the root directory.
    ///
    /// The root is never probed from a backend; it is synthesized here so
    /// that backends need no root concept of their own.
    pub fn root() -> Self {
        Self {
            kind: NodeKind::Directory,
            size: DIRECTORY_SIZE,
            atime: 0,
            mtime: 0,
            ctime: 0,
            birthtime: 0,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == NodeKind::Symlink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_size_synthesized() {
        let attrs = BackendAttrs::new(NodeKind::Directory, None, 7);
        let md = NodeMetadata::from_attrs(attrs);
        assert_eq!(md.size, DIRECTORY_SIZE);
        assert!(md.is_dir());
        assert_eq!(md.mtime, 7);
    }

    #[test]
    fn test_file_size_passes_through() {
        let attrs = BackendAttrs::new(NodeKind::File, Some(5), 0);
        let md = NodeMetadata::from_attrs(attrs);
        assert_eq!(md.size, 5);
        assert!(md.is_file());
    }

    #[test]
    fn test_file_without_size_is_empty() {
        let attrs = BackendAttrs::new(NodeKind::File, None, 0);
        assert_eq!(NodeMetadata::from_attrs(attrs).size, 0);
    }

    #[test]
    fn test_root_is_directory() {
        let root = NodeMetadata::root();
        assert!(root.is_dir());
        assert_eq!(root.size, DIRECTORY_SIZE);
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&NodeKind::Symlink).expect("serialize");
        assert_eq!(json, "\"symlink\"");
        let parsed: NodeKind = serde_json::from_str("\"directory\"").expect("deserialize");
        assert_eq!(parsed, NodeKind::Directory);
    }
}
