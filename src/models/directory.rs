// DTOs for the file-browser message protocol. Field names mirror the
// TypeScript payloads the frontend sends, hence the camelCase renames.
use serde::{Deserialize, Serialize};

/// The action a request claims to perform. Each handler verifies the claim
/// against itself and rejects mismatches before any remote call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DirectoryAction {
    List,
    Create,
    Delete,
    Rename,
    Content,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Directory,
    File,
}

/// One parsed line of a directory listing. Transient — regenerated on every
/// list request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// 1-based position in listing order.
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub action: DirectoryAction,
    /// Path relative to the workspace root, starting with `/`.
    pub path: String,
    #[serde(default)]
    pub children: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub action: DirectoryAction,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub action: DirectoryAction,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub action: DirectoryAction,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub action: DirectoryAction,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub action: DirectoryAction,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub name: String,
    pub content: String,
}

/// Error payload published to the requesting client's directory destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryError {
    pub message: String,
}

impl DirectoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Payload for a failed file operation, published to the destination the
    /// success response would have used.
    pub fn from_error(err: &crate::error::Error) -> Self {
        Self::new(err.client_message())
    }
}
