use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Document,
    Other,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "image" => Self::Image,
            "document" => Self::Document,
            _ => Self::Other,
        }
    }
}

/// An uploaded file; `owner_id` is the task (or other document) it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub owner_id: Option<String>,
    pub kind: FileKind,
    pub object_key: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Outcome of attaching a file to an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Bound,
    Missing,
    /// Already attached to a different owner; left untouched.
    Taken,
}
