use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::file_name;

pub const DEFAULT_SESSION_TITLE: &str = "New Project";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    #[default]
    React,
    Angular,
}

impl Framework {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "react" => Some(Self::React),
            "angular" => Some(Self::Angular),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::React => "React",
            Self::Angular => "Angular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Success,
    Error,
}

/// A file or structural operation, tagged the way the embedded protocol
/// spells it: `{"name": "<op>", "args": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum ToolOp {
    CreateFile {
        path: String,
    },
    UpdateFile {
        path: String,
    },
    RenameFile {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },
    RenameFolder {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },
    DeleteFile {
        path: String,
    },
    RenameChat {
        title: String,
    },
}

impl ToolOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => "create_file",
            Self::UpdateFile { .. } => "update_file",
            Self::RenameFile { .. } => "rename_file",
            Self::RenameFolder { .. } => "rename_folder",
            Self::DeleteFile { .. } => "delete_file",
            Self::RenameChat { .. } => "rename_chat",
        }
    }

    /// Structural ops arrive as explicit tool calls; file ops are inferred
    /// from file blocks.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::CreateFile { .. } | Self::UpdateFile { .. })
    }
}

/// Display/audit record attached to a model message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Unique only within the extraction pass that produced it.
    pub id: String,
    pub op: ToolOp,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
    pub kind: FileKind,
    /// Display-only hint for tree views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

/// Identity of the item at `path` in `session_id`. Re-detecting a path always
/// lands on the same id.
pub fn file_id(session_id: Uuid, path: &str) -> Uuid {
    Uuid::new_v5(&session_id, path.as_bytes())
}

impl FileItem {
    pub fn file(session_id: Uuid, path: &str, content: impl Into<String>) -> Self {
        Self {
            id: file_id(session_id, path),
            name: file_name(path).to_string(),
            path: path.to_string(),
            content: content.into(),
            kind: FileKind::File,
            parent_id: None,
        }
    }

    pub fn folder(session_id: Uuid, path: &str) -> Self {
        Self {
            id: file_id(session_id, path),
            name: file_name(path).to_string(),
            path: path.to_string(),
            content: String::new(),
            kind: FileKind::Folder,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<Uuid>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Moves the item to `path`, keeping identity a function of the path.
    pub fn relocate(&mut self, session_id: Uuid, path: &str) {
        self.id = file_id(session_id, path);
        self.name = file_name(path).to_string();
        self.path = path.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    /// Empty model message, filled in place while the response streams.
    pub fn model() -> Self {
        Self::new(Role::Model, String::new())
    }

    fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
            usage: None,
            cost: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub framework: Framework,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub files: Vec<FileItem>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
}

impl Session {
    pub fn new(framework: Framework) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            framework,
            messages: Vec::new(),
            files: Vec::new(),
            last_modified: Utc::now(),
            total_tokens: 0,
            total_cost: 0.0,
        }
    }

    pub fn file(&self, path: &str) -> Option<&FileItem> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
