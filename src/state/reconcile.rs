use crate::protocol::Extraction;
use crate::state::{file_id, FileItem, FileKind, ToolCall, ToolOp, ToolStatus};
use crate::util::parent_path;
use uuid::Uuid;

/// Post-turn view derived from the pre-turn state and one extraction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub files: Vec<FileItem>,
    pub title: String,
    /// The extraction's records with structural outcomes filled in.
    pub tool_calls: Vec<ToolCall>,
}

/// Applies an extraction to the pre-turn file set and title.
///
/// File writes land first, in buffer order, then structural operations in the
/// order they were detected. The input slice is never mutated; the returned
/// set replaces the session's files wholesale.
pub fn reconcile(
    session_id: Uuid,
    pre_files: &[FileItem],
    pre_title: &str,
    extraction: &Extraction,
) -> Reconciled {
    let mut files = pre_files.to_vec();
    let mut title = pre_title.to_string();

    for detected in &extraction.files {
        upsert(session_id, &mut files, &detected.path, &detected.content);
    }

    let mut tool_calls = extraction.tool_calls.clone();
    for call in tool_calls.iter_mut().filter(|c| c.op.is_structural()) {
        let outcome = apply(session_id, &mut files, &mut title, &call.op);
        match outcome {
            Ok(()) => {
                call.status = ToolStatus::Success;
                call.result = None;
            }
            Err(note) => {
                tracing::debug!(op = call.op.name(), note, "structural op had no effect");
                call.status = ToolStatus::Error;
                call.result = Some(note.to_string());
            }
        }
    }

    Reconciled {
        files,
        title,
        tool_calls,
    }
}

fn upsert(session_id: Uuid, files: &mut Vec<FileItem>, path: &str, content: &str) {
    if let Some(existing) = files.iter_mut().find(|f| f.path == path) {
        if existing.content != content {
            existing.content = content.to_string();
        }
        return;
    }
    let parent = folder_id_for(session_id, files, path);
    files.push(FileItem::file(session_id, path, content).with_parent(parent));
}

fn apply(
    session_id: Uuid,
    files: &mut Vec<FileItem>,
    title: &mut String,
    op: &ToolOp,
) -> Result<(), &'static str> {
    match op {
        ToolOp::RenameFile { old_path, new_path } => {
            rename_file(session_id, files, old_path, new_path)
        }
        ToolOp::RenameFolder { old_path, new_path } => {
            rename_folder(session_id, files, old_path, new_path)
        }
        ToolOp::DeleteFile { path } => {
            let before = files.len();
            files.retain(|f| f.path != *path);
            if files.len() == before {
                return Err("no such path");
            }
            Ok(())
        }
        ToolOp::RenameChat { title: next } => {
            let next = next.trim();
            if next.is_empty() {
                return Err("empty title");
            }
            *title = next.to_string();
            Ok(())
        }
        ToolOp::CreateFile { .. } | ToolOp::UpdateFile { .. } => Ok(()),
    }
}

fn rename_file(
    session_id: Uuid,
    files: &mut Vec<FileItem>,
    old_path: &str,
    new_path: &str,
) -> Result<(), &'static str> {
    if new_path.trim().is_empty() {
        return Err("empty target path");
    }
    if !files.iter().any(|f| f.path == old_path) {
        return Err("no such path");
    }
    if old_path == new_path {
        return Ok(());
    }

    files.retain(|f| f.path != new_path);
    let parent = folder_id_for(session_id, files, new_path);
    if let Some(item) = files.iter_mut().find(|f| f.path == old_path) {
        item.relocate(session_id, new_path);
        item.parent_id = parent;
    }
    Ok(())
}

/// Literal prefix rewrite: every path starting with `old_path` gets that
/// prefix replaced by `new_path`.
fn rename_folder(
    session_id: Uuid,
    files: &mut Vec<FileItem>,
    old_path: &str,
    new_path: &str,
) -> Result<(), &'static str> {
    if old_path.is_empty() {
        return Err("empty source path");
    }
    let moved: Vec<String> = files
        .iter()
        .filter(|f| f.path.starts_with(old_path))
        .map(|f| format!("{new_path}{}", &f.path[old_path.len()..]))
        .collect();
    if moved.is_empty() {
        return Err("no such path");
    }
    if old_path == new_path {
        return Ok(());
    }

    files.retain(|f| f.path.starts_with(old_path) || !moved.contains(&f.path));
    for item in files.iter_mut().filter(|f| f.path.starts_with(old_path)) {
        let target = format!("{new_path}{}", &item.path[old_path.len()..]);
        item.relocate(session_id, &target);
    }

    let folders: Vec<String> = files
        .iter()
        .filter(|f| f.kind == FileKind::Folder)
        .map(|f| f.path.clone())
        .collect();
    for item in files.iter_mut().filter(|f| moved.contains(&f.path)) {
        item.parent_id = parent_path(&item.path)
            .filter(|parent| folders.iter().any(|f| f == parent))
            .map(|parent| file_id(session_id, parent));
    }
    Ok(())
}

fn folder_id_for(session_id: Uuid, files: &[FileItem], path: &str) -> Option<Uuid> {
    let parent = parent_path(path)?;
    files
        .iter()
        .any(|f| f.kind == FileKind::Folder && f.path == parent)
        .then(|| file_id(session_id, parent))
}
