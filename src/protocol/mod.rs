//! Extraction of the embedded file/tool-call protocol from a model response.
//!
//! The response arrives in deltas whose boundaries can fall anywhere, even
//! inside a marker, so every call re-scans the whole accumulated buffer.
//! [`extract`] is a pure function of the buffer and the pre-turn file set;
//! calling it on every delta is how the console stays consistent.

mod fallback;
pub mod markers;

use std::collections::HashSet;

use crate::state::{FileItem, ToolCall, ToolOp, ToolStatus};
use markers::{
    file_marker, open_block_start, pending_tail_start, strip_nested_fence, Tail, FILE_BLOCK,
    TOOL_CALL,
};

/// A `(path, content)` pair found in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Message body with protocol spans excised.
    pub text: String,
    /// File writes in buffer order.
    pub files: Vec<DetectedFile>,
    /// Audit records: file blocks first, then structural calls, then
    /// fallback fences.
    pub tool_calls: Vec<ToolCall>,
}

impl Extraction {
    /// Structural operations in the order they were detected.
    pub fn structural_ops(&self) -> impl Iterator<Item = &ToolCall> {
        self.tool_calls.iter().filter(|call| call.op.is_structural())
    }
}

struct Span {
    start: usize,
    end: usize,
    replacement: Option<String>,
}

/// Derivation of a buffer that may still grow.
pub fn extract(buffer: &str, pre_turn_files: &[FileItem]) -> Extraction {
    extract_with(buffer, pre_turn_files, Tail::Streaming)
}

/// Derivation of a finished response. Differs from [`extract`] only in the
/// visible text: a trailing `:` or `::` is kept since no marker can follow.
pub fn extract_complete(buffer: &str, pre_turn_files: &[FileItem]) -> Extraction {
    extract_with(buffer, pre_turn_files, Tail::Complete)
}

fn extract_with(buffer: &str, pre_turn_files: &[FileItem], tail: Tail) -> Extraction {
    let existing: HashSet<&str> = pre_turn_files.iter().map(|f| f.path.as_str()).collect();
    let mut extraction = Extraction::default();
    let mut spans = Vec::new();

    for (index, caps) in FILE_BLOCK.captures_iter(buffer).enumerate() {
        let (Some(whole), Some(path), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let path = path.as_str().trim().to_string();
        let content = strip_nested_fence(body.as_str().trim());

        spans.push(Span {
            start: whole.start(),
            end: whole.end(),
            replacement: Some(file_marker(&path)),
        });
        extraction
            .tool_calls
            .push(file_tool_call(format!("block-{index}"), &path, &existing, "Generated"));
        extraction.files.push(DetectedFile { path, content });
    }

    for (index, caps) in TOOL_CALL.captures_iter(buffer).enumerate() {
        let (Some(whole), Some(payload)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        spans.push(Span {
            start: whole.start(),
            end: whole.end(),
            replacement: None,
        });

        match serde_json::from_str::<ToolOp>(payload.as_str()) {
            Ok(op) if op.is_structural() => extraction.tool_calls.push(ToolCall {
                id: format!("tool-{index}"),
                op,
                status: ToolStatus::Pending,
                result: None,
            }),
            Ok(op) => {
                tracing::debug!(op = op.name(), "ignoring file op sent as a standalone tool call");
            }
            Err(error) => {
                tracing::debug!(%error, payload = payload.as_str(), "dropping malformed tool call");
            }
        }
    }

    if extraction.files.is_empty() {
        // A fence inside a block that has not closed yet belongs to that block.
        let covered: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
        let scanned = &buffer[..open_block_start(buffer, &covered)];
        for (index, fence) in fallback::fenced_files(scanned) {
            extraction.tool_calls.push(file_tool_call(
                format!("md-{index}"),
                &fence.path,
                &existing,
                "Extracted from Markdown",
            ));
            extraction.files.push(fence);
        }
    }

    extraction.text = sanitize(buffer, spans, tail);
    extraction
}

fn file_tool_call(id: String, path: &str, existing: &HashSet<&str>, note: &str) -> ToolCall {
    let path = path.to_string();
    let op = if existing.contains(path.as_str()) {
        ToolOp::UpdateFile { path }
    } else {
        ToolOp::CreateFile { path }
    };
    ToolCall {
        id,
        op,
        status: ToolStatus::Success,
        result: Some(note.to_string()),
    }
}

/// Rebuilds the visible text: file blocks become markers, tool calls vanish,
/// an unterminated trailing block stays hidden, everything else is kept.
fn sanitize(buffer: &str, mut spans: Vec<Span>, tail: Tail) -> String {
    spans.sort_by_key(|span| (span.start, std::cmp::Reverse(span.end)));

    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if kept.last().is_some_and(|last| span.start < last.end) {
            continue;
        }
        kept.push(span);
    }

    let covered: Vec<(usize, usize)> = kept.iter().map(|s| (s.start, s.end)).collect();
    let visible_end = pending_tail_start(buffer, &covered, tail);

    let mut text = String::with_capacity(visible_end);
    let mut cursor = 0;
    for span in kept.iter().filter(|span| span.end <= visible_end) {
        text.push_str(&buffer[cursor..span.start]);
        if let Some(replacement) = &span.replacement {
            text.push_str(replacement);
        }
        cursor = span.end;
    }
    if cursor < visible_end {
        text.push_str(&buffer[cursor..visible_end]);
    }

    text.trim().to_string()
}
