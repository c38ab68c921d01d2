use regex::Regex;
use std::sync::LazyLock;

pub const FILE_OPEN: &str = ":::FILE";
pub const FILE_CLOSE: &str = ":::END_FILE:::";
pub const TOOL_OPEN: &str = ":::TOOL_CALL";
pub const TOOL_CLOSE: &str = " :::";

/// `:::FILE <path>:::` ... `:::END_FILE:::`
pub static FILE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":::FILE\s+([^\s:]+)\s*:::((?s:.*?)):::END_FILE:::")
        .expect("file block pattern compiles")
});

/// `:::TOOL_CALL {...} :::` with a single JSON object payload.
pub static TOOL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":::TOOL_CALL (\{(?s:.*?)\}) :::").expect("tool call pattern compiles")
});

/// Triple-backtick fence with an optional language tag.
pub static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```[A-Za-z0-9_+-]*\s*((?s:.*?))```").expect("code fence pattern compiles")
});

/// Text that stands in for a file block in the visible message.
pub fn file_marker(path: &str) -> String {
    let escaped = escape_attr(path);
    format!(r#"<div class="file-generated" data-path="{escaped}">File: {escaped}</div>"#)
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Drops a code fence the model nested inside a file block. The closing
/// fence line is only removed together with an opening one.
pub fn strip_nested_fence(content: &str) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if !lines.first().is_some_and(|l| l.trim().starts_with("```")) {
        return content.to_string();
    }
    lines.remove(0);
    if lines.last().is_some_and(|l| l.trim().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}

/// How much of a trailing colon run to withhold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// More text may follow: any run that could grow into an opening marker
    /// stays hidden, down to a single `:`.
    Streaming,
    /// The response has ended: only a run that already reads as `:::` is
    /// withheld.
    Complete,
}

impl Tail {
    fn shortest_prefix(self) -> usize {
        match self {
            Self::Streaming => 1,
            Self::Complete => 3,
        }
    }
}

fn is_covered(covered: &[(usize, usize)], pos: usize) -> bool {
    covered.iter().any(|(s, e)| pos >= *s && pos < *e)
}

/// Byte offset of the first block or tool call that has opened but not
/// closed yet, or `buffer.len()`. `covered` lists spans already matched.
pub fn open_block_start(buffer: &str, covered: &[(usize, usize)]) -> usize {
    let mut cut = buffer.len();
    for (open, close) in [(FILE_OPEN, FILE_CLOSE), (TOOL_OPEN, TOOL_CLOSE)] {
        for (pos, _) in buffer.match_indices(open) {
            if pos >= cut || is_covered(covered, pos) {
                continue;
            }
            let after = pos + open.len();
            if !buffer[after..].contains(close) {
                cut = cut.min(pos);
                break;
            }
        }
    }
    cut
}

/// Byte offset from which `buffer` must stay hidden: an open block, or a
/// trailing run that may still become an opening marker.
pub fn pending_tail_start(buffer: &str, covered: &[(usize, usize)], tail: Tail) -> usize {
    let mut cut = open_block_start(buffer, covered);

    for marker in [FILE_OPEN, TOOL_OPEN] {
        for len in (tail.shortest_prefix()..marker.len()).rev() {
            let prefix = &marker[..len];
            if buffer.len() >= len
                && buffer.ends_with(prefix)
                && !is_covered(covered, buffer.len() - len)
            {
                cut = cut.min(buffer.len() - len);
                break;
            }
        }
    }

    cut
}
