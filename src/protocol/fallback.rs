//! Bare code fences treated as files when the model skipped the explicit
//! protocol.

use super::markers::CODE_FENCE;
use super::DetectedFile;

/// Fences at or below this many characters are not worth a file.
const MIN_FENCE_CHARS: usize = 20;

/// Fence matches that qualify as files, keyed by their match index.
pub(super) fn fenced_files(buffer: &str) -> Vec<(usize, DetectedFile)> {
    CODE_FENCE
        .captures_iter(buffer)
        .enumerate()
        .filter_map(|(index, caps)| {
            let content = caps.get(1)?.as_str();
            if content.chars().count() <= MIN_FENCE_CHARS {
                return None;
            }
            let path = comment_path(content).unwrap_or_else(|| default_path(index));
            Some((
                index,
                DetectedFile {
                    path,
                    content: content.to_string(),
                },
            ))
        })
        .collect()
}

pub(super) fn default_path(index: usize) -> String {
    format!("src/file_{index}.tsx")
}

/// Path named by a leading `// path` or `/* path */` line, if it looks like
/// one.
fn comment_path(content: &str) -> Option<String> {
    let first = content.split('\n').next()?.trim();
    let inner = if let Some(rest) = first.strip_prefix("//") {
        rest
    } else if let Some(rest) = first.strip_prefix("/*") {
        rest.strip_suffix("*/").unwrap_or(rest)
    } else {
        return None;
    };

    let candidate = inner.trim_matches(|c: char| c == '*' || c == '/' || c.is_whitespace());
    if candidate.is_empty() || candidate.contains(char::is_whitespace) {
        return None;
    }
    (candidate.contains('/') || candidate.contains('.')).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_path_forms() {
        assert_eq!(comment_path("// src/App.tsx\nx"), Some("src/App.tsx".into()));
        assert_eq!(comment_path("/* styles.css */\nx"), Some("styles.css".into()));
        assert_eq!(comment_path("// just a note\nx"), None);
        assert_eq!(comment_path("// helper\nx"), None);
        assert_eq!(comment_path("const a = 1;"), None);
    }

    #[test]
    fn test_short_fences_are_discarded_but_keep_their_index() {
        let buffer = "```\nok\n```\ntext\n```tsx\nexport default function App() {}\n```";
        let files = fenced_files(buffer);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, 1);
        assert_eq!(files[0].1.path, default_path(1));
    }

    #[test]
    fn test_leading_comment_names_the_file() {
        let buffer = "```ts\n// src/utils/math.ts\nexport const add = (a: number, b: number) => a + b;\n```";
        let files = fenced_files(buffer);
        assert_eq!(files[0].1.path, "src/utils/math.ts");
        assert!(files[0].1.content.starts_with("// src/utils/math.ts"));
    }
}
