use pairpad::protocol::{extract, DetectedFile};
use pairpad::state::{reconcile, FileItem, ToolOp, ToolStatus, DEFAULT_SESSION_TITLE};
use uuid::Uuid;

const MIXED: &str = "Renaming and adding a page.\n\
:::TOOL_CALL {\"name\":\"rename_chat\",\"args\":{\"title\":\"Shop\"}} :::\n\
:::FILE src/pages/Cart.tsx:::\n\
```tsx\nexport const Cart = () => <ul />;\n```\n\
:::END_FILE:::\n\
:::TOOL_CALL {\"name\":\"delete_file\",\"args\":{\"path\":\"src/old.css\"}} :::\n\
All set.";

fn project(session: Uuid) -> Vec<FileItem> {
    vec![
        FileItem::folder(session, "src"),
        FileItem::file(session, "src/App.tsx", "app"),
        FileItem::file(session, "src/old.css", "body {}"),
    ]
}

#[test]
fn test_prefix_sequence_converges_to_full_extraction() {
    let session = Uuid::new_v4();
    let pre = project(session);
    let full = extract(MIXED, &pre);

    for (end, _) in MIXED.char_indices().skip(1) {
        let partial = extract(&MIXED[..end], &pre);
        assert!(
            !partial.text.contains(":::"),
            "protocol syntax leaked at byte {end}: {:?}",
            partial.text
        );
        assert!(
            partial.files.iter().all(|f| f.path == "src/pages/Cart.tsx"),
            "fence inside the open block became a file at byte {end}"
        );
    }

    let mut replayed = String::new();
    for chunk in MIXED.as_bytes().chunks(7) {
        replayed.push_str(std::str::from_utf8(chunk).unwrap());
        extract(&replayed, &pre);
    }
    assert_eq!(extract(&replayed, &pre), full);
}

#[test]
fn test_pre_existing_path_is_updated_once_per_emission() {
    let session = Uuid::new_v4();
    let pre = project(session);
    let buffer = ":::FILE src/App.tsx:::\nv1\n:::END_FILE:::\n:::FILE src/App.tsx:::\nv2\n:::END_FILE:::";

    let extraction = extract(buffer, &pre);
    let updates = extraction
        .tool_calls
        .iter()
        .filter(|c| matches!(&c.op, ToolOp::UpdateFile { path } if path == "src/App.tsx"))
        .count();
    assert_eq!(updates, 2);
    assert!(extraction
        .tool_calls
        .iter()
        .all(|c| !matches!(c.op, ToolOp::CreateFile { .. })));

    let reconciled = reconcile(session, &pre, DEFAULT_SESSION_TITLE, &extraction);
    let apps: Vec<&FileItem> = reconciled
        .files
        .iter()
        .filter(|f| f.path == "src/App.tsx")
        .collect();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].content, "v2");
}

#[test]
fn test_rescan_of_unchanged_buffer_is_identical() {
    let pre = project(Uuid::new_v4());
    assert_eq!(extract(MIXED, &pre), extract(MIXED, &pre));
}

#[test]
fn test_mixed_buffer_reconciles_every_operation() {
    let session = Uuid::new_v4();
    let pre = project(session);
    let extraction = extract(MIXED, &pre);
    let reconciled = reconcile(session, &pre, DEFAULT_SESSION_TITLE, &extraction);

    assert_eq!(reconciled.title, "Shop");
    let paths: Vec<&str> = reconciled.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["src", "src/App.tsx", "src/pages/Cart.tsx"]);
    let cart = &reconciled.files[2];
    assert_eq!(cart.content, "export const Cart = () => <ul />;");
    assert!(reconciled
        .tool_calls
        .iter()
        .all(|c| c.status == ToolStatus::Success));
    assert!(extraction.text.starts_with("Renaming and adding a page."));
    assert!(extraction.text.ends_with("All set."));
}

#[test]
fn test_rename_folder_rewrites_prefix_only() {
    let session = Uuid::new_v4();
    let pre = vec![
        FileItem::folder(session, "a"),
        FileItem::folder(session, "a/b"),
        FileItem::file(session, "a/b/x.ts", "x"),
        FileItem::file(session, "a/b/deep/y.ts", "y"),
        FileItem::file(session, "a/z.ts", "z"),
    ];
    let buffer =
        ":::TOOL_CALL {\"name\":\"rename_folder\",\"args\":{\"oldPath\":\"a/b\",\"newPath\":\"a/c\"}} :::";
    let reconciled = reconcile(session, &pre, "t", &extract(buffer, &pre));

    let mut paths: Vec<&str> = reconciled.files.iter().map(|f| f.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["a", "a/c", "a/c/deep/y.ts", "a/c/x.ts", "a/z.ts"]);
    let z = reconciled.files.iter().find(|f| f.path == "a/z.ts");
    assert_eq!(z, pre.iter().find(|f| f.path == "a/z.ts"));
}

#[test]
fn test_delete_removes_exactly_one_and_unknown_is_noop() {
    let session = Uuid::new_v4();
    let pre = project(session);

    let delete = ":::TOOL_CALL {\"name\":\"delete_file\",\"args\":{\"path\":\"src/old.css\"}} :::";
    let reconciled = reconcile(session, &pre, "t", &extract(delete, &pre));
    assert_eq!(reconciled.files.len(), pre.len() - 1);
    assert_eq!(reconciled.files[..], pre[..2]);

    let missing = ":::TOOL_CALL {\"name\":\"delete_file\",\"args\":{\"path\":\"nope.ts\"}} :::";
    let reconciled = reconcile(session, &pre, "t", &extract(missing, &pre));
    assert_eq!(reconciled.files, pre);
    assert_eq!(reconciled.tool_calls[0].status, ToolStatus::Error);
}

#[test]
fn test_single_file_block_example() {
    let extraction = extract(":::FILE src/App.tsx:::\nconsole.log(1)\n:::END_FILE:::", &[]);

    assert_eq!(
        extraction.files,
        vec![DetectedFile {
            path: "src/App.tsx".to_string(),
            content: "console.log(1)".to_string(),
        }]
    );
    assert!(extraction.text.starts_with("<div class=\"file-generated\""));
    assert!(extraction.text.contains("data-path=\"src/App.tsx\""));
    assert_eq!(extraction.structural_ops().count(), 0);
}

#[test]
fn test_rename_chat_example() {
    let session = Uuid::new_v4();
    let buffer = ":::TOOL_CALL {\"name\":\"rename_chat\",\"args\":{\"title\":\"Foo\"}} :::";
    let extraction = extract(buffer, &[]);
    let reconciled = reconcile(session, &[], DEFAULT_SESSION_TITLE, &extraction);

    assert_eq!(reconciled.title, "Foo");
    assert_eq!(extraction.text, "");
    assert!(extraction.files.is_empty());
    assert!(reconciled.files.is_empty());
}

#[test]
fn test_malformed_tool_call_does_not_stop_later_blocks() {
    let buffer = ":::TOOL_CALL {\"name\": rename_chat, oops} :::\n\
                  :::FILE src/ok.ts:::\nexport {};\n:::END_FILE:::";
    let extraction = extract(buffer, &[]);

    assert_eq!(extraction.files.len(), 1);
    assert_eq!(extraction.files[0].path, "src/ok.ts");
    assert_eq!(extraction.structural_ops().count(), 0);
    assert!(!extraction.text.contains("oops"));
}

#[test]
fn test_plain_markdown_fence_is_picked_up_without_blocks() {
    let buffer = "Try this:\n```tsx\n// src/components/Button.tsx\nexport const Button = () => null;\n```";
    let extraction = extract(buffer, &[]);

    assert_eq!(extraction.files.len(), 1);
    assert_eq!(extraction.files[0].path, "src/components/Button.tsx");
    assert_eq!(extraction.tool_calls[0].id, "md-0");
    assert_eq!(
        extraction.tool_calls[0].result.as_deref(),
        Some("Extracted from Markdown")
    );
}
