use super::handles::ContentHandles;
use super::rewrite::AssetRewriter;
use crate::state::FileItem;
use std::collections::BTreeMap;

const SCRIPT_EXTENSIONS: [&str; 4] = ["tsx", "ts", "jsx", "js"];
const ROOT_DOCUMENT: &str = "index.html";
const ENTRY_CANDIDATES: [&str; 2] = ["index.tsx", "main.tsx"];

const BABEL_TAG: &str = r#"<script src="https://unpkg.com/@babel/standalone/babel.min.js"></script>"#;
const TAILWIND_TAG: &str = r#"<script src="https://cdn.tailwindcss.com"></script>"#;

/// Bare specifiers every preview can import.
const BASE_IMPORTS: [(&str, &str); 3] = [
    ("react", "https://esm.sh/react@18.2.0"),
    ("react-dom/client", "https://esm.sh/react-dom@18.2.0/client"),
    ("lucide-react", "https://esm.sh/lucide-react@0.263.1"),
];

/// One assembled preview: the document and every handle it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub document: String,
    pub imports: BTreeMap<String, String>,
    /// Owned by the generation that created them; release before discarding.
    pub handles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileRole {
    Script,
    Stylesheet,
    Document,
    Asset,
}

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

fn role(file: &FileItem) -> FileRole {
    match extension(&file.name) {
        Some(ext) if SCRIPT_EXTENSIONS.contains(&ext) => FileRole::Script,
        Some("css") => FileRole::Stylesheet,
        Some("html") => FileRole::Document,
        _ => FileRole::Asset,
    }
}

pub fn mime_for(name: &str) -> &'static str {
    match extension(name) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Import specifier for a project path: `./src/App.tsx`.
fn relative_specifier(path: &str) -> String {
    match path.strip_prefix('/') {
        Some(rest) => format!("./{rest}"),
        None => format!("./{path}"),
    }
}

fn strip_script_extension(specifier: &str) -> &str {
    SCRIPT_EXTENSIONS
        .iter()
        .find_map(|ext| {
            specifier
                .strip_suffix(ext)
                .and_then(|rest| rest.strip_suffix('.'))
        })
        .unwrap_or(specifier)
}

/// Builds a runnable document for `files`, creating handles through
/// `handles`. Every handle created is listed in the returned assembly.
pub fn assemble(
    files: &[FileItem],
    handles: &mut dyn ContentHandles,
    rewriter: &dyn AssetRewriter,
) -> Assembly {
    let files: Vec<&FileItem> = files.iter().filter(|f| f.is_file()).collect();
    let mut created = Vec::new();

    let mut assets = BTreeMap::new();
    for file in files.iter().filter(|f| role(f) == FileRole::Asset) {
        let handle = handles.create(file.content.as_bytes(), mime_for(&file.name));
        assets.insert(file.path.clone(), handle.clone());
        assets.insert(format!("./{}", file.path), handle.clone());
        created.push(handle);
    }

    let mut imports: BTreeMap<String, String> = BASE_IMPORTS
        .iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();
    for file in files.iter().filter(|f| role(f) == FileRole::Script) {
        let source = rewriter.rewrite(&file.content, &assets);
        let handle = handles.create(source.as_bytes(), "text/javascript");
        let specifier = relative_specifier(&file.path);
        imports.insert(strip_script_extension(&specifier).to_string(), handle.clone());
        imports.insert(specifier, handle.clone());
        created.push(handle);
    }

    let styles = files
        .iter()
        .filter(|f| role(f) == FileRole::Stylesheet)
        .map(|f| f.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let import_map = import_map_json(&imports);

    let root = files
        .iter()
        .find(|f| f.name == ROOT_DOCUMENT && !f.content.is_empty());
    let document = match root {
        Some(root) => inject_into(&root.content, &import_map, &styles),
        None => synthesize(&files, &import_map, &styles),
    };

    tracing::debug!(
        specifiers = imports.len(),
        handles = created.len(),
        "assembled preview"
    );

    Assembly {
        document,
        imports,
        handles: created,
    }
}

fn import_map_json(imports: &BTreeMap<String, String>) -> String {
    let map = serde_json::json!({ "imports": imports });
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| r#"{"imports":{}}"#.to_string())
}

fn head_injection(import_map: &str, styles: &str) -> String {
    format!(
        "<script type=\"importmap\">\n{import_map}\n</script>\n{BABEL_TAG}\n<style>{styles}</style>\n"
    )
}

/// Adds the import map, compiler, and styles to a project-supplied document
/// unless it already carries an import map.
fn inject_into(base: &str, import_map: &str, styles: &str) -> String {
    if base.contains("importmap") {
        return base.to_string();
    }
    let injection = head_injection(import_map, styles);
    match base.find("<head>") {
        Some(at) => {
            let split = at + "<head>".len();
            format!("{}\n{injection}{}", &base[..split], &base[split..])
        }
        None => format!("<head>\n{injection}</head>\n{base}"),
    }
}

fn synthesize(files: &[&FileItem], import_map: &str, styles: &str) -> String {
    let entry = files
        .iter()
        .find(|f| ENTRY_CANDIDATES.iter().any(|c| f.path.contains(*c)))
        .map(|f| f.path.as_str());
    let boot = match entry {
        Some(path) => format!("import '{}';", relative_specifier(path)),
        None => "import App from './src/App';\n\
                 const root = createRoot(document.getElementById('root'));\n\
                 root.render(<App />);"
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Pairpad Preview</title>
    {TAILWIND_TAG}
    {BABEL_TAG}
    <style>
{styles}
body {{ background-color: white; color: black; }}
    </style>
    <script type="importmap">
{import_map}
    </script>
  </head>
  <body>
    <div id="root"></div>
    <script type="text/babel" data-type="module">
import React from 'react';
import {{ createRoot }} from 'react-dom/client';
{boot}
    </script>
  </body>
</html>
"#
    )
}
