//! Starter file sets offered when a session is created.

use crate::state::{FileItem, Framework};
use crate::util::parent_path;
use uuid::Uuid;

/// `(path, content)`; `None` marks a folder.
type Entry = (&'static str, Option<&'static str>);

const TAILWIND_LAYERS: &str = "@tailwind base;\n@tailwind components;\n@tailwind utilities;";

const REACT_PACKAGE_JSON: &str = r#"{
  "name": "pairpad-react-app",
  "version": "0.0.0",
  "private": true,
  "type": "module",
  "dependencies": {
    "react": "^18.3.1",
    "react-dom": "^18.3.1",
    "lucide-react": "^0.344.0"
  }
}"#;

const REACT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Pairpad App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/index.tsx"></script>
  </body>
</html>"#;

const REACT_INDEX_TSX: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';
import './index.css';

ReactDOM.createRoot(document.getElementById('root')!).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>,
);"#;

const REACT_APP_TSX: &str = r#"import React from 'react';

function App() {
  return (
    <div className="min-h-screen bg-gray-950 text-white flex items-center justify-center">
      <div className="text-center">
        <h1 className="text-4xl font-bold mb-4">Hello World</h1>
        <p className="text-gray-400">Start editing to see some magic happen!</p>
      </div>
    </div>
  );
}

export default App;"#;

const ANGULAR_MAIN_TS: &str = r#"import { bootstrapApplication } from '@angular/platform-browser';
import { AppComponent } from './app/app.component';

bootstrapApplication(AppComponent)
  .catch((err) => console.error(err));"#;

const ANGULAR_APP_COMPONENT: &str = r#"import { Component } from '@angular/core';
import { CommonModule } from '@angular/common';

@Component({
  selector: 'app-root',
  standalone: true,
  imports: [CommonModule],
  template: `
    <div class="min-h-screen bg-gray-950 text-white flex items-center justify-center">
      <div class="text-center">
        <h1 class="text-4xl font-bold mb-4">Hello Angular</h1>
        <p class="text-gray-400">Start editing to see some magic happen!</p>
      </div>
    </div>
  `
})
export class AppComponent {
  title = 'demo';
}"#;

const ANGULAR_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Angular App</title>
  <base href="/">
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <app-root></app-root>
</body>
</html>"#;

const REACT: &[Entry] = &[
    ("package.json", Some(REACT_PACKAGE_JSON)),
    ("index.html", Some(REACT_INDEX_HTML)),
    ("src", None),
    ("src/index.tsx", Some(REACT_INDEX_TSX)),
    ("src/App.tsx", Some(REACT_APP_TSX)),
    ("src/index.css", Some(TAILWIND_LAYERS)),
];

const ANGULAR: &[Entry] = &[
    ("src", None),
    ("src/main.ts", Some(ANGULAR_MAIN_TS)),
    ("src/app", None),
    ("src/app/app.component.ts", Some(ANGULAR_APP_COMPONENT)),
    ("src/styles.css", Some(TAILWIND_LAYERS)),
    ("src/index.html", Some(ANGULAR_INDEX_HTML)),
];

/// Starter files for `framework`, with ids derived from `session_id`.
pub fn scaffold(session_id: Uuid, framework: Framework) -> Vec<FileItem> {
    let entries = match framework {
        Framework::React => REACT,
        Framework::Angular => ANGULAR,
    };

    let mut files: Vec<FileItem> = Vec::with_capacity(entries.len());
    for (path, content) in entries {
        let parent = parent_path(path)
            .and_then(|parent| files.iter().find(|f| !f.is_file() && f.path == parent))
            .map(|folder| folder.id);
        let item = match content {
            Some(content) => FileItem::file(session_id, path, *content),
            None => FileItem::folder(session_id, path),
        };
        files.push(item.with_parent(parent));
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::file_id;

    #[test]
    fn test_react_scaffold_links_parents() {
        let session = Uuid::new_v4();
        let files = scaffold(session, Framework::React);
        let app = files.iter().find(|f| f.path == "src/App.tsx").unwrap();
        assert_eq!(app.id, file_id(session, "src/App.tsx"));
        assert_eq!(app.parent_id, Some(file_id(session, "src")));
        let html = files.iter().find(|f| f.path == "index.html").unwrap();
        assert_eq!(html.parent_id, None);
    }

    #[test]
    fn test_angular_scaffold_nests_app_folder() {
        let session = Uuid::new_v4();
        let files = scaffold(session, Framework::Angular);
        let component = files
            .iter()
            .find(|f| f.path == "src/app/app.component.ts")
            .unwrap();
        assert_eq!(component.parent_id, Some(file_id(session, "src/app")));
        assert!(files.iter().any(|f| f.path == "src/main.ts"));
    }
}
