use crate::state::{FileItem, Framework, Message, Role, Session, ToolCall};
use crate::types::ApiMessage;

const NO_FILES: &str = "(No files created yet)";

const PROTOCOL_RULES: &str = r#"*** FILE OPERATIONS PROTOCOL ***
You control the project's file system through the following syntax.

1. CREATE / OVERWRITE / EDIT A FILE
   Always send the COMPLETE file content. Never use placeholders such as "// ... same code".
   :::FILE path/to/filename.ext:::
   [FULL FILE CONTENT]
   :::END_FILE:::

2. RENAME / MOVE A FILE
   :::TOOL_CALL {"name": "rename_file", "args": {"oldPath": "src/old.tsx", "newPath": "src/new.tsx"}} :::

3. RENAME A FOLDER
   :::TOOL_CALL {"name": "rename_folder", "args": {"oldPath": "src/components", "newPath": "src/ui"}} :::

4. DELETE A FILE
   :::TOOL_CALL {"name": "delete_file", "args": {"path": "src/unused.ts"}} :::

5. CHANGE THE PROJECT TITLE
   :::TOOL_CALL {"name": "rename_chat", "args": {"title": "New Project Title"}} :::

*** GLOBAL RULES ***
1. The project state above is complete. Do not invent files that are not listed.
2. Inside a :::FILE::: block, output the entire file.
3. Style the app with Tailwind CSS."#;

const REACT_GUIDELINES: &str = r#"*** REACT GUIDELINES ***
1. Functional components with hooks.
2. The entry point is 'src/index.tsx'; 'src/App.tsx' is the main component; reusable parts live in 'src/components/'.
3. Icons come from 'lucide-react', e.g. `import { Home } from 'lucide-react';`.
4. Tailwind classes go directly in `className`.
5. Components use `export default`."#;

const ANGULAR_GUIDELINES: &str = r#"*** ANGULAR GUIDELINES ***
1. Standalone components (`standalone: true`) only; avoid NgModules.
2. The entry point is 'src/main.ts', bootstrapping 'AppComponent' with `bootstrapApplication`.
3. The root component lives in 'src/app/app.component.ts'.
4. Prefer inline templates and styles; separate .html/.css files are fine for large components.
5. Use signals (`signal()`, `computed()`, `effect()`) for state.
6. Style with Tailwind utility classes in templates."#;

/// System prompt for a session: role, full project state, protocol, and
/// framework guidelines.
pub fn system_instruction(framework: Framework, files: &[FileItem]) -> String {
    let guidelines = match framework {
        Framework::React => REACT_GUIDELINES,
        Framework::Angular => ANGULAR_GUIDELINES,
    };
    format!(
        "You are an expert {label} engineer working inside the Pairpad IDE.\n\
         Your goal is to build and maintain a high-quality {label} application.\n\n\
         *** CURRENT PROJECT STATE ***\n{context}\n\n{PROTOCOL_RULES}\n\n{guidelines}\n",
        label = framework.label(),
        context = file_context(files),
    )
}

fn file_context(files: &[FileItem]) -> String {
    let blocks: Vec<String> = files
        .iter()
        .filter(|f| f.is_file())
        .map(|f| {
            format!(
                "--- START OF FILE {path} ---\n{content}\n--- END OF FILE {path} ---",
                path = f.path,
                content = f.content
            )
        })
        .collect();
    if blocks.is_empty() {
        NO_FILES.to_string()
    } else {
        blocks.join("\n\n")
    }
}

/// Outgoing `messages`: the system prompt followed by the session history.
/// Messages that would be blank are left out.
pub fn to_api_messages(session: &Session) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(session.messages.len() + 1);
    messages.push(ApiMessage::new(
        "system",
        system_instruction(session.framework, &session.files),
    ));
    messages.extend(session.messages.iter().filter_map(history_entry));
    messages
}

fn history_entry(message: &Message) -> Option<ApiMessage> {
    let role = match message.role {
        Role::User => "user",
        Role::Model => "assistant",
    };

    let mut content = message.text.clone();
    let calls: Vec<String> = message.tool_calls.iter().filter_map(tool_call_line).collect();
    if !calls.is_empty() {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&calls.join("\n"));
    }

    (!content.trim().is_empty()).then(|| ApiMessage::new(role, content))
}

fn tool_call_line(call: &ToolCall) -> Option<String> {
    match serde_json::to_string(&call.op) {
        Ok(json) => Some(format!(":::TOOL_CALL {json} :::")),
        Err(error) => {
            tracing::warn!(%error, id = %call.id, "could not re-serialize tool call");
            None
        }
    }
}
