use crate::state::{scaffold, Framework, Session};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Load/save capability for the whole session list.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Vec<Session>>;
    fn save(&self, sessions: &[Session]) -> Result<()>;
}

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Vec<Session>>,
}

impl MemoryStore {
    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            snapshot: Mutex::new(sessions),
        }
    }

    pub fn snapshot(&self) -> Vec<Session> {
        self.snapshot
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Vec<Session>> {
        Ok(self.snapshot())
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *guard = sessions.to_vec();
        Ok(())
    }
}

/// Pretty-printed JSON snapshot in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Session>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session store {}", self.path.display()))?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse session store {}", self.path.display()))
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(sessions).context("Failed to serialize sessions")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session store {}", self.path.display()))
    }
}

/// In-memory session map backed by an injected store.
///
/// Sessions are replaced whole on every write and the full snapshot is saved
/// after each mutation. Save failures are logged and otherwise ignored.
pub struct SessionRepository {
    sessions: HashMap<Uuid, Session>,
    store: Box<dyn SessionStore>,
}

impl SessionRepository {
    pub fn open(store: Box<dyn SessionStore>) -> Result<Self> {
        let sessions = store
            .load()?
            .into_iter()
            .map(|session| (session.id, session))
            .collect();
        Ok(Self { sessions, store })
    }

    pub fn in_memory() -> Self {
        Self {
            sessions: HashMap::new(),
            store: Box::new(MemoryStore::default()),
        }
    }

    /// Most recently modified first.
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn get(&self, id: Uuid) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn create(&mut self, framework: Framework, with_scaffold: bool) -> Uuid {
        let mut session = Session::new(framework);
        if with_scaffold {
            session.files = scaffold(session.id, framework);
        }
        let id = session.id;
        self.sessions.insert(id, session);
        self.persist();
        id
    }

    pub fn delete(&mut self, id: Uuid) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn rename(&mut self, id: Uuid, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        self.update(id, |session| session.title = title.to_string())
    }

    pub fn set_framework(&mut self, id: Uuid, framework: Framework) -> bool {
        self.update(id, |session| session.framework = framework)
    }

    /// Applies `edit` to a copy of the session and swaps the copy in.
    pub fn update(&mut self, id: Uuid, edit: impl FnOnce(&mut Session)) -> bool {
        let Some(current) = self.sessions.get(&id) else {
            return false;
        };
        let mut next = current.clone();
        edit(&mut next);
        if next == *current {
            return true;
        }
        next.touch();
        self.sessions.insert(id, next);
        self.persist();
        true
    }

    fn persist(&self) {
        let snapshot: Vec<Session> = self.list().into_iter().cloned().collect();
        if let Err(error) = self.store.save(&snapshot) {
            tracing::warn!(error = %format!("{error:#}"), "failed to save sessions");
        }
    }
}
