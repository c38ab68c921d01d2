//! Short-lived references standing in for file content inside a preview
//! document.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Creates and releases content handles. A handle is the string a document
/// uses in place of the content (an import-map target, a `src` value).
pub trait ContentHandles: Send {
    fn create(&mut self, content: &[u8], mime: &str) -> String;
    fn release(&mut self, handle: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub mime: String,
    pub content: Vec<u8>,
}

/// In-process handle table. Clones share the same table, so a host can
/// serve `blob:` handles while a scheduler owns another clone.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    entries: Arc<Mutex<HashMap<String, BlobEntry>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles created and not yet released.
    pub fn live(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn get(&self, handle: &str) -> Option<BlobEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(handle).cloned())
    }
}

impl ContentHandles for BlobRegistry {
    fn create(&mut self, content: &[u8], mime: &str) -> String {
        let handle = format!("blob:pairpad/{}", Uuid::new_v4());
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(
                    handle.clone(),
                    BlobEntry {
                        mime: mime.to_string(),
                        content: content.to_vec(),
                    },
                );
            }
            Err(_) => tracing::warn!("blob registry lock poisoned; handle will not resolve"),
        }
        handle
    }

    fn release(&mut self, handle: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(handle);
        }
    }
}

/// Self-contained `data:` URLs, for documents written to disk. Nothing to
/// release; `live` still tracks the balance of creates and releases.
#[derive(Debug, Default)]
pub struct DataUrlHandles {
    live: usize,
}

impl DataUrlHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

impl ContentHandles for DataUrlHandles {
    fn create(&mut self, content: &[u8], mime: &str) -> String {
        self.live += 1;
        format!("data:{mime};base64,{}", STANDARD.encode(content))
    }

    fn release(&mut self, _handle: &str) {
        self.live = self.live.saturating_sub(1);
    }
}
