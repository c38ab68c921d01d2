pub mod reconcile;
pub mod repository;
pub mod scaffold;
pub mod session;
pub mod usage;

pub use reconcile::{reconcile, Reconciled};
pub use repository::{JsonFileStore, MemoryStore, SessionRepository, SessionStore};
pub use scaffold::scaffold;
pub use session::{
    file_id, FileItem, FileKind, Framework, Message, Role, Session, TokenUsage, ToolCall, ToolOp,
    ToolStatus, DEFAULT_SESSION_TITLE,
};
pub use usage::{cost_delta, TurnUsage};
