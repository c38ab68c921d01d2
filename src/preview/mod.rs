//! Turns a session's file set into a runnable document.
//!
//! Scripts and assets are exposed through content handles, scripts are
//! resolved through an import map, and the in-page compiler lowers TSX at
//! load time. Each rebuild is a new generation; the handles of the previous
//! generation are released before the next one is created.

pub mod assemble;
pub mod handles;
pub mod rewrite;
pub mod scheduler;

pub use assemble::{assemble, mime_for, Assembly};
pub use handles::{BlobEntry, BlobRegistry, ContentHandles, DataUrlHandles};
pub use rewrite::{AssetRewriter, QuotedLiteralRewriter};
pub use scheduler::{Generations, PreviewFrame, PreviewScheduler};
