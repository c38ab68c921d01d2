use super::TurnUpdate;
use crate::protocol::Extraction;
use crate::state::{FileItem, Reconciled, ToolCall};
use crate::util::append_incremental_suffix;
use tokio::sync::mpsc;

pub(super) fn emit_turn_update(
    update_tx: Option<&mpsc::UnboundedSender<TurnUpdate>>,
    update: TurnUpdate,
) {
    if let Some(tx) = update_tx {
        let _ = tx.send(update);
    }
}

/// What the listener has already been told during one turn, so each
/// re-derivation only emits what changed.
pub(super) struct TurnView {
    shown_text: String,
    tool_calls: Vec<ToolCall>,
    title: String,
    files: Vec<FileItem>,
}

impl TurnView {
    pub(super) fn new(pre_title: &str, pre_files: &[FileItem]) -> Self {
        Self {
            shown_text: String::new(),
            tool_calls: Vec::new(),
            title: pre_title.to_string(),
            files: pre_files.to_vec(),
        }
    }

    pub(super) fn publish(
        &mut self,
        extraction: &Extraction,
        reconciled: &Reconciled,
        update_tx: Option<&mpsc::UnboundedSender<TurnUpdate>>,
    ) {
        let extends = extraction.text.starts_with(self.shown_text.as_str())
            || self.shown_text.starts_with(extraction.text.as_str());
        let appended = append_incremental_suffix(&mut self.shown_text, &extraction.text);
        if !appended.is_empty() {
            let update = if extends {
                TurnUpdate::Text(appended)
            } else {
                TurnUpdate::TextReset(appended)
            };
            emit_turn_update(update_tx, update);
        }

        if reconciled.tool_calls != self.tool_calls {
            self.tool_calls = reconciled.tool_calls.clone();
            emit_turn_update(update_tx, TurnUpdate::ToolCalls(self.tool_calls.clone()));
        }

        if reconciled.title != self.title {
            self.title = reconciled.title.clone();
            emit_turn_update(update_tx, TurnUpdate::Title(self.title.clone()));
        }

        if reconciled.files != self.files {
            self.files = reconciled.files.clone();
            emit_turn_update(update_tx, TurnUpdate::Files(self.files.clone()));
        }
    }
}
