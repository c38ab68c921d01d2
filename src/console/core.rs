use super::history::to_api_messages;
use super::streaming::{emit_turn_update, TurnView};
use super::{ConsoleManager, TurnOutcome, TurnUpdate};
use crate::api::stream::StreamParser;
use crate::protocol::{extract, extract_complete, Extraction};
use crate::state::{reconcile, Message, Session, TokenUsage, TurnUsage};
use crate::types::{ApiMessage, StreamEvent};
use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Result of consuming one response stream.
#[derive(Default)]
struct StreamSummary {
    tokens: Option<TokenUsage>,
    cancelled: bool,
}

impl ConsoleManager {
    /// Runs one turn of `session_id`: sends `input`, streams the response and
    /// folds every delta into the session.
    ///
    /// Errors before the request (missing credential, unknown session) leave
    /// the session untouched. A transport or server failure keeps whatever
    /// the stream already produced, records usage, and is then returned.
    /// Cancelling `cancel` stops the stream; no further writes happen for the
    /// turn and usage is not recorded.
    pub async fn run_turn(
        &mut self,
        session_id: Uuid,
        input: &str,
        cancel: &CancellationToken,
        update_tx: Option<&mpsc::UnboundedSender<TurnUpdate>>,
    ) -> Result<TurnOutcome> {
        self.client.ensure_credential()?;
        if self.repository.get(session_id).is_none() {
            anyhow::bail!("no session with id {session_id}");
        }

        let start_balance = tokio::select! {
            _ = cancel.cancelled() => None,
            balance = self.balance.balance() => balance,
        };

        let user = Message::user(input);
        self.repository
            .update(session_id, |session| session.messages.push(user));
        let session = self
            .repository
            .get(session_id)
            .cloned()
            .context("session vanished while starting a turn")?;
        let api_messages = to_api_messages(&session);

        let model = Message::model();
        let message_id = model.id;
        self.repository
            .update(session_id, |session| session.messages.push(model));

        let streamed = self
            .stream_response(session_id, message_id, &session, &api_messages, cancel, update_tx)
            .await;
        let cancelled = cancel.is_cancelled()
            || streamed.as_ref().is_ok_and(|summary| summary.cancelled);

        let mut usage = TurnUsage {
            start_balance,
            ..TurnUsage::default()
        };
        if cancelled {
            tracing::info!(%session_id, "turn cancelled");
            return Ok(TurnOutcome {
                message_id,
                cancelled: true,
                usage,
            });
        }

        usage.tokens = streamed.as_ref().ok().and_then(|summary| summary.tokens);
        usage.end_balance = self.balance.balance().await;
        self.repository
            .update(session_id, |session| usage.apply(session, message_id));
        emit_turn_update(
            update_tx,
            TurnUpdate::Usage {
                tokens: usage.tokens,
                cost: usage.cost(),
            },
        );

        streamed?;
        Ok(TurnOutcome {
            message_id,
            cancelled: false,
            usage,
        })
    }

    async fn stream_response(
        &mut self,
        session_id: Uuid,
        message_id: Uuid,
        session: &Session,
        api_messages: &[ApiMessage],
        cancel: &CancellationToken,
        update_tx: Option<&mpsc::UnboundedSender<TurnUpdate>>,
    ) -> Result<StreamSummary> {
        let mut summary = StreamSummary::default();
        let mut stream = self.client.create_stream(api_messages, cancel).await?;
        let mut parser = StreamParser::new();
        let mut buffer = String::new();
        let mut view = TurnView::new(&session.title, &session.files);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                chunk = stream.next() => chunk,
            };
            let exhausted = chunk.is_none();
            let events = match chunk {
                Some(chunk) => parser.process(&chunk?),
                None => parser.finish(),
            };

            let mut grew = false;
            for event in events {
                match event {
                    StreamEvent::Delta(text) => {
                        buffer.push_str(&text);
                        grew = true;
                    }
                    StreamEvent::Usage(usage) => summary.tokens = Some(usage.into()),
                    StreamEvent::Done => {}
                }
            }
            if grew {
                let extraction = extract(&buffer, &session.files);
                self.fold_buffer(session_id, message_id, session, extraction, &mut view, update_tx);
            }

            if exhausted || parser.is_done() {
                break;
            }
        }

        if !buffer.is_empty() {
            let extraction = extract_complete(&buffer, &session.files);
            self.fold_buffer(session_id, message_id, session, extraction, &mut view, update_tx);
        }
        tracing::debug!(%session_id, chars = buffer.len(), "response stream finished");
        Ok(summary)
    }

    /// Folds a derivation of the whole buffer into the pre-turn session.
    fn fold_buffer(
        &mut self,
        session_id: Uuid,
        message_id: Uuid,
        pre_turn: &Session,
        extraction: Extraction,
        view: &mut TurnView,
        update_tx: Option<&mpsc::UnboundedSender<TurnUpdate>>,
    ) {
        let reconciled = reconcile(session_id, &pre_turn.files, &pre_turn.title, &extraction);
        tracing::debug!(
            files = extraction.files.len(),
            tool_calls = extraction.tool_calls.len(),
            "re-derived turn"
        );

        self.repository.update(session_id, |session| {
            session.files = reconciled.files.clone();
            session.title = reconciled.title.clone();
            if let Some(message) = session.message_mut(message_id) {
                message.text = extraction.text.clone();
                message.tool_calls = reconciled.tool_calls.clone();
            }
        });
        view.publish(&extraction, &reconciled, update_tx);
    }
}
