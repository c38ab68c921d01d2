use crate::api::{ApiClient, BalanceProbe};
use crate::state::{FileItem, SessionRepository, TokenUsage, ToolCall, TurnUsage};
use std::sync::Arc;
use uuid::Uuid;

/// Progress of a running turn, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// Newly visible part of the sanitized model text.
    Text(String),
    /// The sanitized text was re-derived into something that no longer
    /// extends what was shown; this is the whole text.
    TextReset(String),
    ToolCalls(Vec<ToolCall>),
    Files(Vec<FileItem>),
    Title(String),
    Usage {
        tokens: Option<TokenUsage>,
        cost: Option<f64>,
    },
}

/// How a turn ended, for turns that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub message_id: Uuid,
    pub cancelled: bool,
    pub usage: TurnUsage,
}

pub struct ConsoleManager {
    pub(super) client: Arc<ApiClient>,
    pub(super) balance: Arc<dyn BalanceProbe>,
    pub(super) repository: SessionRepository,
}

impl ConsoleManager {
    pub fn new(
        client: ApiClient,
        balance: Arc<dyn BalanceProbe>,
        repository: SessionRepository,
    ) -> Self {
        Self {
            client: Arc::new(client),
            balance,
            repository,
        }
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut SessionRepository {
        &mut self.repository
    }

    pub fn client(&self) -> Arc<ApiClient> {
        Arc::clone(&self.client)
    }
}
