use crate::state::{Message, Session, TokenUsage};
use crate::types::WireUsage;

const COST_SCALE: f64 = 10_000.0;

/// Balance consumed between two samples, never negative, rounded to four
/// decimal places.
pub fn cost_delta(start: f64, end: f64) -> f64 {
    let delta = ((start - end) * COST_SCALE).round() / COST_SCALE;
    delta.max(0.0)
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Per-turn measurements gathered around one response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnUsage {
    pub start_balance: Option<f64>,
    pub end_balance: Option<f64>,
    pub tokens: Option<TokenUsage>,
}

impl TurnUsage {
    /// `None` unless both balance samples were available.
    pub fn cost(&self) -> Option<f64> {
        Some(cost_delta(self.start_balance?, self.end_balance?))
    }

    /// Attaches the turn's usage and cost to `message` and adds them to the
    /// session totals. Unavailable measurements are left out.
    pub fn apply(&self, session: &mut Session, message_id: uuid::Uuid) {
        let cost = self.cost();
        let Some(message) = session.message_mut(message_id) else {
            tracing::warn!(%message_id, "usage for a message that is gone");
            return;
        };
        record(message, self.tokens, cost);

        if let Some(tokens) = self.tokens {
            session.total_tokens += tokens.total_tokens;
        }
        if let Some(cost) = cost {
            session.total_cost += cost;
        }
    }
}

fn record(message: &mut Message, tokens: Option<TokenUsage>, cost: Option<f64>) {
    if tokens.is_some() {
        message.usage = tokens;
    }
    if cost.is_some() {
        message.cost = cost;
    }
}
