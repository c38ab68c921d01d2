use super::client::ApiClient;
use crate::types::BalanceResponse;
use async_trait::async_trait;

/// Source of the account balance sampled around a turn.
///
/// `None` means the signal is unavailable (no key, probe failed, unexpected
/// body); cost accounting is skipped in that case.
#[async_trait]
pub trait BalanceProbe: Send + Sync {
    async fn balance(&self) -> Option<f64>;
}

#[async_trait]
impl BalanceProbe for ApiClient {
    async fn balance(&self) -> Option<f64> {
        let api_key = self.api_key.as_deref()?;
        let response = match self
            .http
            .get(&self.balance_url)
            .bearer_auth(api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(url = %self.balance_url, %error, "balance probe failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "balance probe rejected");
            return None;
        }

        match response.json::<BalanceResponse>().await {
            Ok(body) => parse_balance(&body),
            Err(error) => {
                tracing::warn!(%error, "balance probe returned an unreadable body");
                None
            }
        }
    }
}

fn parse_balance(body: &BalanceResponse) -> Option<f64> {
    body.balance
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|value| value.is_finite())
}

/// Probe used when no balance endpoint should be consulted.
pub struct NoBalance;

#[async_trait]
impl BalanceProbe for NoBalance {
    async fn balance(&self) -> Option<f64> {
        None
    }
}
