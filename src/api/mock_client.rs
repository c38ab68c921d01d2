use crate::api::client::{ByteStream, MockStreamProducer};
use crate::types::ApiMessage;
use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};

/// Replays scripted response bodies, one per request. Each body is a list of
/// raw network reads, so tests can split lines and markers anywhere.
#[derive(Clone, Default)]
pub struct MockApiClient {
    responses: Arc<Mutex<Vec<Vec<String>>>>,
    requests: Arc<Mutex<Vec<Vec<ApiMessage>>>>,
}

impl MockApiClient {
    pub fn new(responses: Vec<Vec<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::default(),
        }
    }

    /// Messages of every request made so far.
    pub fn requests(&self) -> Vec<Vec<ApiMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

/// Frames text deltas as `data: ` lines, split into reads of `read_size`
/// bytes, followed by an optional usage line and the `[DONE]` sentinel.
pub fn sse_reads(deltas: &[&str], usage_total: Option<u64>, read_size: usize) -> Vec<String> {
    let mut body = String::new();
    for delta in deltas {
        let payload = serde_json::json!({ "choices": [{ "delta": { "content": delta } }] });
        body.push_str(&format!("data: {payload}\n\n"));
    }
    if let Some(total) = usage_total {
        let payload = serde_json::json!({
            "choices": [],
            "usage": { "prompt_tokens": total / 2, "completion_tokens": total - total / 2, "total_tokens": total }
        });
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    let read_size = read_size.max(1);
    let mut reads = Vec::new();
    let mut current = String::new();
    for ch in body.chars() {
        if current.len() + ch.len_utf8() > read_size && !current.is_empty() {
            reads.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        reads.push(current);
    }
    reads
}

impl MockStreamProducer for MockApiClient {
    fn create_mock_stream(&self, messages: &[ApiMessage]) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow::anyhow!(
                "MockApiClient: No more responses configured"
            ));
        }
        let reads = responses_guard.remove(0);

        let byte_chunks: Vec<Result<Bytes>> = reads
            .into_iter()
            .map(|s| Ok(Bytes::from(s)))
            .collect();

        Ok(Box::pin(stream::iter(byte_chunks)))
    }
}
