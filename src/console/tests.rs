use super::*;
use crate::api::client::{ByteStream, MockStreamProducer};
use crate::api::mock_client::{sse_reads, MockApiClient};
use crate::api::{ApiClient, BalanceProbe, NoBalance};
use crate::error::ConsoleError;
use crate::protocol::markers::file_marker;
use crate::state::{file_id, FileItem, Framework, SessionRepository, ToolStatus};
use crate::types::ApiMessage;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct ScriptedBalance {
    samples: Mutex<Vec<Option<f64>>>,
    calls: Mutex<usize>,
}

impl ScriptedBalance {
    fn new(samples: Vec<Option<f64>>) -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(samples),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl BalanceProbe for ScriptedBalance {
    async fn balance(&self) -> Option<f64> {
        *self.calls.lock().unwrap() += 1;
        let mut samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            None
        } else {
            samples.remove(0)
        }
    }
}

/// Yields its reads, then never finishes.
struct StallingProducer {
    reads: Vec<String>,
}

impl MockStreamProducer for StallingProducer {
    fn create_mock_stream(&self, _messages: &[ApiMessage]) -> Result<ByteStream> {
        let chunks: Vec<Result<Bytes>> = self
            .reads
            .iter()
            .map(|read| Ok(Bytes::from(read.clone())))
            .collect();
        Ok(Box::pin(
            futures::StreamExt::chain(stream::iter(chunks), stream::pending()),
        ))
    }
}

fn manager_with(
    client: ApiClient,
    balance: Arc<dyn BalanceProbe>,
) -> (ConsoleManager, Uuid) {
    let mut repository = SessionRepository::in_memory();
    let session_id = repository.create(Framework::React, false);
    (ConsoleManager::new(client, balance, repository), session_id)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<TurnUpdate>) -> Vec<TurnUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

const APP_RESPONSE: &[&str] = &[
    "Sure, here is the app.\n:::FI",
    "LE src/App.tsx:::\nexport default function App() {\n",
    "  return <h1>Hi</h1>;\n}\n:::END_",
    "FILE:::\n:::TOOL_CALL {\"name\": \"rename_chat\", \"args\": {\"title\": \"Greeter\"}} :::\nEnjoy!",
];

#[tokio::test]
async fn test_turn_reconciles_files_and_records_usage() -> Result<()> {
    let mock = Arc::new(MockApiClient::new(vec![sse_reads(APP_RESPONSE, Some(120), 7)]));
    let balance = ScriptedBalance::new(vec![Some(10.0), Some(9.9987)]);
    let (mut manager, session_id) = manager_with(ApiClient::new_mock(mock.clone()), balance.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let outcome = manager
        .run_turn(session_id, "make a greeter", &CancellationToken::new(), Some(&tx))
        .await?;
    assert!(!outcome.cancelled);

    let session = manager.repository().get(session_id).unwrap();
    assert_eq!(session.title, "Greeter");
    assert_eq!(session.files.len(), 1);
    assert_eq!(session.files[0].id, file_id(session_id, "src/App.tsx"));
    assert_eq!(
        session.files[0].content,
        "export default function App() {\n  return <h1>Hi</h1>;\n}"
    );

    let reply = session.messages.last().unwrap();
    assert_eq!(reply.id, outcome.message_id);
    assert_eq!(
        reply.text,
        format!(
            "Sure, here is the app.\n{}\n\nEnjoy!",
            file_marker("src/App.tsx")
        )
    );
    let ids: Vec<&str> = reply.tool_calls.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["block-0", "tool-0"]);
    assert_eq!(reply.tool_calls[1].status, ToolStatus::Success);
    assert_eq!(reply.cost, Some(0.0013));
    assert_eq!(reply.usage.map(|u| u.total_tokens), Some(120));
    assert_eq!(session.total_tokens, 120);
    assert_eq!(balance.calls(), 2);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].role, "system");
    assert_eq!(requests[0][1].content, "make a greeter");

    let updates = drain(&mut rx);
    let streamed: String = updates
        .iter()
        .filter_map(|u| match u {
            TurnUpdate::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, reply.text);
    assert!(updates
        .iter()
        .all(|u| !matches!(u, TurnUpdate::TextReset(_))));
    assert!(updates
        .iter()
        .any(|u| matches!(u, TurnUpdate::Title(t) if t == "Greeter")));
    assert!(matches!(updates.last(), Some(TurnUpdate::Usage { .. })));
    Ok(())
}

#[tokio::test]
async fn test_visible_text_never_shows_raw_protocol() -> Result<()> {
    let mock = Arc::new(MockApiClient::new(vec![sse_reads(APP_RESPONSE, None, 3)]));
    let (mut manager, session_id) = manager_with(ApiClient::new_mock(mock), Arc::new(NoBalance));
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager
        .run_turn(session_id, "go", &CancellationToken::new(), Some(&tx))
        .await?;

    let mut shown = String::new();
    for update in drain(&mut rx) {
        if let TurnUpdate::Text(text) = update {
            shown.push_str(&text);
            assert!(!shown.contains(":::"), "leaked protocol: {shown:?}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_trailing_colon_is_held_then_kept_at_end_of_stream() -> Result<()> {
    let response = &["Plan", ":", ":", " first the layout", ", then the steps:"];
    let mock = Arc::new(MockApiClient::new(vec![sse_reads(response, None, 2)]));
    let (mut manager, session_id) = manager_with(ApiClient::new_mock(mock), Arc::new(NoBalance));
    let (tx, mut rx) = mpsc::unbounded_channel();

    manager
        .run_turn(session_id, "go", &CancellationToken::new(), Some(&tx))
        .await?;

    let reply = manager.repository().get(session_id).unwrap().messages.last().unwrap();
    assert_eq!(reply.text, "Plan:: first the layout, then the steps:");

    let updates = drain(&mut rx);
    assert!(updates
        .iter()
        .all(|u| !matches!(u, TurnUpdate::TextReset(_))));
    let streamed: String = updates
        .iter()
        .filter_map(|u| match u {
            TurnUpdate::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, reply.text);
    Ok(())
}

#[tokio::test]
async fn test_read_size_does_not_change_result() -> Result<()> {
    let mut finals = Vec::new();
    for read_size in [1, 5, 64, 4096] {
        let mock = Arc::new(MockApiClient::new(vec![sse_reads(APP_RESPONSE, None, read_size)]));
        let (mut manager, session_id) =
            manager_with(ApiClient::new_mock(mock), Arc::new(NoBalance));
        manager
            .run_turn(session_id, "go", &CancellationToken::new(), None)
            .await?;
        let session = manager.repository().get(session_id).unwrap();
        let reply = session.messages.last().unwrap();
        finals.push((
            reply.text.clone(),
            reply.tool_calls.clone(),
            session.files.clone(),
            session.title.clone(),
        ));
    }
    assert!(finals.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}

#[tokio::test]
async fn test_existing_file_is_updated_in_place() -> Result<()> {
    let response = &[":::FILE src/App.tsx:::\nnew body\n:::END_FILE:::"];
    let mock = Arc::new(MockApiClient::new(vec![sse_reads(response, None, 8)]));
    let (mut manager, session_id) = manager_with(ApiClient::new_mock(mock), Arc::new(NoBalance));
    manager.repository_mut().update(session_id, |session| {
        session
            .files
            .push(FileItem::file(session.id, "src/App.tsx", "old body"));
    });

    manager
        .run_turn(session_id, "edit", &CancellationToken::new(), None)
        .await?;

    let session = manager.repository().get(session_id).unwrap();
    assert_eq!(session.files.len(), 1);
    assert_eq!(session.files[0].content, "new body");
    assert_eq!(
        session.messages.last().unwrap().tool_calls[0].op.name(),
        "update_file"
    );
    // Usage fields are omitted when the balance is unavailable.
    assert_eq!(session.messages.last().unwrap().cost, None);
    Ok(())
}

#[tokio::test]
async fn test_missing_credential_short_circuits() {
    let mock = Arc::new(MockApiClient::new(vec![sse_reads(&["hi"], None, 8)]));
    let balance = ScriptedBalance::new(vec![Some(1.0)]);
    let (mut manager, session_id) =
        manager_with(ApiClient::new_mock(mock.clone()).without_key(), balance.clone());

    let error = manager
        .run_turn(session_id, "hello", &CancellationToken::new(), None)
        .await
        .unwrap_err();

    assert_eq!(
        error.downcast_ref::<ConsoleError>(),
        Some(&ConsoleError::MissingCredential)
    );
    assert!(mock.requests().is_empty());
    assert_eq!(balance.calls(), 0);
    assert!(manager.repository().get(session_id).unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_transport_failure_keeps_partial_turn_and_records_usage() {
    let mock = Arc::new(MockApiClient::new(Vec::new()));
    let balance = ScriptedBalance::new(vec![Some(5.0), Some(5.0)]);
    let (mut manager, session_id) = manager_with(ApiClient::new_mock(mock), balance.clone());

    let result = manager
        .run_turn(session_id, "hello", &CancellationToken::new(), None)
        .await;

    assert!(result.is_err());
    assert_eq!(balance.calls(), 2);
    let session = manager.repository().get(session_id).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].text, "hello");
    assert_eq!(session.messages[1].cost, Some(0.0));
}

#[tokio::test]
async fn test_cancel_stops_writes_and_skips_usage() -> Result<()> {
    let reads = sse_reads(&["Working on it.\n:::FILE src/App.tsx:::\nexport"], None, 4096);
    let reads = reads
        .into_iter()
        .map(|read| read.replace("data: [DONE]\n\n", ""))
        .collect();
    let client = ApiClient::new_mock(Arc::new(StallingProducer { reads }));
    let balance = ScriptedBalance::new(vec![Some(3.0), Some(2.0)]);
    let (mut manager, session_id) = manager_with(client, balance.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let turn = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = manager.run_turn(session_id, "go", &cancel, Some(&tx)).await;
            (manager, outcome)
        })
    };

    while let Some(update) = rx.recv().await {
        if matches!(update, TurnUpdate::Text(_)) {
            break;
        }
    }
    cancel.cancel();
    let (manager, outcome) = turn.await?;
    let outcome = outcome?;

    assert!(outcome.cancelled);
    assert_eq!(balance.calls(), 1);
    let session = manager.repository().get(session_id).unwrap();
    let reply = session.messages.last().unwrap();
    assert_eq!(reply.text, "Working on it.");
    assert_eq!(reply.cost, None);
    assert!(session.files.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_second_turn_sends_previous_reply_as_history() -> Result<()> {
    let mock = Arc::new(MockApiClient::new(vec![
        sse_reads(APP_RESPONSE, None, 64),
        sse_reads(&["Fine."], None, 64),
    ]));
    let (mut manager, session_id) =
        manager_with(ApiClient::new_mock(mock.clone()), Arc::new(NoBalance));

    manager
        .run_turn(session_id, "first", &CancellationToken::new(), None)
        .await?;
    manager
        .run_turn(session_id, "second", &CancellationToken::new(), None)
        .await?;

    let requests = mock.requests();
    let second = &requests[1];
    assert_eq!(second.len(), 4);
    assert!(second[0].content.contains("--- START OF FILE src/App.tsx ---"));
    assert_eq!(second[2].role, "assistant");
    assert!(second[2]
        .content
        .ends_with(":::TOOL_CALL {\"name\":\"rename_chat\",\"args\":{\"title\":\"Greeter\"}} :::"));
    assert_eq!(second[3].content, "second");
    Ok(())
}
