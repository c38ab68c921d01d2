use pairpad::api::stream::StreamParser;
use pairpad::types::{StreamEvent, WireUsage};

#[test]
fn test_fragmented_events() {
    let mut parser = StreamParser::new();

    let chunk1 = b"data: {\"choices\":[{\"delta\":{\"cont";
    assert!(parser.process(chunk1).is_empty());

    let chunk2 = b"ent\":\"Hi\"}}]}\n\n";
    let events = parser.process(chunk2);
    assert_eq!(events, vec![StreamEvent::Delta("Hi".to_string())]);
}

#[test]
fn test_parse_error_handling() {
    let mut parser = StreamParser::new();

    let events = parser.process(b"data: {invalid json}\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n");
    assert_eq!(events, vec![StreamEvent::Delta("ok".to_string())]);
}

#[test]
fn test_usage_chunk_without_choices() {
    let mut parser = StreamParser::new();

    let chunk = b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":90,\"completion_tokens\":30,\"total_tokens\":120}}\n";
    let events = parser.process(chunk);
    assert_eq!(
        events,
        vec![StreamEvent::Usage(WireUsage {
            prompt_tokens: 90,
            completion_tokens: 30,
            total_tokens: 120,
        })]
    );
}

#[test]
fn test_empty_deltas_are_skipped() {
    let mut parser = StreamParser::new();

    let chunk = b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n";
    assert!(parser.process(chunk).is_empty());
}

#[test]
fn test_done_sentinel_ends_stream() {
    let mut parser = StreamParser::new();

    let chunk = b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n";
    let events = parser.process(chunk);
    assert_eq!(
        events,
        vec![StreamEvent::Delta("a".to_string()), StreamEvent::Done]
    );
    assert!(parser.is_done());
}
