use crate::util::env_flag;
use serde_json::Value;

const DEBUG_PAYLOAD_ENV: &str = "PAIRPAD_DEBUG_PAYLOAD";

pub fn debug_payload_enabled() -> bool {
    env_flag(DEBUG_PAYLOAD_ENV, false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(&redact_system_prompt(payload))
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(
        target: "pairpad::api",
        url = request_url,
        "payload_request\n{formatted_payload}"
    );
}

pub fn emit_sse_parse_error(json_data: &str, parse_error: &serde_json::Error) {
    tracing::warn!(
        target: "pairpad::api",
        error = %parse_error,
        data = json_data,
        "sse_parse_failed"
    );
}

/// The system message carries the full file set; only its size is useful in
/// a payload dump.
fn redact_system_prompt(payload: &Value) -> Value {
    let mut payload = payload.clone();
    if let Some(messages) = payload.get_mut("messages").and_then(Value::as_array_mut) {
        for message in messages {
            if message.get("role").and_then(Value::as_str) != Some("system") {
                continue;
            }
            let chars = message
                .get("content")
                .and_then(Value::as_str)
                .map(|content| content.chars().count())
                .unwrap_or(0);
            message["content"] = Value::String(format!("<system prompt: {chars} chars>"));
        }
    }
    payload
}
