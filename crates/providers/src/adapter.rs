//! Protocol adapter: pure transforms between the conversation model and the
//! three provider JSON shapes.
//!
//! Request bodies are built with typed serde structs, so arbitrary user text
//! (quotes, backslashes, newlines) is always escaped into valid JSON.
//! Response extraction keeps the primary-then-fallback order of the original
//! protocol handling; multi-block and tool-call payloads are out of scope —
//! only the first text content is extracted.

use serde::Serialize;
use serde_json::Value;
use shared::{Protocol, Role, Turn};

/// Marker line that introduces captured command output in the history log.
pub const CMD_OUTPUT_TAG: &str = "[CMD Output]";

// ── Request types ────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

/// Gemini speaks `user` / `model`; everything else keeps our role names.
fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Build the JSON request body for one exchange.
///
/// History turns precede the current user message; the system prompt goes
/// wherever the family puts it (leading message, top-level field, or
/// `systemInstruction`).
pub fn build_request(
    protocol: Protocol,
    model: &str,
    temperature: f32,
    max_tokens: u32,
    system_prompt: &str,
    user_message: &str,
    history: &[Turn],
) -> String {
    let body = match protocol {
        Protocol::OpenAiCompat => {
            let mut messages = vec![WireMessage {
                role: "system",
                content: system_prompt,
            }];
            messages.extend(history.iter().map(|t| WireMessage {
                role: t.role.as_str(),
                content: &t.content,
            }));
            messages.push(WireMessage {
                role: "user",
                content: user_message,
            });
            serde_json::to_string(&OpenAiRequest {
                model,
                messages,
                temperature,
                max_tokens,
                stream: false,
            })
        }
        Protocol::Anthropic => {
            let mut messages: Vec<WireMessage> = history
                .iter()
                .map(|t| WireMessage {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect();
            messages.push(WireMessage {
                role: "user",
                content: user_message,
            });
            serde_json::to_string(&AnthropicRequest {
                model,
                system: system_prompt,
                messages,
                max_tokens,
                temperature,
            })
        }
        Protocol::Gemini => {
            let mut contents: Vec<GeminiContent> = history
                .iter()
                .map(|t| GeminiContent {
                    role: Some(gemini_role(t.role)),
                    parts: vec![GeminiPart { text: &t.content }],
                })
                .collect();
            contents.push(GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: user_message }],
            });
            serde_json::to_string(&GeminiRequest {
                system_instruction: GeminiContent {
                    role: None,
                    parts: vec![GeminiPart {
                        text: system_prompt,
                    }],
                },
                contents,
                generation_config: GeminiGenerationConfig {
                    temperature,
                    max_output_tokens: max_tokens,
                },
            })
        }
    };
    // Plain structs of strings and finite numbers; serialization cannot fail.
    body.expect("request body serialization")
}

// ── History parsing ──────────────────────────────────────────────────

/// Reconstruct alternating turns from the flat `User: `/`Nova: ` line log.
///
/// Unprefixed lines continue the current turn. A `[CMD Output]` marker and
/// the unprefixed lines that follow it are dropped until the next role
/// prefix, so captured command output never re-enters the prompt.
pub fn parse_history(raw: &str) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut current: Option<Turn> = None;
    let mut in_cmd_output = false;

    let mut flush = |t: Option<Turn>, turns: &mut Vec<Turn>| {
        if let Some(mut t) = t {
            while t.content.ends_with(['\n', '\r']) {
                t.content.pop();
            }
            if !t.content.is_empty() {
                turns.push(t);
            }
        }
    };

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("User: ") {
            flush(current.take(), &mut turns);
            in_cmd_output = false;
            current = Some(Turn::new(Role::User, format!("{rest}\n")));
        } else if let Some(rest) = line.strip_prefix("Nova: ") {
            flush(current.take(), &mut turns);
            in_cmd_output = false;
            current = Some(Turn::new(Role::Assistant, format!("{rest}\n")));
        } else if line.starts_with(CMD_OUTPUT_TAG) {
            in_cmd_output = true;
        } else if !in_cmd_output {
            if let Some(turn) = current.as_mut() {
                turn.content.push_str(line);
                turn.content.push('\n');
            }
        }
    }
    flush(current.take(), &mut turns);
    turns
}

// ── Response extraction ──────────────────────────────────────────────

/// Depth-first search for the first string value under `key`.
fn find_string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get(key) {
                return Some(s);
            }
            map.values().find_map(|v| find_string(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_string(v, key)),
        _ => None,
    }
}

/// Extract the reply text from a raw provider response.
///
/// Returns an empty string when nothing could be extracted; the caller then
/// falls back to provider-error extraction.
pub fn parse_response(protocol: Protocol, raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return String::new();
    };

    match protocol {
        Protocol::OpenAiCompat => {
            // choices[0].message.content, then the legacy single-field
            // llama-server shape, then any content string.
            if let Some(text) = value
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
            {
                return text.to_string();
            }
            if let Some(Value::String(text)) = value.get("content") {
                return text.clone();
            }
            find_string(&value, "content").unwrap_or_default().to_string()
        }
        Protocol::Anthropic => {
            // The content array holds typed blocks; take the text block,
            // then fall back to any text field.
            if let Some(blocks) = value.get("content").and_then(Value::as_array) {
                for block in blocks {
                    if block.get("type").and_then(Value::as_str) == Some("text") {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            return text.to_string();
                        }
                    }
                }
            }
            find_string(&value, "text").unwrap_or_default().to_string()
        }
        Protocol::Gemini => {
            // candidates[0].content.parts[0].text, then any text field.
            if let Some(text) = value
                .pointer("/candidates/0/content/parts/0/text")
                .and_then(Value::as_str)
            {
                return text.to_string();
            }
            find_string(&value, "text").unwrap_or_default().to_string()
        }
    }
}

/// Best-effort short error string from a response that yielded no reply.
pub fn extract_error(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(msg) = find_string(&value, "message") {
            return Some(msg.to_string());
        }
        if let Some(msg) = find_string(&value, "error") {
            return Some(msg.to_string());
        }
    }
    if trimmed.len() < 500 {
        return Some(trimmed.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_shot(protocol: Protocol) -> Value {
        let body = build_request(
            protocol,
            "test-model",
            0.4,
            256,
            "You are a test.",
            "Say OK.",
            &[],
        );
        serde_json::from_str(&body).expect("valid JSON")
    }

    #[test]
    fn openai_request_shape() {
        let v = one_shot(Protocol::OpenAiCompat);
        assert_eq!(v["model"], "test-model");
        assert_eq!(v["stream"], false);
        assert_eq!(v["max_tokens"], 256);
        let messages = v["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Say OK.");
    }

    #[test]
    fn anthropic_request_shape() {
        let v = one_shot(Protocol::Anthropic);
        assert_eq!(v["system"], "You are a test.");
        let messages = v["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert!(v.get("stream").is_none());
    }

    #[test]
    fn gemini_request_shape() {
        let v = one_shot(Protocol::Gemini);
        assert_eq!(
            v["systemInstruction"]["parts"][0]["text"],
            "You are a test."
        );
        let contents = v["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(v["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn hostile_text_still_valid_json() {
        let body = build_request(
            Protocol::OpenAiCompat,
            "m",
            0.4,
            64,
            "sys \"quoted\" \\ back",
            "line one\nline two\t\"end\"",
            &[],
        );
        let v: Value = serde_json::from_str(&body).expect("valid JSON");
        assert_eq!(
            v["messages"][1]["content"],
            "line one\nline two\t\"end\""
        );
    }

    #[test]
    fn history_turns_embedded_in_order() {
        let history = vec![
            Turn::new(Role::User, "hi"),
            Turn::new(Role::Assistant, "hello"),
        ];
        let body = build_request(
            Protocol::Gemini,
            "m",
            0.4,
            64,
            "sys",
            "next",
            &history,
        );
        let v: Value = serde_json::from_str(&body).unwrap();
        let contents = v["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        // assistant becomes "model" for Gemini only
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "next");
    }

    #[test]
    fn parse_history_roles_and_continuations() {
        let raw = "User: hello\r\nNova: first line\nsecond line\r\nUser: bye\r\n";
        let turns = parse_history(raw);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], Turn::new(Role::User, "hello"));
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "first line\nsecond line");
        assert_eq!(turns[2].content, "bye");
    }

    #[test]
    fn parse_history_skips_command_output() {
        let raw = "User: run it\r\nNova: EXEC: ls\r\n[CMD Output]\r\nfile_a\nfile_b\r\nUser: thanks\r\n";
        let turns = parse_history(raw);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content, "EXEC: ls");
        assert!(!turns.iter().any(|t| t.content.contains("file_a")));
    }

    #[test]
    fn openai_response_round_trip() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_response(Protocol::OpenAiCompat, raw), "hello");
        // Legacy llama-server shape
        assert_eq!(
            parse_response(Protocol::OpenAiCompat, r#"{"content":"hi there"}"#),
            "hi there"
        );
    }

    #[test]
    fn anthropic_response_round_trip() {
        let raw = r#"{"content":[{"type":"text","text":"hi"}],"model":"claude"}"#;
        assert_eq!(parse_response(Protocol::Anthropic, raw), "hi");
        // Fallback: any text field
        let odd = r#"{"output":{"text":"fallback"}}"#;
        assert_eq!(parse_response(Protocol::Anthropic, odd), "fallback");
    }

    #[test]
    fn gemini_response_round_trip() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"yo"}],"role":"model"}}]}"#;
        assert_eq!(parse_response(Protocol::Gemini, raw), "yo");
    }

    #[test]
    fn empty_or_invalid_yields_empty() {
        assert_eq!(parse_response(Protocol::OpenAiCompat, ""), "");
        assert_eq!(parse_response(Protocol::Gemini, "not json"), "");
    }

    #[test]
    fn error_extraction_order() {
        let raw = r#"{"error":{"message":"quota exceeded","type":"rate_limit"}}"#;
        assert_eq!(extract_error(raw).unwrap(), "quota exceeded");
        assert_eq!(
            extract_error(r#"{"error":"bad key"}"#).unwrap(),
            "bad key"
        );
        // Short non-JSON bodies are surfaced verbatim
        assert_eq!(extract_error("upstream timeout").unwrap(), "upstream timeout");
        assert!(extract_error("").is_none());
        let long = "x".repeat(600);
        assert!(extract_error(&long).is_none());
    }
}
