//! Chat-completions exchange with the external vision model.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::actions::{ActionRequest, RawArgs};
use crate::conversation::{Entry, Part};
use crate::error::{Error, Result};
use crate::settings::Settings;

/// What the model sent back for one exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub text: Option<String>,
    pub requests: Vec<ActionRequest>,
}

impl AssistantReply {
    pub fn into_entry(self) -> Entry {
        Entry::Assistant { text: self.text, requests: self.requests }
    }
}

pub trait ModelClient {
    /// Send the whole history plus the action catalog; block for the reply.
    fn complete(&mut self, entries: &[Entry], tools: &Value) -> Result<AssistantReply>;
}

pub struct HttpModel {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl HttpModel {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("pilot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn body(&self, entries: &[Entry], tools: &Value) -> Value {
        json!({
            "model": self.model,
            "messages": project(entries),
            "tools": tools,
            "tool_choice": "auto",
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

impl ModelClient for HttpModel {
    fn complete(&mut self, entries: &[Entry], tools: &Value) -> Result<AssistantReply> {
        let body = self.body(entries, tools);
        debug!(target: "exchange", "request {}", redact_request(&body));

        let started = Instant::now();
        let resp = self.client.post(&self.endpoint).json(&body).send()?.error_for_status()?;
        let value: Value = resp.json()?;
        debug!(target: "exchange", "response {}", redact(&value));

        let reply = parse_reply(&value)?;
        info!(
            target: "model",
            "reply in {:.1}s: {} chars, {} action request(s)",
            started.elapsed().as_secs_f64(),
            reply.text.as_deref().map_or(0, str::len),
            reply.requests.len()
        );
        Ok(reply)
    }
}

fn project_part(part: &Part) -> Value {
    match part {
        Part::Text(t) => json!({ "type": "text", "text": t }),
        Part::Image(url) => json!({ "type": "image_url", "image_url": { "url": url } }),
    }
}

/// Conversation entries as OpenAI-style `messages`.
pub fn project(entries: &[Entry]) -> Vec<Value> {
    entries
        .iter()
        .map(|entry| match entry {
            Entry::System(text) => json!({ "role": "system", "content": text }),
            Entry::User(parts) => match parts.as_slice() {
                [Part::Text(t)] => json!({ "role": "user", "content": t }),
                _ => json!({ "role": "user", "content": parts.iter().map(project_part).collect::<Vec<_>>() }),
            },
            Entry::Assistant { text, requests } => {
                let mut msg = Map::new();
                msg.insert("role".into(), json!("assistant"));
                msg.insert("content".into(), text.as_ref().map_or(Value::Null, |t| json!(t)));
                if !requests.is_empty() {
                    let calls: Vec<Value> = requests
                        .iter()
                        .map(|r| {
                            json!({
                                "id": r.id,
                                "type": "function",
                                "function": { "name": r.name, "arguments": r.arguments.to_wire_string() },
                            })
                        })
                        .collect();
                    msg.insert("tool_calls".into(), Value::Array(calls));
                }
                Value::Object(msg)
            }
            Entry::Tool { call_id, name, content } => {
                json!({ "role": "tool", "tool_call_id": call_id, "name": name, "content": content })
            }
        })
        .collect()
}

fn malformed(what: &str) -> Error {
    Error::MalformedResponse(what.to_string())
}

/// Extract the first choice's message. Anything without one is malformed.
pub fn parse_reply(body: &Value) -> Result<AssistantReply> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .filter(|m| m.is_object())
        .ok_or_else(|| malformed("no choices[0].message"))?;

    let text = match message.get("content") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(malformed("message.content is not a string")),
    };

    let mut requests: Vec<ActionRequest> = Vec::new();
    if let Some(calls) = message.get("tool_calls").filter(|v| !v.is_null()) {
        let calls = calls.as_array().ok_or_else(|| malformed("tool_calls is not an array"))?;
        let sent: HashSet<&str> = calls.iter().filter_map(|c| c.get("id").and_then(Value::as_str)).collect();
        for (i, call) in calls.iter().enumerate() {
            let function = call.get("function").ok_or_else(|| malformed("tool call without function"))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("tool call without function.name"))?;
            let id = match call.get("id").and_then(Value::as_str) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => fallback_id(i, &sent, &requests),
            };
            requests.push(ActionRequest {
                id,
                name: name.to_string(),
                arguments: RawArgs::from_wire(function.get("arguments").cloned()),
            });
        }
    }

    Ok(AssistantReply { text, requests })
}

/// Id for a tool call the model sent without one; never reuses an id already in the reply.
fn fallback_id(index: usize, sent: &HashSet<&str>, taken: &[ActionRequest]) -> String {
    let mut n = index;
    loop {
        let id = format!("pilot_call_{}", n);
        if !sent.contains(id.as_str()) && taken.iter().all(|r| r.id != id) {
            return id;
        }
        n += 1;
    }
}

const INLINE_IMAGE_LIMIT: usize = 100;

fn redact_string(s: &str) -> Option<String> {
    if s.len() <= INLINE_IMAGE_LIMIT || !s.starts_with("data:image/") {
        return None;
    }
    let (_, payload) = s.split_once(";base64,")?;
    let hash = blake3::hash(payload.as_bytes()).to_hex();
    Some(format!("data:image/png;base64,[b64 hash={} len={}]", &hash.as_str()[..12], payload.len()))
}

/// Replace embedded images with a short hash so exchanges stay readable in the log.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::String(s) => redact_string(s).map_or_else(|| value.clone(), Value::String),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), redact(v))).collect()),
        other => other.clone(),
    }
}

/// `redact`, plus fixed markers for the catalog, system prompt and first task prompt.
pub fn redact_request(body: &Value) -> Value {
    let mut out = redact(body);
    if let Some(tools) = out.get_mut("tools") {
        *tools = json!("[tools catalog]");
    }
    if let Some(messages) = out.get_mut("messages").and_then(Value::as_array_mut) {
        let mut task_seen = false;
        for msg in messages.iter_mut() {
            match msg.get("role").and_then(Value::as_str) {
                Some("system") => msg["content"] = json!("[system prompt]"),
                Some("user") if !task_seen => {
                    task_seen = true;
                    msg["content"] = json!("[task prompt]");
                }
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<Entry> {
        vec![
            Entry::System("sys".into()),
            Entry::User(vec![Part::Text("do it".into())]),
            Entry::User(vec![Part::Text("look".into()), Part::Image("data:image/png;base64,AAAA".into())]),
            Entry::Assistant {
                text: Some("ok".into()),
                requests: vec![ActionRequest {
                    id: "c1".into(),
                    name: "click".into(),
                    arguments: RawArgs::Parsed(json!({"label": "x", "box": [1, 2]})),
                }],
            },
            Entry::Tool { call_id: "c1".into(), name: "click".into(), content: r#"{"ok":true}"#.into() },
        ]
    }

    #[test]
    fn test_project_roles_and_shapes() {
        let msgs = project(&sample_entries());
        assert_eq!(msgs[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(msgs[1], json!({"role": "user", "content": "do it"}));
        assert_eq!(msgs[2]["content"][1]["image_url"]["url"], json!("data:image/png;base64,AAAA"));
        assert_eq!(msgs[3]["tool_calls"][0]["function"]["name"], json!("click"));
        let args: Value =
            serde_json::from_str(msgs[3]["tool_calls"][0]["function"]["arguments"].as_str().unwrap()).unwrap();
        assert_eq!(args["box"], json!([1, 2]));
        assert_eq!(msgs[4], json!({"role": "tool", "tool_call_id": "c1", "name": "click", "content": "{\"ok\":true}"}));
    }

    #[test]
    fn test_assistant_without_requests_has_no_tool_calls() {
        let msgs = project(&[Entry::Assistant { text: None, requests: Vec::new() }]);
        assert_eq!(msgs[0], json!({"role": "assistant", "content": null}));
    }

    #[test]
    fn test_parse_reply_with_tool_calls() {
        let body = json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": "<think>hm</think>clicking",
                "tool_calls": [
                    { "id": "a", "type": "function", "function": { "name": "click", "arguments": "{\"label\":\"x\"}" } },
                    { "type": "function", "function": { "name": "observe" } },
                ],
            }}],
        });
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.text.as_deref(), Some("<think>hm</think>clicking"));
        assert_eq!(reply.requests.len(), 2);
        assert_eq!(reply.requests[0].arguments, RawArgs::Raw("{\"label\":\"x\"}".into()));
        assert_eq!(reply.requests[1].id, "pilot_call_1");
        assert_eq!(reply.requests[1].arguments, RawArgs::Absent);
    }

    #[test]
    fn test_generated_ids_never_collide() {
        let body = json!({
            "choices": [{ "message": {
                "tool_calls": [
                    { "function": { "name": "observe" } },
                    { "id": "pilot_call_1", "function": { "name": "observe" } },
                    { "id": "call_1", "function": { "name": "observe" } },
                    { "function": { "name": "observe" } },
                ],
            }}],
        });
        let reply = parse_reply(&body).unwrap();
        let ids: Vec<&str> = reply.requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["pilot_call_0", "pilot_call_1", "call_1", "pilot_call_3"]);
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_parse_reply_rejects_missing_choice() {
        for body in [json!({}), json!({"choices": []}), json!({"choices": [{"text": "x"}]})] {
            assert!(matches!(parse_reply(&body), Err(Error::MalformedResponse(_))), "{}", body);
        }
    }

    #[test]
    fn test_parse_reply_empty_content_is_none() {
        let reply = parse_reply(&json!({"choices": [{"message": {"content": "  "}}]})).unwrap();
        assert_eq!(reply, AssistantReply::default());
    }

    #[test]
    fn test_redact_images_and_prompts() {
        let url = format!("data:image/png;base64,{}", "Q".repeat(200));
        let mut entries = sample_entries();
        entries[2] = Entry::User(vec![Part::Image(url)]);
        let body = json!({ "messages": project(&entries), "tools": [1, 2, 3] });

        let out = redact_request(&body);
        assert_eq!(out["tools"], json!("[tools catalog]"));
        assert_eq!(out["messages"][0]["content"], json!("[system prompt]"));
        assert_eq!(out["messages"][1]["content"], json!("[task prompt]"));
        let redacted = out["messages"][2]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert!(redacted.starts_with("data:image/png;base64,[b64 hash="), "{}", redacted);
        assert!(redacted.ends_with("len=200]"), "{}", redacted);
        // short data URLs are left alone
        assert_eq!(redact(&json!("data:image/png;base64,AAAA")), json!("data:image/png;base64,AAAA"));
    }
}
