//! The five actions the model may request, their argument parsing, and execution.
//!
//! Bad model input never fails the run: it becomes an `{ok:false}` payload the
//! model reads on its next turn. Only platform failures propagate as `Error`.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

use crate::artifacts::ArtifactSink;
use crate::capture::{self, Observation};
use crate::conversation::{Entry, Part};
use crate::coords::{box_center, normalize_to_pixel, parse_box, NormalizedBox, NormalizedPoint};
use crate::error::Result;
use crate::keys::{typeable, KeyCombo};
use crate::platform::Platform;
use crate::sleep::sleep_ms;
use crate::types::ScreenDimensions;

/// Wheel notches per scroll action; negative is downward.
pub const SCROLL_NOTCHES: i32 = -5;

const OBSERVE_HINT: &str = "Current screen state. Identify UI elements and provide click targets in normalized \
0-1000 coordinates. Prefer point clicks box=[x,y] for small targets (taskbar icons).";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingLabel,
    MissingBox,
    InvalidBox,
    InvalidArgs,
    InvalidJson,
    EmptyText,
    MissingKey,
    InvalidKey,
    UnknownTool,
    TooManyToolCalls,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Tool arguments exactly as they arrived on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawArgs {
    /// JSON-encoded string (the usual chat-completions form).
    Raw(String),
    /// Already a JSON value.
    Parsed(Value),
    Absent,
}

impl RawArgs {
    pub fn from_wire(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawArgs::Absent,
            Some(Value::String(s)) => RawArgs::Raw(s),
            Some(other) => RawArgs::Parsed(other),
        }
    }

    /// Canonical object form. Absent or blank arguments resolve to `{}`.
    pub fn resolve(&self) -> std::result::Result<Map<String, Value>, ActionError> {
        let value = match self {
            RawArgs::Absent => return Ok(Map::new()),
            RawArgs::Raw(s) if s.trim().is_empty() => return Ok(Map::new()),
            RawArgs::Raw(s) => serde_json::from_str::<Value>(s).map_err(|e| {
                ActionError::new(ErrorKind::InvalidJson, format!("arguments must be valid JSON: {}", e))
            })?,
            RawArgs::Parsed(v) => v.clone(),
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ActionError::new(ErrorKind::InvalidArgs, "arguments must be a JSON object")),
        }
    }

    /// String form to echo back in the assistant message.
    pub fn to_wire_string(&self) -> String {
        match self {
            RawArgs::Raw(s) => s.clone(),
            RawArgs::Parsed(v) => v.to_string(),
            RawArgs::Absent => "{}".to_string(),
        }
    }
}

/// One action request from the model, keyed by its correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub id: String,
    pub name: String,
    pub arguments: RawArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Observe,
    Click,
    TypeText,
    PressKey,
    Scroll,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] =
        [ActionKind::Observe, ActionKind::Click, ActionKind::TypeText, ActionKind::PressKey, ActionKind::Scroll];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Observe => "observe",
            ActionKind::Click => "click",
            ActionKind::TypeText => "type_text",
            ActionKind::PressKey => "press_key",
            ActionKind::Scroll => "scroll",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A fully validated action, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Observe,
    Click { label: String, target: NormalizedBox },
    TypeText { text: String },
    PressKey { combo: KeyCombo },
    Scroll { target: Option<NormalizedBox> },
}

fn str_arg(args: &Map<String, Value>, key: &str) -> String {
    match args.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl Action {
    pub fn parse(kind: ActionKind, args: &Map<String, Value>) -> std::result::Result<Self, ActionError> {
        match kind {
            ActionKind::Observe => Ok(Action::Observe),
            ActionKind::Click => {
                let label = str_arg(args, "label").trim().to_string();
                if label.is_empty() {
                    return Err(ActionError::new(ErrorKind::MissingLabel, "label required"));
                }
                let raw = match args.get("box") {
                    None | Some(Value::Null) => return Err(ActionError::new(ErrorKind::MissingBox, "box required")),
                    Some(raw) => raw,
                };
                Ok(Action::Click { label, target: parse_box(raw)? })
            }
            ActionKind::TypeText => {
                let text = typeable(&str_arg(args, "text"));
                if text.is_empty() {
                    return Err(ActionError::new(ErrorKind::EmptyText, "text empty or no ASCII chars"));
                }
                Ok(Action::TypeText { text })
            }
            ActionKind::PressKey => {
                let key = str_arg(args, "key");
                if key.trim().is_empty() {
                    return Err(ActionError::new(ErrorKind::MissingKey, "key required"));
                }
                let combo = KeyCombo::parse(&key).map_err(|e| ActionError::new(ErrorKind::InvalidKey, e.to_string()))?;
                Ok(Action::PressKey { combo })
            }
            ActionKind::Scroll => {
                let target = match args.get("box") {
                    None | Some(Value::Null) => None,
                    Some(raw) => Some(parse_box(raw)?),
                };
                Ok(Action::Scroll { target })
            }
        }
    }
}

/// Result payload sent back to the model as the tool message.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Ok(Map<String, Value>),
    Err(ActionError),
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ActionOutcome::Err(e) => Some(e.kind),
            ActionOutcome::Ok(_) => None,
        }
    }

    /// `{"ok":true,...}` or `{"ok":false,"error":{"kind":..,"message":..}}`
    pub fn to_payload(&self) -> String {
        let value = match self {
            ActionOutcome::Ok(fields) => {
                let mut map = Map::new();
                map.insert("ok".into(), Value::Bool(true));
                map.extend(fields.clone());
                Value::Object(map)
            }
            ActionOutcome::Err(e) => json!({ "ok": false, "error": e }),
        };
        value.to_string()
    }
}

impl From<ActionError> for ActionOutcome {
    fn from(e: ActionError) -> Self {
        ActionOutcome::Err(e)
    }
}

fn ok_fields(value: Value) -> ActionOutcome {
    match value {
        Value::Object(map) => ActionOutcome::Ok(map),
        _ => ActionOutcome::Ok(Map::new()),
    }
}

/// The tool entry for a request plus, for `observe`, the observation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub call_id: String,
    pub name: String,
    pub outcome: ActionOutcome,
    pub observation: Option<Entry>,
}

impl ActionResult {
    pub fn tool_entry(&self) -> Entry {
        Entry::Tool { call_id: self.call_id.clone(), name: self.name.clone(), content: self.outcome.to_payload() }
    }

    /// Failure for a request that arrived after the first in the same reply.
    pub fn rejected(req: &ActionRequest) -> Self {
        Self {
            call_id: req.id.clone(),
            name: req.name.clone(),
            outcome: ActionError::new(ErrorKind::TooManyToolCalls, "only one action is executed per step; this one was skipped")
                .into(),
            observation: None,
        }
    }
}

/// Everything an action may touch. `screen` is only written by `observe`.
pub struct ActionContext<'a> {
    pub platform: &'a mut dyn Platform,
    pub screen: &'a mut ScreenDimensions,
    pub sink: &'a mut dyn ArtifactSink,
    pub target: ScreenDimensions,
}

impl ActionContext<'_> {
    /// Capture, persist, and record the new native size.
    pub fn observe(&mut self) -> Result<(Observation, PathBuf)> {
        let obs = capture::observe(self.platform, self.target)?;
        let path = self.sink.store(&obs.image)?;
        *self.screen = obs.native;
        info!(target: "agent", "observation {} ({}x{} native)", path.display(), obs.native.width, obs.native.height);
        Ok((obs, path))
    }

    fn pixel(&self, p: NormalizedPoint) -> (i32, i32) {
        normalize_to_pixel(p, *self.screen)
    }
}

/// User entry carrying an observation.
pub fn observation_entry(obs: &Observation) -> Entry {
    Entry::User(vec![Part::Text(OBSERVE_HINT.to_string()), Part::Image(obs.image.to_data_url())])
}

/// Resolve, validate and run one request.
pub fn execute(req: &ActionRequest, ctx: &mut ActionContext<'_>) -> Result<ActionResult> {
    let mut result = ActionResult {
        call_id: req.id.clone(),
        name: req.name.clone(),
        outcome: ActionOutcome::Ok(Map::new()),
        observation: None,
    };

    let action = ActionKind::from_name(&req.name)
        .ok_or_else(|| ActionError::new(ErrorKind::UnknownTool, format!("Unknown tool: {}", req.name)))
        .and_then(|kind| req.arguments.resolve().and_then(|args| Action::parse(kind, &args)));

    let action = match action {
        Ok(a) => a,
        Err(e) => {
            info!(target: "agent", "{} rejected: {:?} {}", req.name, e.kind, e.message);
            result.outcome = e.into();
            return Ok(result);
        }
    };

    result.outcome = match action {
        Action::Observe => {
            let (obs, path) = ctx.observe()?;
            result.observation = Some(observation_entry(&obs));
            ok_fields(json!({
                "file": path.to_string_lossy(),
                "screen_width": obs.native.width,
                "screen_height": obs.native.height,
                "message": "Screenshot captured. Use normalized coordinates (0-1000). Prefer point clicks: box=[x,y].",
            }))
        }
        Action::Click { label, target } => {
            let center = box_center(&target);
            let (px, py) = ctx.pixel(center);
            info!(target: "agent", "click '{}' at ({:.1},{:.1}) -> px ({}, {})", label, center.x(), center.y(), px, py);
            ctx.platform.move_pointer(px, py)?;
            sleep_ms(80);
            ctx.platform.click()?;
            sleep_ms(120);
            let [x1, y1, x2, y2] = target.corners();
            ok_fields(json!({
                "clicked": label,
                "box_normalized": [[x1, y1], [x2, y2]],
                "click_position": [center.x(), center.y()],
                "message": format!("Clicked '{}' at ({:.1},{:.1}). Use observe to verify.", label, center.x(), center.y()),
            }))
        }
        Action::TypeText { text } => {
            ctx.platform.type_text(&text)?;
            sleep_ms(80);
            ok_fields(json!({
                "typed": text,
                "chars": text.chars().count(),
                "message": "Typed text. Use observe to verify.",
            }))
        }
        Action::PressKey { combo } => {
            ctx.platform.press_keys(&combo)?;
            sleep_ms(80);
            let key = combo.to_string();
            ok_fields(json!({
                "key": key,
                "message": format!("Pressed '{}'. Use observe to verify.", key),
            }))
        }
        Action::Scroll { target } => {
            let center = target.map(|b| box_center(&b)).unwrap_or(NormalizedPoint::CENTER);
            let (px, py) = ctx.pixel(center);
            ctx.platform.move_pointer(px, py)?;
            sleep_ms(60);
            ctx.platform.scroll(SCROLL_NOTCHES)?;
            sleep_ms(80);
            ok_fields(json!({
                "message": format!("Scrolled down at ({:.1},{:.1}). Use observe to verify.", center.x(), center.y()),
            }))
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::MemorySink;
    use crate::platform::stub::{InputEvent, StubPlatform};

    fn request(name: &str, args: RawArgs) -> ActionRequest {
        ActionRequest { id: "call_1".into(), name: name.into(), arguments: args }
    }

    fn raw(s: &str) -> RawArgs {
        RawArgs::Raw(s.to_string())
    }

    struct Harness {
        platform: StubPlatform,
        screen: ScreenDimensions,
        sink: MemorySink,
    }

    impl Harness {
        fn new() -> Self {
            Self { platform: StubPlatform::new(200, 100), screen: ScreenDimensions::new(1001, 501), sink: MemorySink::default() }
        }

        fn run(&mut self, req: &ActionRequest) -> ActionResult {
            let mut ctx = ActionContext {
                platform: &mut self.platform,
                screen: &mut self.screen,
                sink: &mut self.sink,
                target: ScreenDimensions::new(100, 50),
            };
            execute(req, &mut ctx).unwrap()
        }

        fn events(&self) -> Vec<InputEvent> {
            self.platform.events().lock().unwrap().clone()
        }
    }

    fn kind_of(result: &ActionResult) -> Option<ErrorKind> {
        result.outcome.error_kind()
    }

    #[test]
    fn test_resolve_args_variants() {
        assert_eq!(RawArgs::Absent.resolve().unwrap(), Map::new());
        assert_eq!(raw("  ").resolve().unwrap(), Map::new());
        assert_eq!(raw(r#"{"a":1}"#).resolve().unwrap()["a"], json!(1));
        assert_eq!(RawArgs::Parsed(json!({"a": 2})).resolve().unwrap()["a"], json!(2));
        assert_eq!(raw("{nope").resolve().unwrap_err().kind, ErrorKind::InvalidJson);
        assert_eq!(raw("[1,2]").resolve().unwrap_err().kind, ErrorKind::InvalidArgs);
        assert_eq!(RawArgs::Parsed(json!(5)).resolve().unwrap_err().kind, ErrorKind::InvalidArgs);
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(RawArgs::from_wire(None), RawArgs::Absent);
        assert_eq!(RawArgs::from_wire(Some(Value::Null)), RawArgs::Absent);
        assert_eq!(RawArgs::from_wire(Some(json!("{}"))), raw("{}"));
        assert_eq!(RawArgs::from_wire(Some(json!({"k": 1}))), RawArgs::Parsed(json!({"k": 1})));
    }

    #[test]
    fn test_click_maps_center_to_pixels() {
        let mut h = Harness::new();
        let res = h.run(&request("click", raw(r#"{"label":"OK","box":[100,900,300,200]}"#)));
        assert!(res.outcome.is_ok(), "{:?}", res.outcome);
        // center (200, 550) on 1001x501 -> (200, 275)
        assert_eq!(h.events(), vec![InputEvent::Move { x: 200, y: 275 }, InputEvent::Click]);
        let payload: Value = serde_json::from_str(&res.outcome.to_payload()).unwrap();
        assert_eq!(payload["ok"], json!(true));
        assert_eq!(payload["clicked"], json!("OK"));
        assert_eq!(payload["box_normalized"], json!([[100.0, 200.0], [300.0, 900.0]]));
        assert_eq!(payload["click_position"], json!([200.0, 550.0]));
    }

    #[test]
    fn test_click_validation_order() {
        let mut h = Harness::new();
        let cases = [
            (r#"{"box":[1,2]}"#, ErrorKind::MissingLabel),
            (r#"{"label":"  ","box":[1,2]}"#, ErrorKind::MissingLabel),
            (r#"{"label":"x"}"#, ErrorKind::MissingBox),
            (r#"{"label":"x","box":[1,2,3]}"#, ErrorKind::InvalidBox),
            ("not json", ErrorKind::InvalidJson),
            (r#""just a string""#, ErrorKind::InvalidArgs),
        ];
        for (args, kind) in cases {
            let res = h.run(&request("click", raw(args)));
            assert_eq!(kind_of(&res), Some(kind), "{}", args);
        }
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_type_text_filters_characters() {
        let mut h = Harness::new();
        let res = h.run(&request("type_text", raw(r#"{"text":"héllo"}"#)));
        assert!(res.outcome.is_ok());
        assert_eq!(h.events(), vec![InputEvent::Text("hllo".into())]);

        let res = h.run(&request("type_text", raw(r#"{"text":"日本"}"#)));
        assert_eq!(kind_of(&res), Some(ErrorKind::EmptyText));
        let res = h.run(&request("type_text", RawArgs::Absent));
        assert_eq!(kind_of(&res), Some(ErrorKind::EmptyText));
    }

    #[test]
    fn test_type_text_keeps_line_breaks() {
        let mut h = Harness::new();
        let res = h.run(&request("type_text", RawArgs::Parsed(json!({"text": "first\r\nsecond\tend"}))));
        assert!(res.outcome.is_ok());
        assert_eq!(h.events(), vec![InputEvent::Text("first\nsecond\tend".into())]);
        let payload: Value = serde_json::from_str(&res.outcome.to_payload()).unwrap();
        assert_eq!(payload["chars"], json!(16));
    }

    #[test]
    fn test_press_key() {
        let mut h = Harness::new();
        let res = h.run(&request("press_key", raw(r#"{"key":" Ctrl+L "}"#)));
        assert!(res.outcome.is_ok());
        assert_eq!(h.events(), vec![InputEvent::Keys("ctrl+l".into())]);

        assert_eq!(kind_of(&h.run(&request("press_key", raw("{}")))), Some(ErrorKind::MissingKey));
        assert_eq!(kind_of(&h.run(&request("press_key", raw(r#"{"key":"ctrl+nope"}"#)))), Some(ErrorKind::InvalidKey));
    }

    #[test]
    fn test_scroll_defaults_to_center() {
        let mut h = Harness::new();
        let res = h.run(&request("scroll", RawArgs::Absent));
        assert!(res.outcome.is_ok());
        assert_eq!(h.events(), vec![InputEvent::Move { x: 500, y: 250 }, InputEvent::Scroll(SCROLL_NOTCHES)]);

        let res = h.run(&request("scroll", raw(r#"{"box":"bad"}"#)));
        assert_eq!(kind_of(&res), Some(ErrorKind::InvalidBox));
    }

    #[test]
    fn test_observe_updates_screen_and_emits_entry() {
        let mut h = Harness::new();
        let res = h.run(&request("observe", RawArgs::Absent));
        assert!(res.outcome.is_ok());
        assert_eq!(h.screen, ScreenDimensions::new(200, 100));
        assert_eq!(h.sink.images.len(), 1);
        let entry = res.observation.expect("observation entry");
        assert!(entry.has_image());
        let payload: Value = serde_json::from_str(&res.outcome.to_payload()).unwrap();
        assert_eq!(payload["screen_width"], json!(200));
        assert_eq!(payload["screen_height"], json!(100));
    }

    #[test]
    fn test_unknown_tool() {
        let mut h = Harness::new();
        let res = h.run(&request("drag", raw("{}")));
        assert_eq!(kind_of(&res), Some(ErrorKind::UnknownTool));
        let payload: Value = serde_json::from_str(&res.outcome.to_payload()).unwrap();
        assert_eq!(payload, json!({"ok": false, "error": {"kind": "unknown_tool", "message": "Unknown tool: drag"}}));
    }

    #[test]
    fn test_rejected_request_payload() {
        let res = ActionResult::rejected(&request("click", raw("{}")));
        assert_eq!(kind_of(&res), Some(ErrorKind::TooManyToolCalls));
        match res.tool_entry() {
            Entry::Tool { call_id, content, .. } => {
                assert_eq!(call_id, "call_1");
                assert!(content.contains("too_many_tool_calls"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_action_names_roundtrip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ActionKind::from_name("observe_screen"), None);
    }
}
