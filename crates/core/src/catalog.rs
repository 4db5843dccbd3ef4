//! What the model is told: the action schema, the default system prompt, and
//! the built-in task scenarios.

use serde_json::{json, Value};

use crate::actions::ActionKind;

pub const SYSTEM_PROMPT: &str = "You are an autonomous agent with vision and control over a desktop. \
Complete user tasks through observation and interaction with the GUI.

## Capabilities
- observe() - See current screen state
- click(label, box) - Click UI elements
- type_text(text) - Type into focused fields
- press_key(key) - Press keys/combinations
- scroll(box) - Scroll down at position

## Coordinate System: NORMALIZED (0-1000)
- X: 0 (left) to 1000 (right)
- Y: 0 (top) to 1000 (bottom)
- Center: (500, 500)

### Click target formats (all valid)
- Point: box=[x,y] (preferred, especially for small targets)
- Flat bbox: box=[x1,y1,x2,y2]
- Legacy bbox: box=[[x1,y1],[x2,y2]]

## Operating Protocol
1. OBSERVE: observe()
2. Think privately.
3. ACT: execute ONE action with normalized coordinates.
4. VERIFY: observe() after actions.

## Rules
- Always use 0-1000 coordinates, never pixels.
- Click before typing.
- One action per step.
- When the task is done, reply with a short summary and no action.";

fn box_schema(description: &str) -> Value {
    let pair = json!({ "type": "array", "items": { "type": "number" }, "minItems": 2, "maxItems": 2 });
    json!({
        "description": description,
        "anyOf": [
            pair,
            { "type": "array", "items": { "type": "number" }, "minItems": 4, "maxItems": 4 },
            { "type": "array", "items": pair, "minItems": 2, "maxItems": 2 },
        ],
    })
}

fn describe(kind: ActionKind) -> (&'static str, Value) {
    match kind {
        ActionKind::Observe => (
            "Captures the current screen and returns it as an image. Call this at the start of each \
             decision cycle and after actions to verify results.",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
        ActionKind::Click => (
            "Clicks a UI element using NORMALIZED coordinates (0-1000). Preferred: point click box=[x,y]. \
             Also supported: box=[x1,y1,x2,y2] or legacy box=[[x1,y1],[x2,y2]].",
            json!({
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "box": box_schema("Click target in normalized 0-1000 coordinates."),
                },
                "required": ["label", "box"],
            }),
        ),
        ActionKind::TypeText => (
            "Types text into the focused input field. Click the field first. Only ASCII is typed; \
             a newline presses Enter and a tab presses Tab.",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"],
            }),
        ),
        ActionKind::PressKey => (
            "Presses a key or combination. Examples: 'enter', 'tab', 'esc', 'ctrl+l', 'alt+tab', 'alt+f4'.",
            json!({
                "type": "object",
                "properties": { "key": { "type": "string" } },
                "required": ["key"],
            }),
        ),
        ActionKind::Scroll => (
            "Scrolls down at a position. Without a box, scrolls at the screen center (500,500).",
            json!({
                "type": "object",
                "properties": { "box": box_schema("Optional scroll position in normalized 0-1000 coordinates.") },
                "required": [],
            }),
        ),
    }
}

/// The `tools` array of a chat-completions request.
pub fn tools() -> Value {
    let list: Vec<Value> = ActionKind::ALL
        .into_iter()
        .map(|kind| {
            let (description, parameters) = describe(kind);
            json!({
                "type": "function",
                "function": { "name": kind.name(), "description": description, "parameters": parameters },
            })
        })
        .collect();
    Value::Array(list)
}

pub struct Scenario {
    pub name: &'static str,
    pub task: &'static str,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "Describe desktop",
        task: "Observe the screen and describe which applications and windows are visible. Do not click anything.",
    },
    Scenario {
        name: "Open browser search",
        task: "Open the web browser, focus the address bar, search for 'rust programming language' and \
               report the title of the first result.",
    },
    Scenario {
        name: "Notepad note",
        task: "Open a plain text editor, type 'hello from pilot' into a new document, and report when the text is visible.",
    },
];

/// 1-based lookup, as shown by `--scenario`.
pub fn scenario(n: usize) -> Option<&'static Scenario> {
    n.checked_sub(1).and_then(|i| SCENARIOS.get(i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tools_cover_every_action() {
        let tools = tools();
        let names: Vec<&str> = tools.as_array().unwrap().iter().map(|t| t["function"]["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["observe", "click", "type_text", "press_key", "scroll"]);
    }

    #[test]
    fn test_click_schema_accepts_three_box_shapes() {
        let tools = tools();
        let click = &tools[1]["function"]["parameters"];
        assert_eq!(click["required"], json!(["label", "box"]));
        assert_eq!(click["properties"]["box"]["anyOf"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_scenario_lookup_is_one_based() {
        assert_eq!(scenario(1).map(|s| s.name), Some("Describe desktop"));
        assert!(scenario(0).is_none());
        assert!(scenario(SCENARIOS.len() + 1).is_none());
    }
}
