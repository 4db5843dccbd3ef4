//! Ordered message history sent to the model on every step.
//!
//! Entries are only ever appended. Pruning rewrites content inside existing
//! entries and never removes or reorders them.

use std::sync::OnceLock;

use regex::Regex;

use crate::actions::ActionRequest;

/// Text that replaces an image once it falls out of the retention window.
pub const IMAGE_PLACEHOLDER: &str = "captured image data (omitted)";

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// `data:` URL of an encoded screenshot.
    Image(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    System(String),
    User(Vec<Part>),
    Assistant { text: Option<String>, requests: Vec<ActionRequest> },
    Tool { call_id: String, name: String, content: String },
}

impl Entry {
    pub fn role(&self) -> &'static str {
        match self {
            Entry::System(_) => "system",
            Entry::User(_) => "user",
            Entry::Assistant { .. } => "assistant",
            Entry::Tool { .. } => "tool",
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(self, Entry::User(parts) if parts.iter().any(|p| matches!(p, Part::Image(_))))
    }

    fn has_reasoning(&self) -> bool {
        matches!(self, Entry::Assistant { text: Some(t), .. } if t.contains(THINK_OPEN) && t.contains(THINK_CLOSE))
    }
}

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

fn reasoning_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static pattern"))
}

/// Remove every `<think>...</think>` span and trim what is left.
pub fn strip_reasoning(text: &str) -> String {
    reasoning_span().replace_all(text, "").trim().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    entries: Vec<Entry>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the system prompt and the task.
    pub fn seeded(system_prompt: &str, task: &str) -> Self {
        let mut c = Self::new();
        c.push(Entry::System(system_prompt.to_string()));
        c.push(Entry::User(vec![Part::Text(task.to_string())]));
        c
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text of the most recent assistant entry that had any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| match e {
            Entry::Assistant { text: Some(t), .. } => Some(t.as_str()),
            _ => None,
        })
    }

    /// Replace the image parts of every image-bearing entry except the
    /// `keep` most recent ones with a placeholder. Returns how many entries changed.
    pub fn prune_images(&mut self, keep: usize) -> usize {
        let idxs: Vec<usize> = self.entries.iter().enumerate().filter(|(_, e)| e.has_image()).map(|(i, _)| i).collect();
        let excess = idxs.len().saturating_sub(keep);
        for &i in &idxs[..excess] {
            if let Entry::User(parts) = &mut self.entries[i] {
                for part in parts.iter_mut() {
                    if matches!(part, Part::Image(_)) {
                        *part = Part::Text(IMAGE_PLACEHOLDER.to_string());
                    }
                }
            }
        }
        excess
    }

    /// Strip reasoning spans from every assistant entry except the `keep`
    /// most recent ones carrying a span. Returns how many entries changed.
    pub fn prune_reasoning(&mut self, keep: usize) -> usize {
        let idxs: Vec<usize> =
            self.entries.iter().enumerate().filter(|(_, e)| e.has_reasoning()).map(|(i, _)| i).collect();
        let excess = idxs.len().saturating_sub(keep);
        for &i in &idxs[..excess] {
            if let Entry::Assistant { text: Some(t), .. } = &mut self.entries[i] {
                *t = strip_reasoning(t);
            }
        }
        excess
    }
}
