//! Key names accepted by `press_key`: `enter`, `ctrl+l`, `alt+shift+tab`, ...

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    Enter,
    Tab,
    Escape,
    Space,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Named(NamedKey),
    /// Printable ASCII character, lower-cased.
    Char(char),
}

/// Modifiers are held in order, the key is tapped, then modifiers are released in reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Vec<Modifier>,
    pub key: Key,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError(pub String);

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for KeyParseError {}

fn modifier(name: &str) -> Option<Modifier> {
    match name {
        "ctrl" | "control" => Some(Modifier::Ctrl),
        "alt" | "option" => Some(Modifier::Alt),
        "shift" => Some(Modifier::Shift),
        "win" | "cmd" | "command" | "super" | "meta" => Some(Modifier::Meta),
        _ => None,
    }
}

fn named(name: &str) -> Option<NamedKey> {
    let key = match name {
        "enter" | "return" => NamedKey::Enter,
        "tab" => NamedKey::Tab,
        "esc" | "escape" => NamedKey::Escape,
        "space" => NamedKey::Space,
        "backspace" => NamedKey::Backspace,
        "delete" | "del" => NamedKey::Delete,
        "insert" | "ins" => NamedKey::Insert,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "pageup" | "pgup" => NamedKey::PageUp,
        "pagedown" | "pgdn" => NamedKey::PageDown,
        "up" => NamedKey::Up,
        "down" => NamedKey::Down,
        "left" => NamedKey::Left,
        "right" => NamedKey::Right,
        _ => {
            let n: u8 = name.strip_prefix('f')?.parse().ok()?;
            if !(1..=12).contains(&n) {
                return None;
            }
            NamedKey::F(n)
        }
    };
    Some(key)
}

impl KeyCombo {
    /// Parse a lower-cased, trimmed combination such as `ctrl+shift+t`.
    pub fn parse(spec: &str) -> Result<Self, KeyParseError> {
        let spec = spec.trim().to_lowercase();
        if spec.is_empty() {
            return Err(KeyParseError("key required".into()));
        }

        // "+" on its own, or as the final key in "ctrl++"
        let (head, last) = match spec.strip_suffix("++") {
            Some(head) => (head, "+"),
            None if spec == "+" => ("", "+"),
            None => match spec.rsplit_once('+') {
                Some((head, last)) => (head, last),
                None => ("", spec.as_str()),
            },
        };

        let mut modifiers = Vec::new();
        for part in head.split('+').filter(|p| !p.is_empty() || !head.is_empty()) {
            let part = part.trim();
            let m = modifier(part).ok_or_else(|| KeyParseError(format!("unknown modifier '{}'", part)))?;
            if !modifiers.contains(&m) {
                modifiers.push(m);
            }
        }

        let last = last.trim();
        let key = if let Some(k) = named(last) {
            Key::Named(k)
        } else {
            let mut chars = last.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_graphic() => Key::Char(c),
                _ => return Err(KeyParseError(format!("unknown key '{}'", last))),
            }
        };

        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            let name = match m {
                Modifier::Ctrl => "ctrl",
                Modifier::Alt => "alt",
                Modifier::Shift => "shift",
                Modifier::Meta => "meta",
            };
            write!(f, "{}+", name)?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{}", c),
            Key::Named(NamedKey::F(n)) => write!(f, "f{}", n),
            Key::Named(k) => write!(f, "{}", format!("{:?}", k).to_lowercase()),
        }
    }
}

/// Printable ASCII plus tab and newline; everything else is dropped.
pub fn typeable(text: &str) -> String {
    text.chars().filter(|&c| matches!(c, ' '..='~') || control_key(c).is_some()).collect()
}

/// Key to tap for a control character kept by `typeable`.
pub fn control_key(c: char) -> Option<NamedKey> {
    match c {
        '\n' => Some(NamedKey::Enter),
        '\t' => Some(NamedKey::Tab),
        _ => None,
    }
}
