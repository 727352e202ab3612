use std::str::FromStr;

use thiserror::Error;

use crate::core::{Editor, Mark};
use crate::editing::insert_text;
use crate::marks::toggle_mark;
use crate::plugin::CommandError;

/// Mark shortcuts. `mod` is the platform's primary modifier.
pub const HOTKEYS: [(&str, Mark); 3] = [
    ("mod+b", Mark::Bold),
    ("mod+i", Mark::Italic),
    ("mod+shift+x", Mark::Strikethrough),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyComboError {
    #[error("empty key combo")]
    Empty,
    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),
}

/// Decides which physical modifier `mod` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `mod` is command (meta).
    Mac,
    /// `mod` is control.
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }
}

/// A key plus the exact set of physical modifiers held with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: String,
}

impl KeyCombo {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: normalize_key(&key.into()),
            ..Self::default()
        }
    }

    /// Parses `mod+shift+x` style strings, resolving `mod` for `platform`.
    pub fn parse_for(s: &str, platform: Platform) -> Result<Self, KeyComboError> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = parts.pop().filter(|k| !k.is_empty()).ok_or(KeyComboError::Empty)?;

        let mut combo = KeyCombo::key(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "mod" => match platform {
                    Platform::Mac => combo.meta = true,
                    Platform::Other => combo.ctrl = true,
                },
                "ctrl" | "control" => combo.ctrl = true,
                "cmd" | "command" | "meta" | "super" | "win" => combo.meta = true,
                "shift" => combo.shift = true,
                "alt" | "option" | "opt" => combo.alt = true,
                other => return Err(KeyComboError::UnknownModifier(other.to_string())),
            }
        }
        Ok(combo)
    }

    pub fn matches(&self, hotkey: &str, platform: Platform) -> bool {
        KeyCombo::parse_for(hotkey, platform).is_ok_and(|combo| combo == *self)
    }
}

fn normalize_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    match key.as_str() {
        "arrowleft" => "left".to_string(),
        "arrowright" => "right".to_string(),
        "arrowup" => "up".to_string(),
        "arrowdown" => "down".to_string(),
        "return" => "enter".to_string(),
        "esc" => "escape".to_string(),
        _ => key,
    }
}

/// Parses for the platform this crate was built for.
impl FromStr for KeyCombo {
    type Err = KeyComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCombo::parse_for(s, Platform::current())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The editor acted; the host must suppress its default handling.
    Handled,
    /// The host should move the caret one offset (see `editing::move_by_offset`)
    /// instead of one character.
    MoveByOffset { reverse: bool },
    Ignored,
}

pub fn handle_key(editor: &mut Editor, combo: &KeyCombo) -> Result<KeyOutcome, CommandError> {
    handle_key_for(editor, combo, Platform::current())
}

pub fn handle_key_for(
    editor: &mut Editor,
    combo: &KeyCombo,
    platform: Platform,
) -> Result<KeyOutcome, CommandError> {
    let matches = |hotkey: &str| combo.matches(hotkey, platform);

    if let Some((_, mark)) = HOTKEYS.iter().find(|(hotkey, _)| matches(hotkey)) {
        toggle_mark(editor, *mark)?;
        return Ok(KeyOutcome::Handled);
    }

    if matches("shift+enter") {
        insert_text(editor, "\n")?;
        return Ok(KeyOutcome::Handled);
    }

    let collapsed = editor.selection().is_some_and(|s| s.is_collapsed());
    if collapsed {
        if matches("left") {
            return Ok(KeyOutcome::MoveByOffset { reverse: true });
        }
        if matches("right") {
            return Ok(KeyOutcome::MoveByOffset { reverse: false });
        }
    }

    Ok(KeyOutcome::Ignored)
}
