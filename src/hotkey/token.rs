use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEventState, KeyModifiers, ModifierKeyCode};
use serde::{Deserialize, Serialize};

const SEPARATOR: char = '+';

// canonical key name, independent of how the terminal reported it
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// Left and right modifiers collapse to Ctrl/Alt/Shift, letters are uppercased
// and keypad digits become Numpad0..Numpad9. Unknown keys get an opaque token
// from the raw code so they can still be part of a chord.
pub fn key_to_token(code: KeyCode, state: KeyEventState) -> KeyToken {
    let name = match code {
        KeyCode::Modifier(m) => return modifier_token(m),
        KeyCode::Char(c) if state.contains(KeyEventState::KEYPAD) && c.is_ascii_digit() => {
            format!("Numpad{c}")
        }
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(SEPARATOR) => "Plus".to_string(),
        KeyCode::Char(c) => c.to_uppercase().collect(),
        KeyCode::F(n) => format!("F{n}"),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Tab | KeyCode::BackTab => "Tab".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Delete => "Delete".to_string(),
        KeyCode::Insert => "Insert".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::CapsLock => "CapsLock".to_string(),
        KeyCode::ScrollLock => "ScrollLock".to_string(),
        KeyCode::NumLock => "NumLock".to_string(),
        KeyCode::PrintScreen => "PrintScreen".to_string(),
        KeyCode::Pause => "Pause".to_string(),
        KeyCode::Menu => "Menu".to_string(),
        other => format!("Key{other:?}").replace(SEPARATOR, "Plus"),
    };
    KeyToken(name)
}

fn modifier_token(m: ModifierKeyCode) -> KeyToken {
    let name = match m {
        ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => "Ctrl",
        ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => "Alt",
        ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => "Shift",
        ModifierKeyCode::LeftSuper | ModifierKeyCode::RightSuper => "Super",
        ModifierKeyCode::LeftHyper | ModifierKeyCode::RightHyper => "Hyper",
        ModifierKeyCode::LeftMeta | ModifierKeyCode::RightMeta => "Meta",
        ModifierKeyCode::IsoLevel3Shift => "AltGr",
        ModifierKeyCode::IsoLevel5Shift => "IsoLevel5Shift",
    };
    KeyToken::new(name)
}

// for terminals that only report modifiers as flags on other keys
pub fn modifier_tokens(mods: KeyModifiers) -> Vec<KeyToken> {
    let mut tokens = Vec::new();
    if mods.contains(KeyModifiers::CONTROL) {
        tokens.push(KeyToken::new("Ctrl"));
    }
    if mods.contains(KeyModifiers::ALT) {
        tokens.push(KeyToken::new("Alt"));
    }
    if mods.contains(KeyModifiers::SHIFT) {
        tokens.push(KeyToken::new("Shift"));
    }
    if mods.contains(KeyModifiers::SUPER) {
        tokens.push(KeyToken::new("Super"));
    }
    tokens
}

// stored as sorted tokens joined by '+', e.g. "A+Ctrl"
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Chord(BTreeSet<KeyToken>);

impl Chord {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_keys<I, T>(keys: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<KeyToken>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    #[cfg(test)]
    pub fn keys(&self) -> &BTreeSet<KeyToken> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    // Exact equality, never subset or superset.
    pub fn matches(&self, held: &BTreeSet<KeyToken>) -> bool {
        !self.0.is_empty() && self.0 == *held
    }
}

impl From<BTreeSet<KeyToken>> for Chord {
    fn from(keys: BTreeSet<KeyToken>) -> Self {
        Self(keys)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl FromStr for Chord {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(
            s.split(SEPARATOR)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(KeyToken::from)
                .collect(),
        ))
    }
}

impl From<String> for Chord {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(chord) => chord,
            Err(never) => match never {},
        }
    }
}

impl From<Chord> for String {
    fn from(chord: Chord) -> Self {
        chord.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(code: KeyCode) -> String {
        key_to_token(code, KeyEventState::NONE).to_string()
    }

    #[test]
    fn test_modifiers_collapse() {
        for (m, want) in [
            (ModifierKeyCode::LeftControl, "Ctrl"),
            (ModifierKeyCode::RightControl, "Ctrl"),
            (ModifierKeyCode::LeftAlt, "Alt"),
            (ModifierKeyCode::RightAlt, "Alt"),
            (ModifierKeyCode::LeftShift, "Shift"),
            (ModifierKeyCode::RightShift, "Shift"),
        ] {
            assert_eq!(tok(KeyCode::Modifier(m)), want);
        }
    }

    #[test]
    fn test_letters_are_uppercased() {
        assert_eq!(tok(KeyCode::Char('a')), "A");
        assert_eq!(tok(KeyCode::Char('A')), "A");
        assert_eq!(tok(KeyCode::Char('z')), "Z");
    }

    #[test]
    fn test_keypad_digits() {
        let token = key_to_token(KeyCode::Char('7'), KeyEventState::KEYPAD);
        assert_eq!(token.as_str(), "Numpad7");
        assert_eq!(tok(KeyCode::Char('7')), "7");
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(tok(KeyCode::Char(' ')), "Space");
        assert_eq!(tok(KeyCode::Enter), "Enter");
        assert_eq!(tok(KeyCode::F(5)), "F5");
        assert_eq!(tok(KeyCode::PageDown), "PageDown");
        assert_eq!(tok(KeyCode::Char('+')), "Plus");
    }

    #[test]
    fn test_unknown_keys_still_get_a_token() {
        let token = tok(KeyCode::Null);
        assert!(!token.is_empty());
        assert!(!token.contains(SEPARATOR));
    }

    #[test]
    fn test_modifier_flags() {
        let tokens = modifier_tokens(KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(tokens, vec![KeyToken::new("Ctrl"), KeyToken::new("Shift")]);
        assert!(modifier_tokens(KeyModifiers::NONE).is_empty());
    }

    #[test]
    fn test_chord_string_is_sorted() {
        let chord = Chord::from_keys(["Shift", "Ctrl", "A"]);
        assert_eq!(chord.to_string(), "A+Ctrl+Shift");
        assert_eq!("Ctrl+A".parse::<Chord>().unwrap(), Chord::from_keys(["A", "Ctrl"]));
        assert!("".parse::<Chord>().unwrap().is_empty());
    }

    #[test]
    fn test_chord_matches_exactly() {
        let chord = Chord::from_keys(["Ctrl", "A"]);
        let held = |keys: &[&str]| keys.iter().map(|k| KeyToken::from(*k)).collect::<BTreeSet<_>>();
        assert!(chord.matches(&held(&["A", "Ctrl"])));
        assert!(!chord.matches(&held(&["Ctrl"])));
        assert!(!chord.matches(&held(&["Ctrl", "A", "Shift"])));
        assert!(!Chord::new().matches(&held(&[])));
    }

    #[test]
    fn test_chord_serde() {
        let chord = Chord::from_keys(["Ctrl", "B"]);
        let json = serde_json::to_string(&chord).unwrap();
        assert_eq!(json, "\"B+Ctrl\"");
        let back: Chord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chord);
    }
}
