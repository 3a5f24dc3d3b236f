mod matcher;
mod token;

pub use matcher::HotkeyMatcher;
pub use token::{key_to_token, modifier_tokens, Chord, KeyToken};

// One key transition, already canonicalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub token: KeyToken,
    pub pressed: bool,
}

impl KeyInput {
    pub fn down(token: KeyToken) -> Self {
        Self { token, pressed: true }
    }

    pub fn up(token: KeyToken) -> Self {
        Self { token, pressed: false }
    }
}
