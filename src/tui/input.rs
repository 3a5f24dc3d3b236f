use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::mode::TuiState;
use crate::hotkey::{KeyInput, key_to_token, modifier_tokens};
use crate::shared::UiAction;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key(KeyInput),     // raw transition for the hotkey matcher
    Action(UiAction),  // what the key means to the tui
}

// wait up to `timeout` for input, then drain whatever else is queued.
// Keys come back raw: what one means depends on the mode the previous one
// left behind, so translation happens per key at the caller.
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<KeyEvent>> {
    let mut keys = Vec::new();
    if !event::poll(timeout)? {
        return Ok(keys);
    }
    loop {
        if let Event::Key(key) = event::read()? {
            keys.push(key);
        }
        if !event::poll(Duration::ZERO)? {
            break;
        }
    }
    Ok(keys)
}

// turn one terminal key event into matcher transitions and tui actions
pub fn translate(key: KeyEvent, ts: &TuiState) -> Vec<InputEvent> {
    let action = match key.kind {
        KeyEventKind::Press => resolve_action(&key, ts),
        KeyEventKind::Repeat if ts.renaming => resolve_action(&key, ts), // held key types on
        _ => None,
    };
    // capture control keys never become part of the chord, typed title
    // characters never reach the matcher at all
    let feed_matcher = match key.kind {
        KeyEventKind::Release => true,
        _ => !ts.renaming && !(ts.capturing && action.is_some()),
    };

    let mut events = Vec::new();
    if feed_matcher {
        let token = key_to_token(key.code, key.state);
        if ts.enhanced {
            match key.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => {
                    events.push(InputEvent::Key(KeyInput::down(token)))
                }
                KeyEventKind::Release => events.push(InputEvent::Key(KeyInput::up(token))),
            }
        } else if key.kind != KeyEventKind::Release {
            // no release events from this terminal: fake the whole stroke,
            // modifiers down first and up last
            let mods = modifier_tokens(key.modifiers);
            for m in &mods {
                events.push(InputEvent::Key(KeyInput::down(m.clone())));
            }
            events.push(InputEvent::Key(KeyInput::down(token.clone())));
            events.push(InputEvent::Key(KeyInput::up(token)));
            for m in mods.into_iter().rev() {
                events.push(InputEvent::Key(KeyInput::up(m)));
            }
        }
    }
    if let Some(action) = action {
        events.push(InputEvent::Action(action));
    }
    events
}

fn resolve_action(key: &KeyEvent, ts: &TuiState) -> Option<UiAction> {
    let code = key.code;
    if ts.renaming {
        let shortcut = key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        return match code {
            KeyCode::Enter => Some(UiAction::AcceptRename),
            KeyCode::Backspace => Some(UiAction::RenameBackspace),
            KeyCode::Esc => Some(UiAction::CancelRename),
            KeyCode::Char(_) if shortcut => None,
            KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::SHIFT) => {
                Some(UiAction::RenameInput(c.to_ascii_uppercase()))
            }
            KeyCode::Char(c) => Some(UiAction::RenameInput(c)),
            _ => None,
        };
    }
    if ts.capturing {
        return match code {
            KeyCode::Enter => Some(UiAction::AcceptCapture),
            KeyCode::Backspace => Some(UiAction::ResetCapture),
            KeyCode::Esc => Some(UiAction::CancelCapture),
            _ => None,
        };
    }
    let action = match code {
        KeyCode::Up => UiAction::SelectUp,
        KeyCode::Down => UiAction::SelectDown,
        KeyCode::Enter => UiAction::PlaySelected,
        KeyCode::F(2) => UiAction::BeginCapture,
        KeyCode::F(3) => UiAction::BeginRename,
        KeyCode::F(4) => UiAction::ToggleFavorite,
        KeyCode::F(6) => UiAction::CycleSort,
        KeyCode::Delete => UiAction::DeleteSelected,
        KeyCode::Tab => UiAction::CycleVirtualCable,
        KeyCode::Esc => UiAction::Quit,
        _ => return None,
    };
    Some(action)
}
