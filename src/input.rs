//! Key bindings: arrows or vim keys to move, a/d or u/i to rotate.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveUp,
    MoveRight,
    MoveDown,
    RotateClockwise,
    RotateCounterClockwise,
    Restart,
    ClearHighScores,
    Quit,
    None,
}

/// Map key event to game action. Shift is ignored, so caps lock still plays.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Action::None;
    }
    let code = match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    };
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Left | KeyCode::Char('h') => Action::MoveLeft,
        KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
        KeyCode::Right | KeyCode::Char('l') => Action::MoveRight,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
        KeyCode::Char('d' | 'i') => Action::RotateClockwise,
        KeyCode::Char('a' | 'u') => Action::RotateCounterClockwise,
        KeyCode::Char('r') => Action::Restart,
        KeyCode::Char('c') => Action::ClearHighScores,
        _ => Action::None,
    }
}
