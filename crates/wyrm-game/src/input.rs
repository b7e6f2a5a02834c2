//! Keyboard-to-action translation.
//!
//! The game logic never sees raw key codes. Every state handler works on
//! [`Action`] values, so rebinding or adding an input source stays local to
//! this module.

use winit::keyboard::KeyCode;

/// A game-level input action, independent of the physical key that fired it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Pause,
    Retry,
    MenuQuit,
    ToggleDebug,
}

impl Action {
    /// Stable name shown in the debug overlay.
    pub fn label(self) -> &'static str {
        match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::Confirm => "ENTER",
            Action::Pause => "PAUSE",
            Action::Retry => "RETRY",
            Action::MenuQuit => "MENU_QUIT",
            Action::ToggleDebug => "TOGGLE_DEBUG",
        }
    }
}

/// Where an action originated. Keyboard is the only backend wired up; a
/// gamepad backend would add its own variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Keyboard,
}

impl Source {
    /// Stable name shown in the debug overlay.
    pub fn label(self) -> &'static str {
        match self {
            Source::Keyboard => "KEYBOARD",
        }
    }
}

/// Maps a pressed key to its action, if any.
pub fn translate_key(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::ArrowUp => Some(Action::Up),
        KeyCode::ArrowDown => Some(Action::Down),
        KeyCode::ArrowLeft => Some(Action::Left),
        KeyCode::ArrowRight => Some(Action::Right),
        KeyCode::Enter | KeyCode::NumpadEnter => Some(Action::Confirm),
        KeyCode::Escape => Some(Action::Pause),
        KeyCode::KeyR => Some(Action::Retry),
        KeyCode::KeyM => Some(Action::MenuQuit),
        KeyCode::KeyD => Some(Action::ToggleDebug),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_and_menu_keys_map() {
        assert_eq!(translate_key(KeyCode::ArrowUp), Some(Action::Up));
        assert_eq!(translate_key(KeyCode::ArrowDown), Some(Action::Down));
        assert_eq!(translate_key(KeyCode::ArrowLeft), Some(Action::Left));
        assert_eq!(translate_key(KeyCode::ArrowRight), Some(Action::Right));
        assert_eq!(translate_key(KeyCode::Enter), Some(Action::Confirm));
        assert_eq!(translate_key(KeyCode::NumpadEnter), Some(Action::Confirm));
        assert_eq!(translate_key(KeyCode::Escape), Some(Action::Pause));
        assert_eq!(translate_key(KeyCode::KeyR), Some(Action::Retry));
        assert_eq!(translate_key(KeyCode::KeyM), Some(Action::MenuQuit));
        assert_eq!(translate_key(KeyCode::KeyD), Some(Action::ToggleDebug));
    }

    #[test]
    fn unbound_keys_map_to_nothing() {
        assert_eq!(translate_key(KeyCode::KeyW), None);
        assert_eq!(translate_key(KeyCode::Space), None);
        assert_eq!(translate_key(KeyCode::F11), None);
    }
}
