use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{Action, AppMode};

/// Map key events to actions based on current mode
pub fn handle_key(key: KeyEvent, mode: AppMode) -> Action {
    if key.kind == KeyEventKind::Release {
        return Action::Tick;
    }
    match mode {
        AppMode::Help => handle_key_help(key),
        AppMode::Browsing => handle_key_browsing(key),
    }
}

fn handle_key_help(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => Action::HideHelp,
        _ => Action::Tick,
    }
}

fn handle_key_browsing(key: KeyEvent) -> Action {
    match key.code {
        // Quit
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => Action::MoveUp,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Home | KeyCode::Char('g') => Action::GoToFirst,
        KeyCode::End | KeyCode::Char('G') => Action::GoToLast,

        // Directories
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Action::Enter,
        KeyCode::Left | KeyCode::Backspace | KeyCode::Char('h') => Action::GoUp,

        // Ordering
        KeyCode::Char('s') => Action::SortBySize,
        KeyCode::Char('i') => Action::SortByInodes,
        KeyCode::Char('r') => Action::Reverse,
        KeyCode::Char('R') | KeyCode::F(5) => Action::Refresh,

        // Help
        KeyCode::Char('?') => Action::ShowHelp,

        _ => Action::Tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_browsing_keys() {
        let mode = AppMode::Browsing;
        assert_eq!(handle_key(press(KeyCode::Char('s')), mode), Action::SortBySize);
        assert_eq!(handle_key(press(KeyCode::Char('i')), mode), Action::SortByInodes);
        assert_eq!(handle_key(press(KeyCode::Char('r')), mode), Action::Reverse);
        assert_eq!(handle_key(press(KeyCode::Enter), mode), Action::Enter);
        assert_eq!(handle_key(press(KeyCode::Right), mode), Action::Enter);
        assert_eq!(handle_key(press(KeyCode::Left), mode), Action::GoUp);
        assert_eq!(handle_key(press(KeyCode::Backspace), mode), Action::GoUp);
        assert_eq!(handle_key(press(KeyCode::Char('q')), mode), Action::Quit);
        assert_eq!(
            handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), mode),
            Action::Quit
        );
    }

    #[test]
    fn test_help_swallows_keys() {
        assert_eq!(handle_key(press(KeyCode::Char('s')), AppMode::Help), Action::Tick);
        assert_eq!(handle_key(press(KeyCode::Esc), AppMode::Help), Action::HideHelp);
    }
}
