use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press asks the tree view to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The key was consumed but nothing happens (or a sequence is pending).
    None,
    Quit,
    MoveDown(usize),
    MoveUp(usize),
    GotoTop,
    GotoBottom,
    HalfPageDown,
    HalfPageUp,
    /// Expand the selected row.
    Expand,
    /// Collapse the selected row, or jump to its parent if already collapsed.
    CollapseOrParent,
    Toggle,
    AddChild,
    AddBelow,
    AddAbove,
    /// Remove the selected item and its subtree.
    Delete,
    /// Swap the selected item with its next sibling.
    MoveItemDown,
    /// Swap the selected item with its previous sibling.
    MoveItemUp,
    /// Throw away every row and rebuild from the model.
    Reload,
}

/// Pending key state for two-key sequences like `gg` and `dd`.
#[derive(Debug, Default, Clone)]
pub struct KeyState {
    pub pending_key: Option<char>,
}

impl KeyState {
    pub fn reset(&mut self) {
        self.pending_key = None;
    }
}

/// Map a key event to an action, accounting for multi-key sequences.
pub fn process_key(key: KeyEvent, state: &mut KeyState) -> Action {
    if let Some(pending) = state.pending_key {
        state.reset();
        return match (pending, key.code) {
            ('g', KeyCode::Char('g')) => Action::GotoTop,
            ('d', KeyCode::Char('d')) => Action::Delete,
            _ => Action::None, // Invalid sequence, ignore
        };
    }

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Action::MoveDown(1),
        KeyCode::Char('k') | KeyCode::Up => Action::MoveUp(1),
        KeyCode::Char('J') => Action::MoveItemDown,
        KeyCode::Char('K') => Action::MoveItemUp,
        KeyCode::Char('G') => Action::GotoBottom,
        KeyCode::Char('g') => {
            state.pending_key = Some('g');
            Action::None
        }
        KeyCode::Char('d') if key.modifiers == KeyModifiers::CONTROL => Action::HalfPageDown,
        KeyCode::Char('u') if key.modifiers == KeyModifiers::CONTROL => Action::HalfPageUp,
        KeyCode::Char('d') => {
            state.pending_key = Some('d');
            Action::None
        }
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => Action::Expand,
        KeyCode::Char('h') | KeyCode::Left => Action::CollapseOrParent,
        KeyCode::Char(' ') => Action::Toggle,
        KeyCode::Char('a') => Action::AddChild,
        KeyCode::Char('o') => Action::AddBelow,
        KeyCode::Char('O') => Action::AddAbove,
        KeyCode::Char('R') => Action::Reload,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_single_keys() {
        let mut state = KeyState::default();
        assert_eq!(process_key(key('j'), &mut state), Action::MoveDown(1));
        assert_eq!(process_key(key('O'), &mut state), Action::AddAbove);
        assert_eq!(process_key(key(' '), &mut state), Action::Toggle);
        assert_eq!(
            process_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), &mut state),
            Action::Expand
        );
    }

    #[test]
    fn test_two_key_sequences() {
        let mut state = KeyState::default();
        assert_eq!(process_key(key('g'), &mut state), Action::None);
        assert_eq!(process_key(key('g'), &mut state), Action::GotoTop);

        assert_eq!(process_key(key('d'), &mut state), Action::None);
        assert_eq!(process_key(key('d'), &mut state), Action::Delete);
        assert!(state.pending_key.is_none());
    }

    #[test]
    fn test_broken_sequence_is_dropped() {
        let mut state = KeyState::default();
        process_key(key('d'), &mut state);
        assert_eq!(process_key(key('j'), &mut state), Action::None);
        assert_eq!(process_key(key('j'), &mut state), Action::MoveDown(1));
    }

    #[test]
    fn test_esc_cancels_pending_sequence() {
        let mut state = KeyState::default();
        assert_eq!(process_key(key('d'), &mut state), Action::None);
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(process_key(esc, &mut state), Action::None);
        assert_eq!(state.pending_key, None);
        assert_eq!(process_key(key('j'), &mut state), Action::MoveDown(1));
    }

    #[test]
    fn test_ctrl_d_is_half_page() {
        let mut state = KeyState::default();
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(process_key(ctrl_d, &mut state), Action::HalfPageDown);
        assert!(state.pending_key.is_none());
    }
}
