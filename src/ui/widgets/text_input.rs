use crossterm::event::KeyCode;

/// Owns the text value and cursor state for one input.
#[derive(Debug, Clone, Default)]
pub struct TextInputState {
    value: String,
    cursor_pos: usize,
}

impl TextInputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state pre-filled with a value, cursor at the end.
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor_pos = value.chars().count();
        Self { value, cursor_pos }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    /// Replace the value wholesale, cursor moves to the end.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor_pos = self.value.chars().count();
    }

    /// Handle a key press. Returns true if the text changed (not just the
    /// cursor position).
    pub fn handle_key(&mut self, key: KeyCode, max_length: Option<usize>) -> bool {
        let char_count = self.value.chars().count();

        match key {
            KeyCode::Char(c) => {
                if let Some(max) = max_length {
                    if char_count >= max {
                        return false;
                    }
                }
                let mut chars: Vec<char> = self.value.chars().collect();
                chars.insert(self.cursor_pos, c);
                self.cursor_pos += 1;
                self.value = chars.into_iter().collect();
                true
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    let mut chars: Vec<char> = self.value.chars().collect();
                    chars.remove(self.cursor_pos - 1);
                    self.cursor_pos -= 1;
                    self.value = chars.into_iter().collect();
                    true
                } else {
                    false
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < char_count {
                    let mut chars: Vec<char> = self.value.chars().collect();
                    chars.remove(self.cursor_pos);
                    self.value = chars.into_iter().collect();
                    true
                } else {
                    false
                }
            }
            KeyCode::Left => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                }
                false
            }
            KeyCode::Right => {
                if self.cursor_pos < char_count {
                    self.cursor_pos += 1;
                }
                false
            }
            KeyCode::Home => {
                self.cursor_pos = 0;
                false
            }
            KeyCode::End => {
                self.cursor_pos = char_count;
                false
            }
            _ => false,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_inserts_at_cursor() {
        let mut state = TextInputState::with_value("ac");
        state.handle_key(KeyCode::Left, None);
        assert!(state.handle_key(KeyCode::Char('b'), None));
        assert_eq!(state.value(), "abc");
    }

    #[test]
    fn max_length_blocks_insertion() {
        let mut state = TextInputState::with_value("ab");
        assert!(!state.handle_key(KeyCode::Char('c'), Some(2)));
        assert_eq!(state.value(), "ab");
    }

    #[test]
    fn backspace_at_start_is_noop() {
        let mut state = TextInputState::with_value("x");
        state.handle_key(KeyCode::Home, None);
        assert!(!state.handle_key(KeyCode::Backspace, None));
        assert_eq!(state.value(), "x");
    }
}
