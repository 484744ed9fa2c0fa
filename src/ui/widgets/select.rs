use crossterm::event::KeyCode;

/// Dropdown state for choice fields. Unlike a plain list, a form choice may
/// legitimately have no selection yet.
#[derive(Debug, Clone, Default)]
pub struct SelectState {
    selected: Option<usize>,
    is_open: bool,
    highlight_index: usize,
    option_count: usize,
}

impl SelectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selected(index: usize) -> Self {
        Self {
            selected: Some(index),
            is_open: false,
            highlight_index: index,
            option_count: 0,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn highlighted(&self) -> usize {
        self.highlight_index
    }

    /// Called during rendering so navigation stays in bounds.
    pub fn update_option_count(&mut self, count: usize) {
        self.option_count = count;
        if count == 0 {
            self.selected = None;
            self.highlight_index = 0;
            return;
        }
        if let Some(sel) = self.selected {
            if sel >= count {
                self.selected = Some(count - 1);
            }
        }
        if self.highlight_index >= count {
            self.highlight_index = count - 1;
        }
    }

    pub fn open(&mut self) {
        self.is_open = true;
        self.highlight_index = self.selected.unwrap_or(0);
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn select(&mut self, index: usize) {
        self.selected = Some(index);
        self.highlight_index = index;
        self.is_open = false;
    }

    /// Handle a navigation key. Returns the newly committed index when Enter
    /// lands on an option.
    pub fn handle_key(&mut self, key: KeyCode) -> Option<usize> {
        if !self.is_open {
            match key {
                KeyCode::Enter | KeyCode::Char(' ') => self.open(),
                _ => {}
            }
            return None;
        }
        match key {
            KeyCode::Up => {
                if self.option_count > 0 {
                    self.highlight_index = if self.highlight_index == 0 {
                        self.option_count - 1
                    } else {
                        self.highlight_index - 1
                    };
                }
                None
            }
            KeyCode::Down => {
                if self.option_count > 0 {
                    self.highlight_index = (self.highlight_index + 1) % self.option_count;
                }
                None
            }
            KeyCode::Enter => {
                if self.option_count > 0 {
                    let index = self.highlight_index;
                    self.select(index);
                    Some(index)
                } else {
                    None
                }
            }
            KeyCode::Esc => {
                self.close();
                None
            }
            _ => None,
        }
    }
}
