use crossterm::event::KeyCode;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::ui::widgets::TextInputState;

/// Maximum options shown in the dropdown at once.
const VISIBLE_LIMIT: usize = 15;

/// Search-as-you-type dropdown state for related-entity fields.
///
/// The option list comes from the caller (typically a remote search page);
/// while a fresh page is in flight the current one is narrowed locally with
/// fuzzy matching so the dropdown stays responsive.
#[derive(Debug, Clone, Default)]
pub struct AutocompleteState {
    input: TextInputState,
    options: Vec<String>,
    /// Indices into `options`, fuzzy-filtered and score-ordered.
    visible: Vec<usize>,
    is_open: bool,
    highlight_index: usize,
    /// Whether the source reported more results beyond the current page.
    has_more: bool,
}

impl AutocompleteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &TextInputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut TextInputState {
        &mut self.input
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn highlighted(&self) -> usize {
        self.highlight_index
    }

    /// Visible option labels, best match first.
    pub fn visible_options(&self) -> Vec<&str> {
        self.visible
            .iter()
            .filter_map(|&i| self.options.get(i).map(String::as_str))
            .collect()
    }

    /// Index into the full option list for the highlighted row.
    pub fn highlighted_option(&self) -> Option<usize> {
        self.visible.get(self.highlight_index).copied()
    }

    /// Install a fresh option page (e.g. a completed remote search).
    pub fn set_options(&mut self, options: Vec<String>, has_more: bool) {
        self.options = options;
        self.has_more = has_more;
        self.refilter();
        self.is_open = !self.visible.is_empty();
        self.highlight_index = 0;
    }

    /// Re-run local narrowing after the input text changed.
    pub fn refilter(&mut self) {
        let term = self.input.value();
        if term.is_empty() {
            self.visible = (0..self.options.len().min(VISIBLE_LIMIT)).collect();
        } else {
            let matcher = SkimMatcherV2::default();
            let mut scored: Vec<(usize, i64)> = self
                .options
                .iter()
                .enumerate()
                .filter_map(|(i, opt)| matcher.fuzzy_match(opt, term).map(|score| (i, score)))
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            self.visible = scored.into_iter().take(VISIBLE_LIMIT).map(|(i, _)| i).collect();
        }
        if self.highlight_index >= self.visible.len() {
            self.highlight_index = 0;
        }
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    /// Handle a typing key. Returns true when the search term changed.
    pub fn handle_input_key(&mut self, key: KeyCode) -> bool {
        let changed = self.input.handle_key(key, None);
        if changed {
            self.refilter();
            self.is_open = !self.visible.is_empty();
            self.highlight_index = 0;
        }
        changed
    }

    /// Handle a dropdown navigation key. Returns the committed option index
    /// (into the full option list) when Enter selects a row.
    pub fn handle_navigate_key(&mut self, key: KeyCode) -> Option<usize> {
        if !self.is_open {
            return None;
        }
        let count = self.visible.len();
        match key {
            KeyCode::Up => {
                if count > 0 {
                    self.highlight_index = if self.highlight_index == 0 {
                        count - 1
                    } else {
                        self.highlight_index - 1
                    };
                }
                None
            }
            KeyCode::Down => {
                if count > 0 {
                    self.highlight_index = (self.highlight_index + 1) % count;
                }
                None
            }
            KeyCode::Enter => {
                let picked = self.highlighted_option();
                if picked.is_some() {
                    self.close();
                }
                picked
            }
            KeyCode::Esc => {
                self.close();
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["M4 Bolt".into(), "M5 Bolt".into(), "Washer".into()]
    }

    #[test]
    fn fresh_page_opens_dropdown() {
        let mut state = AutocompleteState::new();
        state.set_options(options(), false);
        assert!(state.is_open());
        assert_eq!(state.visible_options().len(), 3);
    }

    #[test]
    fn typing_narrows_locally() {
        let mut state = AutocompleteState::new();
        state.set_options(options(), false);
        for c in "bolt".chars() {
            state.handle_input_key(KeyCode::Char(c));
        }
        assert_eq!(state.visible_options().len(), 2);
    }

    #[test]
    fn enter_commits_full_list_index() {
        let mut state = AutocompleteState::new();
        state.set_options(options(), false);
        for c in "washer".chars() {
            state.handle_input_key(KeyCode::Char(c));
        }
        let picked = state.handle_navigate_key(KeyCode::Enter);
        assert_eq!(picked, Some(2));
        assert!(!state.is_open());
    }
}
