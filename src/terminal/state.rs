use ratatui::widgets::ListState;

use crate::app::MenuItem;

/// Widget state that only matters to the terminal front end.
pub struct UiState {
    pub list_state: ListState,
    pub body_scroll: u16,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            list_state: ListState::default(),
            body_scroll: 0,
        }
    }

    /// Keep the selection on an actionable item after the menu was rebuilt.
    pub fn clamp(&mut self, items: &[MenuItem]) {
        let Some(first) = items.iter().position(|i| i.event.is_some()) else {
            self.list_state.select(None);
            return;
        };
        match self.list_state.selected() {
            Some(i) if items.get(i).is_some_and(|it| it.event.is_some()) => {}
            Some(i) if i < items.len() => self.move_selection(items, 1),
            _ => self.list_state.select(Some(first)),
        }
    }

    /// Step `delta` actionable items up or down; separators and plain text are skipped.
    pub fn move_selection(&mut self, items: &[MenuItem], delta: i32) {
        let actionable: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.event.is_some())
            .map(|(idx, _)| idx)
            .collect();
        if actionable.is_empty() {
            self.list_state.select(None);
            return;
        }
        let cur = self.list_state.selected().unwrap_or(0);
        let pos = match actionable.binary_search(&cur) {
            Ok(p) => p as i32,
            // between two actionable items: moving down lands on the next one
            Err(p) if delta > 0 => p as i32 - 1,
            Err(p) => p as i32,
        };
        let last = actionable.len() as i32 - 1;
        let next = (pos + delta).clamp(0, last) as usize;
        self.list_state.select(Some(actionable[next]));
    }

    pub fn selected<'a>(&self, items: &'a [MenuItem]) -> Option<&'a MenuItem> {
        self.list_state.selected().and_then(|i| items.get(i))
    }

    pub fn scroll_body(&mut self, delta: i32) {
        if delta < 0 {
            self.body_scroll = self.body_scroll.saturating_sub((-delta) as u16);
        } else {
            self.body_scroll = self.body_scroll.saturating_add(delta as u16);
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
