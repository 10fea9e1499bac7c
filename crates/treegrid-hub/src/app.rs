use anyhow::{Context, Result};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
};
use treegrid_core::{
    CollectionKey, ItemCancelEvent, ItemId, ModelError, RowChange, TreeGrid, TreeHost, TreeModel,
};

use crate::config::HubConfig;
use crate::demo_seed;
use crate::keybinds::{self, Action, KeyState};
use crate::ui;

/// Host-side state the grid talks to: selection and the change log shown in
/// the status bar.
#[derive(Debug, Default)]
pub struct View {
    /// Selection by identity, so it survives rows shifting around it.
    pub selected: Option<ItemId>,
    /// Last known row of the selection.
    pub cursor: usize,
    /// Row the grid asked us to select after a collapse.
    reselect: Option<usize>,
    multi_select: bool,
    pub last_change: String,
    pub changes_seen: u64,
}

impl View {
    fn new(multi_select: bool) -> Self {
        Self {
            multi_select,
            ..Default::default()
        }
    }
}

impl TreeHost<String> for View {
    fn selected_item(&self) -> Option<ItemId> {
        self.selected
    }

    fn allow_multiple_selection(&self) -> bool {
        self.multi_select
    }

    fn pre_reset_tree(&mut self) {
        log::debug!("reset started");
    }

    fn post_reset_tree(&mut self) {
        log::debug!("reset finished");
    }

    fn select_row(&mut self, row: usize) {
        self.reselect = Some(row);
    }

    fn expanding(&mut self, model: &mut TreeModel<String>, event: &mut ItemCancelEvent) {
        let item = event.item();
        if !model.children(item).is_empty() || !model.is_expandable(item) {
            return;
        }
        if let Err(err) = load_lazy_children(model, item) {
            log::error!("loading children of {item} failed: {err}");
            event.cancel();
        }
    }

    fn rows_changed(&mut self, change: &RowChange) {
        self.changes_seen += 1;
        self.last_change = match change {
            RowChange::Added { index, items } => format!("+{} at {index}", items.len()),
            RowChange::Removed { index, items } => format!("-{} at {index}", items.len()),
            RowChange::Moved { from, to, .. } => format!("moved {from}\u{2192}{to}"),
            RowChange::Replaced { index, .. } => format!("redraw {index}"),
            RowChange::Reset => "reset".to_string(),
        };
        log::trace!("row change: {change:?}");
    }
}

fn load_lazy_children(model: &mut TreeModel<String>, item: ItemId) -> Result<(), ModelError> {
    let parent = model.get(item).cloned().unwrap_or_default();
    for name in demo_seed::lazy_children(&parent) {
        let child = model.create(name);
        model.push(CollectionKey::Children(item), child)?;
    }
    model.set_lazy_expandable(item, false)?;
    log::info!("loaded children of {parent:?}");
    Ok(())
}

/// The main application state.
pub struct App {
    model: TreeModel<String>,
    grid: TreeGrid,
    view: View,
    key_state: KeyState,
    /// Rows in the tree area at the last render, for half-page moves.
    page_height: usize,
    next_name: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: &HubConfig) -> Result<Self> {
        let mut model = TreeModel::new();
        demo_seed::seed_demo_tree(&mut model)?;

        let mut grid = TreeGrid::new(&mut model);
        let mut view = View::new(config.multi_select);
        grid.initialize_items(&mut model, &mut view, CollectionKey::Root)
            .context("Failed to bind the demo tree")?;
        view.selected = grid.item_at_row(0);

        Ok(Self {
            model,
            grid,
            view,
            key_state: KeyState::default(),
            page_height: 20,
            next_name: 1,
            should_quit: false,
        })
    }

    /// Handle a terminal event.
    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return Ok(());
            }
            // Ctrl-c always quits
            if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
                self.should_quit = true;
                return Ok(());
            }
            self.handle_key(key)?;
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        let action = keybinds::process_key(key, &mut self.key_state);
        self.process_action(action)
    }

    fn process_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::None => return Ok(()),
            Action::Quit => self.should_quit = true,
            Action::MoveDown(n) => self.select_row(self.view.cursor.saturating_add(n)),
            Action::MoveUp(n) => self.select_row(self.view.cursor.saturating_sub(n)),
            Action::GotoTop => self.select_row(0),
            Action::GotoBottom => self.select_row(self.grid.count().saturating_sub(1)),
            Action::HalfPageDown => {
                self.select_row(self.view.cursor + (self.page_height / 2).max(1));
            }
            Action::HalfPageUp => {
                self.select_row(self.view.cursor.saturating_sub((self.page_height / 2).max(1)));
            }
            Action::Expand => {
                if let Some(row) = self.current_row() {
                    self.grid.expand_row(&mut self.model, &mut self.view, row)?;
                }
            }
            Action::CollapseOrParent => self.collapse_or_parent()?,
            Action::Toggle => {
                if let Some(row) = self.current_row() {
                    self.grid.toggle_row(&mut self.model, &mut self.view, row)?;
                }
            }
            Action::AddChild => self.add_child()?,
            Action::AddBelow => self.add_sibling(1)?,
            Action::AddAbove => self.add_sibling(0)?,
            Action::Delete => self.delete_selected()?,
            Action::MoveItemDown => self.move_selected(1)?,
            Action::MoveItemUp => self.move_selected(-1)?,
            Action::Reload => self.grid.reload_data(&mut self.model, &mut self.view)?,
        }
        self.settle();
        Ok(())
    }

    fn current_row(&self) -> Option<usize> {
        self.view.selected.and_then(|id| self.grid.index_of(id))
    }

    fn select_row(&mut self, row: usize) {
        let row = row.min(self.grid.count().saturating_sub(1));
        self.view.cursor = row;
        self.view.selected = self.grid.item_at_row(row);
    }

    /// Re-derive the cursor from the selected item after the rows changed.
    fn settle(&mut self) {
        if let Some(row) = self.view.reselect.take() {
            self.select_row(row);
            return;
        }
        match self.current_row() {
            Some(row) => self.view.cursor = row,
            // Selection vanished; keep the cursor where it was
            None => self.select_row(self.view.cursor),
        }
    }

    fn collapse_or_parent(&mut self) -> Result<()> {
        let Some(item) = self.view.selected else {
            return Ok(());
        };
        if self.model.is_expanded(item) {
            if let Some(row) = self.current_row() {
                self.grid.collapse_row(&mut self.model, &mut self.view, row)?;
            }
        } else if let Some(row) = self.model.parent(item).and_then(|p| self.grid.index_of(p)) {
            self.select_row(row);
        }
        Ok(())
    }

    fn new_item(&mut self) -> ItemId {
        let name = format!("node {}", self.next_name);
        self.next_name += 1;
        self.model.create(name)
    }

    fn add_child(&mut self) -> Result<()> {
        let key = match self.view.selected {
            Some(parent) => CollectionKey::Children(parent),
            None => CollectionKey::Root,
        };
        let id = self.new_item();
        self.grid
            .edit(&mut self.model, &mut self.view, |m| m.push(key, id))??;
        self.grid
            .expand_to_item(&mut self.model, &mut self.view, id)?;
        self.reveal(id);
        Ok(())
    }

    /// Insert a new sibling of the selection, `offset` 0 above it, 1 below.
    fn add_sibling(&mut self, offset: usize) -> Result<()> {
        let (key, index) = match self.view.selected {
            Some(sel) => {
                let key = self.model.location(sel).unwrap_or(CollectionKey::Root);
                let index = self.model.index_in_parent(sel).map_or(0, |i| i + offset);
                (key, index)
            }
            None => (CollectionKey::Root, self.model.len(CollectionKey::Root)),
        };
        let id = self.new_item();
        self.grid
            .edit(&mut self.model, &mut self.view, |m| m.insert(key, index, id))??;
        self.reveal(id);
        Ok(())
    }

    fn reveal(&mut self, id: ItemId) {
        if self.grid.index_of(id).is_some() {
            self.view.selected = Some(id);
        }
    }

    fn delete_selected(&mut self) -> Result<()> {
        let Some(sel) = self.view.selected else {
            return Ok(());
        };
        let name = self.model.get(sel).cloned().unwrap_or_default();
        self.grid.edit(&mut self.model, &mut self.view, |m| {
            m.detach(sel)?;
            m.discard(sel)
        })??;
        log::info!("removed {name:?}");
        Ok(())
    }

    fn move_selected(&mut self, delta: isize) -> Result<()> {
        let Some(sel) = self.view.selected else {
            return Ok(());
        };
        let (Some(key), Some(from)) = (self.model.location(sel), self.model.index_in_parent(sel))
        else {
            return Ok(());
        };
        let Some(to) = from
            .checked_add_signed(delta)
            .filter(|to| *to < self.model.len(key))
        else {
            return Ok(());
        };
        self.grid
            .edit(&mut self.model, &mut self.view, |m| m.move_within(key, from, to))??;
        Ok(())
    }

    fn status_line(&self) -> String {
        let count = self.grid.count();
        let position = if count == 0 {
            "empty".to_string()
        } else {
            format!("row {}/{count}", self.view.cursor + 1)
        };
        let level = self
            .grid
            .level_at_row(&self.model, self.view.cursor)
            .map_or_else(|| "-".to_string(), |l| l.to_string());
        let last = if self.view.last_change.is_empty() {
            "no changes yet"
        } else {
            self.view.last_change.as_str()
        };
        format!(
            "{position}  level {level}  {} changes  last: {last}",
            self.view.changes_seen
        )
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let [tree_area, status_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
        self.page_height = tree_area.height.saturating_sub(2) as usize;

        ui::render_tree(frame, tree_area, &self.model, &self.grid, self.view.cursor);
        ui::render_status_bar(frame, status_area, "TREE", &self.status_line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn app() -> App {
        let config = HubConfig::from_lookup(PathBuf::from("/tmp/treegrid"), |_| None).unwrap();
        App::new(&config).unwrap()
    }

    fn press(app: &mut App, keys: &str) {
        for c in keys.chars() {
            app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
                .unwrap();
        }
    }

    fn selected_name(app: &App) -> String {
        app.model.get(app.view.selected.unwrap()).unwrap().clone()
    }

    fn row_names(app: &App) -> Vec<String> {
        app.grid
            .rows()
            .iter()
            .map(|id| app.model.get(*id).unwrap().clone())
            .collect()
    }

    #[test]
    fn test_starts_on_first_row() {
        let app = app();
        assert_eq!(app.view.cursor, 0);
        assert_eq!(selected_name(&app), "src");
        assert_eq!(app.grid.count(), 9);
    }

    #[test]
    fn test_collapse_and_expand_with_keys() {
        let mut app = app();
        press(&mut app, "h");
        assert_eq!(app.grid.count(), 6);
        assert_eq!(app.view.last_change, "-3 at 1");

        press(&mut app, "l");
        assert_eq!(app.grid.count(), 9);
        assert_eq!(app.view.last_change, "+3 at 1");
    }

    #[test]
    fn test_h_on_leaf_goes_to_parent() {
        let mut app = app();
        press(&mut app, "jj");
        assert_eq!(selected_name(&app), "app.rs");
        press(&mut app, "h");
        assert_eq!(selected_name(&app), "src");
        assert_eq!(app.view.cursor, 0);
    }

    #[test]
    fn test_collapse_reselects_ancestor() {
        let mut app = app();
        press(&mut app, "jj");
        // Collapse src while a child is selected, through the grid directly
        app.grid
            .collapse_row(&mut app.model, &mut app.view, 0)
            .unwrap();
        app.settle();
        assert_eq!(selected_name(&app), "src");
    }

    #[test]
    fn test_lazy_folder_loads_on_expand() {
        let mut app = app();
        press(&mut app, "G");
        press(&mut app, "kkk");
        assert_eq!(selected_name(&app), "target");

        press(&mut app, " ");
        let names = row_names(&app);
        assert!(names.contains(&"target-1".to_string()));
        assert_eq!(app.grid.count(), 12);
        // Selection stays on the folder
        assert_eq!(selected_name(&app), "target");
    }

    #[test]
    fn test_add_child_reveals_new_item() {
        let mut app = app();
        press(&mut app, "jjjj");
        assert_eq!(selected_name(&app), "docs");
        press(&mut app, "a");
        assert_eq!(selected_name(&app), "node 1");
        let docs = app.model.roots()[1];
        assert!(app.model.is_expanded(docs));
        assert_eq!(app.grid.level_at_row(&app.model, app.view.cursor), Some(1));
    }

    #[test]
    fn test_add_siblings() {
        let mut app = app();
        press(&mut app, "j");
        press(&mut app, "o");
        assert_eq!(row_names(&app)[1..3], ["main.rs", "node 1"]);
        press(&mut app, "O");
        assert_eq!(row_names(&app)[1..4], ["main.rs", "node 2", "node 1"]);
        assert_eq!(selected_name(&app), "node 2");
    }

    #[test]
    fn test_dd_removes_subtree() {
        let mut app = app();
        press(&mut app, "dd");
        assert_eq!(row_names(&app)[0], "docs");
        assert_eq!(selected_name(&app), "docs");
        assert_eq!(app.grid.count(), 5);
    }

    #[test]
    fn test_reorder_siblings() {
        let mut app = app();
        press(&mut app, "J");
        assert_eq!(app.model.get(app.model.roots()[1]).unwrap(), "src");
        assert_eq!(selected_name(&app), "src");
        assert_eq!(app.view.cursor, 1);
        // Nothing above the top row
        press(&mut app, "KK");
        assert_eq!(app.view.cursor, 0);
    }

    #[test]
    fn test_reload_keeps_selection() {
        let mut app = app();
        press(&mut app, "jjR");
        assert_eq!(selected_name(&app), "app.rs");
        assert_eq!(app.view.cursor, 2);
    }

    #[test]
    fn test_status_line() {
        let app = app();
        let status = app.status_line();
        assert!(status.starts_with("row 1/9  level 0"));
    }
}
