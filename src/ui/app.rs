use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use time::OffsetDateTime;
use tracing::{debug, error, info};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::config::{Config, UiColors};
use crate::model::{ContactId, DraftField};
use crate::session::{Notice, Session, SessionError};
use crate::view::{DisplayEntry, DisplayList};

use super::draw;
use super::form::{ContactForm, NoteEditor};

pub struct ConfirmModal {
    pub title: String,
    pub message: String,
    pub action: ConfirmAction,
}

/// Action to perform when confirm modal is accepted
#[derive(Debug, Clone)]
pub enum ConfirmAction {
    DeleteContact(ContactId),
    DeleteSelected,
}

/// Help modal state with scroll support
#[derive(Debug, Clone)]
pub struct HelpModal {
    /// Current scroll offset (line index at top of viewport)
    pub scroll: usize,
    pub total_lines: usize,
    /// Set during rendering
    pub viewport_height: usize,
}

impl HelpModal {
    pub fn new(total_lines: usize) -> Self {
        Self {
            scroll: 0,
            total_lines,
            viewport_height: 10,
        }
    }

    pub fn scroll_down(&mut self, lines: usize) {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        self.scroll = (self.scroll + lines).min(max_scroll);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.total_lines.saturating_sub(self.viewport_height);
    }

    pub fn can_scroll_up(&self) -> bool {
        self.scroll > 0
    }

    pub fn can_scroll_down(&self) -> bool {
        self.scroll + self.viewport_height < self.total_lines
    }
}

pub struct HelpSection {
    pub title: &'static str,
    pub entries: Vec<HelpEntry>,
}

pub struct HelpEntry {
    pub action: &'static str,
    pub keys: String,
}

pub struct App<'a> {
    config: &'a Config,
    session: Session,
    display: DisplayList,
    cursor: usize,
    pub search_input: Input,
    pub search_focused: bool,
    pub form: Option<ContactForm>,
    pub note_editor: Option<NoteEditor>,
    pub confirm_modal: Option<ConfirmModal>,
    pub help_modal: Option<HelpModal>,
    /// Rows visible in the list pane; set during rendering.
    pub list_height: usize,
    status: Option<String>,
}

impl<'a> App<'a> {
    pub fn new(session: Session, config: &'a Config) -> Self {
        let display = session.display();
        let search_input = Input::new(session.state().search_term.clone());
        Self {
            config,
            session,
            display,
            cursor: 0,
            search_input,
            search_focused: false,
            form: None,
            note_editor: None,
            confirm_modal: None,
            help_modal: None,
            list_height: 10,
            status: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(250))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }

            self.session.expire_notices();
        }
        Ok(())
    }

    /// Returns true when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c'))
        {
            return Ok(true);
        }

        if self.help_modal.is_some() {
            self.handle_help_modal_key(key);
            return Ok(false);
        }

        if self.form.is_some() {
            self.handle_form_key(key);
            return Ok(false);
        }

        if self.note_editor.is_some() {
            self.handle_note_key(key);
            return Ok(false);
        }

        if self.confirm_modal.is_some() {
            self.handle_confirm_modal_key(key);
            return Ok(false);
        }

        if self.search_focused {
            self.handle_search_key(key);
            return Ok(false);
        }

        Ok(self.handle_list_key(key))
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> bool {
        let config = self.config;
        let global = &config.keys.global;
        let list = &config.keys.list;

        if self.key_matches_any(&key, &global.quit) {
            return true;
        }

        self.status = None;

        if self.key_matches_any(&key, &global.search) {
            self.search_input = Input::new(self.session.state().search_term.clone());
            self.search_focused = true;
        } else if self.key_matches_any(&key, &global.help) {
            self.show_help();
        } else if self.key_matches_any(&key, &global.refresh) {
            let result = self.session.refresh();
            self.after_session(result);
        } else if self.key_matches_any(&key, &list.next) {
            self.move_cursor(1);
        } else if self.key_matches_any(&key, &list.prev) {
            self.move_cursor(-1);
        } else if self.key_matches_any(&key, &list.page_down) {
            self.move_cursor(self.page() as isize);
        } else if self.key_matches_any(&key, &list.page_up) {
            self.move_cursor(-(self.page() as isize));
        } else if self.key_matches_any(&key, &list.add) {
            self.form = Some(ContactForm::add());
        } else if self.key_matches_any(&key, &list.edit) {
            if let Some(entry) = self.current() {
                self.form = Some(ContactForm::edit(&entry.contact));
            }
        } else if self.key_matches_any(&key, &list.delete) {
            if let Some(entry) = self.current() {
                self.confirm_modal = Some(ConfirmModal {
                    title: "DELETE CONTACT".to_string(),
                    message: format!("Delete {}?", entry.contact.name),
                    action: ConfirmAction::DeleteContact(entry.contact.id.clone()),
                });
            }
        } else if self.key_matches_any(&key, &list.favorite) {
            if let Some(id) = self.current_id() {
                let result = self.session.toggle_favorite(&id);
                self.after_session(result);
            }
        } else if self.key_matches_any(&key, &list.pin) {
            if let Some(id) = self.current_id() {
                let result = self.session.toggle_pinned(&id);
                self.after_session(result);
            }
        } else if self.key_matches_any(&key, &list.note) {
            if let Some(entry) = self.current() {
                self.note_editor = Some(NoteEditor::new(
                    entry.contact.id.clone(),
                    entry.contact.name.clone(),
                    &entry.note,
                ));
            }
        } else if self.key_matches_any(&key, &list.select) {
            if let Some(id) = self.current_id() {
                self.session.toggle_selection(&id);
                self.sync();
            }
        } else if self.key_matches_any(&key, &list.select_all) {
            self.session.select_all_or_none();
            self.sync();
        } else if self.key_matches_any(&key, &list.bulk_delete) {
            let count = self.session.state().selection.len();
            if count > 0 {
                self.confirm_modal = Some(ConfirmModal {
                    title: "DELETE SELECTED".to_string(),
                    message: format!("Delete {} selected contacts?", count),
                    action: ConfirmAction::DeleteSelected,
                });
            }
        } else if self.key_matches_any(&key, &list.sort) {
            self.session.cycle_sort();
            self.sync();
        } else if self.key_matches_any(&key, &list.address_filter) {
            self.session.toggle_address_filter();
            self.sync();
        } else if self.key_matches_any(&key, &list.clear_filters) {
            self.session.clear_filters();
            self.search_input.reset();
            self.sync();
        } else if self.key_matches_any(&key, &list.export) {
            self.export();
        } else if self.key_matches_any(&key, &list.dismiss) {
            self.session.dismiss_notice();
        }

        false
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let form_keys = &config.keys.form;

        if self.key_matches_any(&key, &form_keys.cancel) {
            self.search_focused = false;
            self.search_input = Input::new(self.session.state().search_term.clone());
            return;
        }

        if self.key_matches_any(&key, &form_keys.confirm) {
            self.search_focused = false;
            let term = self.search_input.value().to_string();
            let result = self.session.search(&term);
            self.after_session(result);
            self.cursor = 0;
            return;
        }

        self.search_input.handle_event(&Event::Key(key));
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let form_keys = &config.keys.form;
        let cancel = self.key_matches_any(&key, &form_keys.cancel);
        let confirm = self.key_matches_any(&key, &form_keys.confirm);
        let next = self.key_matches_any(&key, &form_keys.next_field);
        let prev = self.key_matches_any(&key, &form_keys.prev_field);

        let Some(form) = self.form.as_mut() else {
            return;
        };

        if cancel {
            self.form = None;
        } else if confirm {
            self.submit_form();
        } else if next {
            form.next_field();
        } else if prev {
            form.prev_field();
        } else {
            form.handle_key_event(key);
        }
    }

    fn submit_form(&mut self) {
        let Some(mut form) = self.form.take() else {
            return;
        };

        let draft = form.draft();
        let result = match form.target() {
            Some(id) => self.session.update(id, draft),
            None => self.session.create(draft),
        };

        match result {
            Ok(contact) => {
                self.sync();
                self.focus_on(&contact.id);
            }
            Err(SessionError::Validation(errors)) => {
                form.set_errors(errors);
                self.form = Some(form);
            }
            Err(err) => {
                // keep the form open so the input is not lost
                debug!("form submit failed: {}", err);
                self.form = Some(form);
                self.sync();
            }
        }
    }

    fn handle_note_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let form_keys = &config.keys.form;
        if self.key_matches_any(&key, &form_keys.cancel) {
            self.note_editor = None;
            return;
        }

        if self.key_matches_any(&key, &form_keys.confirm) {
            if let Some(editor) = self.note_editor.take() {
                let result = self.session.set_note(&editor.target, editor.value());
                self.after_session(result);
            }
            return;
        }

        if let Some(editor) = self.note_editor.as_mut() {
            editor.handle_key_event(key);
        }
    }

    fn handle_confirm_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.confirm_modal.take() else {
            return;
        };

        let config = self.config;
        let modal_keys = &config.keys.modal;

        if self.key_matches_any(&key, &modal_keys.cancel) {
            return;
        }

        if self.key_matches_any(&key, &modal_keys.confirm) {
            match modal.action {
                ConfirmAction::DeleteContact(id) => {
                    let result = self.session.delete(&id);
                    self.after_session(result);
                }
                ConfirmAction::DeleteSelected => {
                    let result = self.session.bulk_delete().map(|_| ());
                    self.after_session(result);
                }
            }
            return;
        }

        // Put the modal back if key wasn't handled
        self.confirm_modal = Some(modal);
    }

    fn export(&mut self) {
        let dir = &self.config.export_dir;
        match self.session.export_csv(dir, OffsetDateTime::now_utc()) {
            Ok(path) => {
                info!(path = %path.display(), "export finished");
                self.set_status(format!("Exported to {}", path.display()));
            }
            Err(err) => {
                error!("export failed: {:#}", err);
                self.set_status(format!("Export failed: {:#}", err));
            }
        }
    }

    /// Session calls already leave a notice behind; only the view needs
    /// updating here.
    fn after_session(&mut self, result: Result<(), SessionError>) {
        if let Err(err) = result {
            debug!("session call failed: {}", err);
        }
        self.sync();
    }

    /// Recompute the display list and keep the cursor on the same contact.
    fn sync(&mut self) {
        let current = self.current_id();
        self.display = self.session.display();
        match current.and_then(|id| self.display.position(&id)) {
            Some(index) => self.cursor = index,
            None => self.clamp_cursor(),
        }
    }

    fn focus_on(&mut self, id: &ContactId) {
        if let Some(index) = self.display.position(id) {
            self.cursor = index;
        }
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.display.len().saturating_sub(1));
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.display.is_empty() {
            self.cursor = 0;
            return;
        }
        let max = self.display.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, max) as usize;
    }

    fn page(&self) -> usize {
        self.list_height.saturating_sub(1).max(1)
    }

    fn current_id(&self) -> Option<ContactId> {
        self.current().map(|entry| entry.contact.id.clone())
    }

    pub fn current(&self) -> Option<&DisplayEntry> {
        self.display.get(self.cursor)
    }

    pub fn cursor(&self) -> Option<usize> {
        (!self.display.is_empty()).then_some(self.cursor)
    }

    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notice(&self) -> Option<Notice> {
        self.session.notice()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }

    pub fn ui_colors(&self) -> &UiColors {
        &self.config.ui.colors
    }

    pub fn form_field_label(field: DraftField) -> String {
        if field.required() {
            format!("{}*", field.label())
        } else {
            field.label().to_string()
        }
    }

    /// Check if the key event matches any of the bindings in the list
    fn key_matches_any(&self, event: &KeyEvent, bindings: &[String]) -> bool {
        bindings.iter().any(|b| key_matches_single(event, b))
    }

    // =========================================================================
    // Help Modal
    // =========================================================================

    /// Generate help content from current keybindings configuration
    pub fn help_entries(&self) -> Vec<HelpSection> {
        let keys = &self.config.keys;
        let entry = |action: &'static str, keys: &[String]| HelpEntry {
            action,
            keys: keys.join(", "),
        };

        vec![
            HelpSection {
                title: "Global",
                entries: vec![
                    entry("Quit", &keys.global.quit),
                    entry("Search", &keys.global.search),
                    entry("Help", &keys.global.help),
                    entry("Refresh", &keys.global.refresh),
                ],
            },
            HelpSection {
                title: "Contacts",
                entries: vec![
                    entry("Next", &keys.list.next),
                    entry("Previous", &keys.list.prev),
                    entry("Page down", &keys.list.page_down),
                    entry("Page up", &keys.list.page_up),
                    entry("Add", &keys.list.add),
                    entry("Edit", &keys.list.edit),
                    entry("Delete", &keys.list.delete),
                    entry("Favorite", &keys.list.favorite),
                    entry("Pin", &keys.list.pin),
                    entry("Note", &keys.list.note),
                    entry("Select", &keys.list.select),
                    entry("Select all/none", &keys.list.select_all),
                    entry("Delete selected", &keys.list.bulk_delete),
                    entry("Cycle sort", &keys.list.sort),
                    entry("With address only", &keys.list.address_filter),
                    entry("Clear filters", &keys.list.clear_filters),
                    entry("Export CSV", &keys.list.export),
                    entry("Dismiss notice", &keys.list.dismiss),
                ],
            },
            HelpSection {
                title: "Forms & Search",
                entries: vec![
                    entry("Cancel", &keys.form.cancel),
                    entry("Confirm", &keys.form.confirm),
                    entry("Next field", &keys.form.next_field),
                    entry("Previous field", &keys.form.prev_field),
                ],
            },
            HelpSection {
                title: "Confirm",
                entries: vec![
                    entry("Cancel", &keys.modal.cancel),
                    entry("Confirm", &keys.modal.confirm),
                ],
            },
        ]
    }

    fn help_total_lines(&self) -> usize {
        self.help_entries()
            .iter()
            .map(|section| section.entries.len() + 2)
            .sum()
    }

    pub fn show_help(&mut self) {
        let total_lines = self.help_total_lines();
        self.help_modal = Some(HelpModal::new(total_lines));
    }

    fn handle_help_modal_key(&mut self, key: KeyEvent) {
        let config = self.config;
        let modal_keys = &config.keys.modal;
        let cancel = self.key_matches_any(&key, &modal_keys.cancel);
        let next = self.key_matches_any(&key, &modal_keys.next);
        let prev = self.key_matches_any(&key, &modal_keys.prev);

        let Some(modal) = self.help_modal.as_mut() else {
            return;
        };

        if cancel {
            self.help_modal = None;
        } else if next {
            modal.scroll_down(1);
        } else if prev {
            modal.scroll_up(1);
        } else {
            let page = modal.viewport_height.saturating_sub(1).max(1);
            match key.code {
                KeyCode::PageDown => modal.scroll_down(page),
                KeyCode::PageUp => modal.scroll_up(page),
                KeyCode::Char('g') | KeyCode::Home => modal.scroll_to_top(),
                KeyCode::Char('G') | KeyCode::End => modal.scroll_to_bottom(),
                _ => {}
            }
        }
    }
}

/// Check if a key event matches a single binding string
pub fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Ctrl/Alt/Super chords are not bindable
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        other => {
            if let Some(n) = other.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                return (1..=12).contains(&n) && matches!(event.code, KeyCode::F(f) if f == n);
            }
            // Single character - case-sensitive (a != A)
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}
