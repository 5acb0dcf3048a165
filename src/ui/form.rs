use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::model::{Contact, ContactDraft, ContactId, DraftField, FieldError};

/// Add/edit form: one input per draft field, errors keyed by field.
pub struct ContactForm {
    target: Option<ContactId>,
    inputs: [Input; 4],
    focus: usize,
    errors: Vec<FieldError>,
}

impl ContactForm {
    pub fn add() -> Self {
        Self {
            target: None,
            inputs: Default::default(),
            focus: 0,
            errors: Vec::new(),
        }
    }

    pub fn edit(contact: &Contact) -> Self {
        let draft = ContactDraft::from_contact(contact);
        let inputs = DraftField::ALL.map(|field| Input::new(draft.value(field).to_string()));
        Self {
            target: Some(contact.id.clone()),
            inputs,
            focus: 0,
            errors: Vec::new(),
        }
    }

    /// The contact being edited, or `None` when adding.
    pub fn target(&self) -> Option<&ContactId> {
        self.target.as_ref()
    }

    pub fn title(&self) -> &'static str {
        if self.target.is_some() {
            "EDIT CONTACT"
        } else {
            "ADD CONTACT"
        }
    }

    pub fn focused(&self) -> DraftField {
        DraftField::ALL[self.focus]
    }

    pub fn value(&self, field: DraftField) -> &str {
        self.inputs[index_of(field)].value()
    }

    pub fn visual_cursor(&self) -> usize {
        self.inputs[self.focus].visual_cursor()
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.inputs.len();
    }

    pub fn prev_field(&mut self) {
        self.focus = (self.focus + self.inputs.len() - 1) % self.inputs.len();
    }

    /// Feed a key to the focused input. Editing a field clears its error.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        let changed = self.inputs[self.focus]
            .handle_event(&Event::Key(key))
            .is_some_and(|state| state.value);
        if changed {
            let field = self.focused();
            self.errors.retain(|e| e.field != field);
        }
        changed
    }

    pub fn error(&self, field: DraftField) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message)
    }

    pub fn draft(&self) -> ContactDraft {
        let address = self.value(DraftField::Address);
        ContactDraft {
            name: self.value(DraftField::Name).to_string(),
            email: self.value(DraftField::Email).to_string(),
            phone: self.value(DraftField::Phone).to_string(),
            address: (!address.trim().is_empty()).then(|| address.to_string()),
        }
    }

    /// Show `errors` and move focus to the first offending field.
    pub fn set_errors(&mut self, errors: Vec<FieldError>) {
        if let Some(first) = errors.first() {
            self.focus = index_of(first.field);
        }
        self.errors = errors;
    }
}

fn index_of(field: DraftField) -> usize {
    DraftField::ALL
        .iter()
        .position(|f| *f == field)
        .unwrap_or(0)
}

/// Single-line note editor for one contact.
pub struct NoteEditor {
    pub target: ContactId,
    pub name: String,
    input: Input,
}

impl NoteEditor {
    pub fn new(target: ContactId, name: impl Into<String>, current: &str) -> Self {
        Self {
            target,
            name: name.into(),
            input: Input::new(current.to_string()),
        }
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn visual_cursor(&self) -> usize {
        self.input.visual_cursor()
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        self.input.handle_event(&Event::Key(key)).is_some()
    }
}
