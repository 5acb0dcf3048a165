use std::collections::{BTreeSet, HashSet};

use crate::model::ContactId;

/// Ids the user has ticked for bulk actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeSet<ContactId>);

impl Selection {
    #[must_use]
    pub fn toggled(mut self, id: &ContactId) -> Self {
        if !self.0.remove(id) {
            self.0.insert(id.clone());
        }
        self
    }

    /// Clear when every displayed id is already selected, otherwise add them
    /// all. Ids outside `displayed` survive either way unless cleared.
    #[must_use]
    pub fn all_or_none(mut self, displayed: &[ContactId]) -> Self {
        if displayed.is_empty() {
            return self;
        }
        if displayed.iter().all(|id| self.0.contains(id)) {
            return Self::default();
        }
        self.0.extend(displayed.iter().cloned());
        self
    }

    #[must_use]
    pub fn reconciled(mut self, current: &HashSet<ContactId>) -> Self {
        self.0.retain(|id| current.contains(id));
        self
    }

    #[must_use]
    pub fn without(mut self, id: &ContactId) -> Self {
        self.0.remove(id);
        self
    }

    #[must_use]
    pub fn cleared(self) -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ContactId) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> Vec<ContactId> {
        self.0.iter().cloned().collect()
    }
}
