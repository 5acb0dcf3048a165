//! The contact list view-model: application state in, ordered display list out.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::meta::Metadata;
use crate::model::{Contact, ContactId};
use crate::search;
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SortOption {
    #[default]
    #[value(name = "updatedDesc")]
    UpdatedDesc,
    #[value(name = "createdDesc")]
    CreatedDesc,
    #[value(name = "nameAsc")]
    NameAsc,
    #[value(name = "nameDesc")]
    NameDesc,
}

impl SortOption {
    pub fn label(self) -> &'static str {
        match self {
            SortOption::UpdatedDesc => "Recently Updated",
            SortOption::CreatedDesc => "Recently Added",
            SortOption::NameAsc => "Name A–Z",
            SortOption::NameDesc => "Name Z–A",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOption::UpdatedDesc => "updatedDesc",
            SortOption::CreatedDesc => "createdDesc",
            SortOption::NameAsc => "nameAsc",
            SortOption::NameDesc => "nameDesc",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortOption::UpdatedDesc => SortOption::CreatedDesc,
            SortOption::CreatedDesc => SortOption::NameAsc,
            SortOption::NameAsc => SortOption::NameDesc,
            SortOption::NameDesc => SortOption::UpdatedDesc,
        }
    }

    fn compare(self, a: &Contact, b: &Contact) -> Ordering {
        match self {
            SortOption::NameAsc => search::compare_names(&a.name, &b.name),
            SortOption::NameDesc => search::compare_names(&b.name, &a.name),
            SortOption::CreatedDesc => latest_first(a.created_instant(), b.created_instant()),
            SortOption::UpdatedDesc => latest_first(a.activity_instant(), b.activity_instant()),
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// `None` orders below every instant, so it ends up last.
fn latest_first(a: Option<OffsetDateTime>, b: Option<OffsetDateTime>) -> Ordering {
    b.cmp(&a)
}

/// Everything the display list is derived from, apart from the metadata record.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub contacts: Vec<Contact>,
    pub search_term: String,
    pub search_results: Option<Vec<Contact>>,
    pub sort: SortOption,
    pub address_only: bool,
    pub selection: Selection,
}

impl ViewState {
    pub fn new(sort: SortOption) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    /// Replace the snapshot and prune the selection to the surviving ids.
    #[must_use]
    pub fn with_contacts(self, contacts: Vec<Contact>) -> Self {
        let ids = snapshot_ids(&contacts);
        Self {
            selection: self.selection.reconciled(&ids),
            contacts,
            ..self
        }
    }

    #[must_use]
    pub fn with_search(self, term: impl Into<String>, results: Option<Vec<Contact>>) -> Self {
        Self {
            search_term: term.into(),
            search_results: results,
            ..self
        }
    }

    #[must_use]
    pub fn without_search(self) -> Self {
        Self {
            search_term: String::new(),
            search_results: None,
            ..self
        }
    }

    #[must_use]
    pub fn with_sort(self, sort: SortOption) -> Self {
        Self { sort, ..self }
    }

    #[must_use]
    pub fn with_address_filter(self, address_only: bool) -> Self {
        Self {
            address_only,
            ..self
        }
    }

    /// Drop the search and the address filter. The sort option is kept.
    #[must_use]
    pub fn clear_filters(self) -> Self {
        self.without_search().with_address_filter(false)
    }

    #[must_use]
    pub fn with_selection(self, selection: Selection) -> Self {
        Self { selection, ..self }
    }

    pub fn search_active(&self) -> bool {
        !self.search_term.trim().is_empty()
    }

    pub fn snapshot_ids(&self) -> HashSet<ContactId> {
        snapshot_ids(&self.contacts)
    }

    fn base_collection(&self) -> &[Contact] {
        match (&self.search_results, self.search_active()) {
            (Some(results), true) => results,
            _ => &self.contacts,
        }
    }
}

fn snapshot_ids(contacts: &[Contact]) -> HashSet<ContactId> {
    contacts.iter().map(|c| c.id.clone()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    pub contact: Contact,
    pub favorite: bool,
    pub pinned: bool,
    pub selected: bool,
    pub note: String,
    pub last_touched: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub unique_domains: usize,
    pub last_activity: Option<OffsetDateTime>,
}

impl Summary {
    pub fn from_contacts(contacts: &[Contact]) -> Self {
        let domains: HashSet<&str> = contacts.iter().filter_map(|c| c.email_domain()).collect();
        let last_activity = contacts.iter().filter_map(|c| c.activity_instant()).max();
        Self {
            total: contacts.len(),
            unique_domains: domains.len(),
            last_activity,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub entries: Vec<DisplayEntry>,
    pub summary: Summary,
}

impl DisplayList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DisplayEntry> {
        self.entries.get(index)
    }

    pub fn ids(&self) -> Vec<ContactId> {
        self.entries.iter().map(|e| e.contact.id.clone()).collect()
    }

    pub fn position(&self, id: &ContactId) -> Option<usize> {
        self.entries.iter().position(|e| &e.contact.id == id)
    }

    /// True when the list is non-empty and every displayed entry is selected.
    pub fn all_selected(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.selected)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.entries.iter().map(|e| &e.contact)
    }
}

/// Derive the display list. Pure: the same inputs always give the same output.
pub fn recompute(state: &ViewState, meta: &Metadata) -> DisplayList {
    let mut ordered: Vec<&Contact> = state.base_collection().iter().collect();

    // sort_by is stable, so equal contacts keep their input order
    ordered.sort_by(|a, b| {
        meta.is_pinned(&b.id)
            .cmp(&meta.is_pinned(&a.id))
            .then_with(|| meta.is_favorite(&b.id).cmp(&meta.is_favorite(&a.id)))
            .then_with(|| state.sort.compare(a, b))
    });

    if state.address_only {
        ordered.retain(|c| c.has_address());
    }

    let entries = ordered
        .into_iter()
        .map(|contact| DisplayEntry {
            favorite: meta.is_favorite(&contact.id),
            pinned: meta.is_pinned(&contact.id),
            selected: state.selection.contains(&contact.id),
            note: meta.note(&contact.id).unwrap_or_default().to_string(),
            last_touched: meta.last_touched(&contact.id).map(str::to_string),
            contact: contact.clone(),
        })
        .collect();

    DisplayList {
        entries,
        summary: Summary::from_contacts(&state.contacts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    fn contact(id: &str, name: &str, created: &str, updated: Option<&str>) -> Contact {
        Contact {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "5551234567".into(),
            address: None,
            created_at: Some(created.into()),
            updated_at: updated.map(str::to_string),
        }
    }

    fn names(list: &DisplayList) -> Vec<&str> {
        list.entries.iter().map(|e| e.contact.name.as_str()).collect()
    }

    fn now() -> OffsetDateTime {
        parse_timestamp("2024-06-01T12:00:00Z").unwrap()
    }

    #[test]
    fn test_default_sort_uses_updated_then_created() {
        let state = ViewState::default().with_contacts(vec![
            contact("1", "Old", "2024-01-01", None),
            contact("2", "Edited", "2023-01-01", Some("2024-05-01")),
            contact("3", "New", "2024-03-01", None),
        ]);
        let list = recompute(&state, &Metadata::default());
        assert_eq!(names(&list), vec!["Edited", "New", "Old"]);
    }

    #[test]
    fn test_pinned_then_favorite_precedence() {
        let state = ViewState::default()
            .with_contacts(vec![
                contact("a", "Ann", "2024-01-01", None),
                contact("b", "Bob", "2024-02-01", None),
                contact("c", "Cid", "2024-03-01", None),
            ])
            .with_sort(SortOption::NameAsc);
        let meta = Metadata::default()
            .toggle_pinned(&"c".into(), now())
            .toggle_favorite(&"b".into(), now());
        let list = recompute(&state, &meta);
        assert_eq!(names(&list), vec!["Cid", "Bob", "Ann"]);
        assert!(list.entries[0].pinned);
        assert!(list.entries[1].favorite);
    }

    #[test]
    fn test_pinned_favorite_beats_pinned_only() {
        let state = ViewState::default().with_contacts(vec![
            contact("a", "Ann", "2024-05-01", None),
            contact("b", "Bob", "2024-01-01", None),
        ]);
        let meta = Metadata::default()
            .toggle_pinned(&"a".into(), now())
            .toggle_pinned(&"b".into(), now())
            .toggle_favorite(&"b".into(), now());
        let list = recompute(&state, &meta);
        assert_eq!(names(&list), vec!["Bob", "Ann"]);
    }

    #[test]
    fn test_name_sorts() {
        let state = ViewState::default()
            .with_contacts(vec![
                contact("1", "carol", "2024-01-01", None),
                contact("2", "Álvaro", "2024-01-01", None),
                contact("3", "Bea", "2024-01-01", None),
            ])
            .with_sort(SortOption::NameAsc);
        let asc = recompute(&state, &Metadata::default());
        assert_eq!(names(&asc), vec!["Álvaro", "Bea", "carol"]);

        let desc = recompute(&state.with_sort(SortOption::NameDesc), &Metadata::default());
        assert_eq!(names(&desc), vec!["carol", "Bea", "Álvaro"]);
    }

    #[test]
    fn test_created_desc_ignores_updated() {
        let state = ViewState::default()
            .with_contacts(vec![
                contact("1", "Early", "2024-01-01", Some("2024-12-01")),
                contact("2", "Late", "2024-02-01", None),
            ])
            .with_sort(SortOption::CreatedDesc);
        let list = recompute(&state, &Metadata::default());
        assert_eq!(names(&list), vec!["Late", "Early"]);
    }

    #[test]
    fn test_unparseable_timestamps_sort_last_and_stable() {
        let state = ViewState::default().with_contacts(vec![
            contact("1", "Bad1", "not a date", None),
            contact("2", "Good", "2020-01-01", None),
            contact("3", "Bad2", "", None),
        ]);
        let list = recompute(&state, &Metadata::default());
        assert_eq!(names(&list), vec!["Good", "Bad1", "Bad2"]);
    }

    #[test]
    fn test_address_filter_after_sort() {
        let mut with_address = contact("1", "Has", "2024-01-01", None);
        with_address.address = Some("1 Main St".into());
        let mut blank = contact("2", "Blank", "2024-02-01", None);
        blank.address = Some("   ".into());
        let none = contact("3", "None", "2024-03-01", None);

        let state = ViewState::default()
            .with_contacts(vec![with_address, blank, none])
            .with_address_filter(true);
        let list = recompute(&state, &Metadata::default());
        assert_eq!(names(&list), vec!["Has"]);
        // statistics still cover the whole snapshot
        assert_eq!(list.summary.total, 3);
    }

    #[test]
    fn test_address_filter_off_then_on_matches_single_toggle() {
        let mut with_address = contact("1", "Has", "2024-01-01", None);
        with_address.address = Some("1 Main St".into());
        let mut other = contact("2", "Also", "2024-02-01", None);
        other.address = Some("9 Side Rd".into());
        let none = contact("3", "None", "2024-03-01", None);
        let meta = Metadata::default().toggle_favorite(&"2".into(), now());

        let base = ViewState::default().with_contacts(vec![with_address, other, none]);
        let direct = recompute(&base.clone().with_address_filter(true), &meta);
        let toggled = recompute(
            &base
                .with_address_filter(true)
                .with_address_filter(false)
                .with_address_filter(true),
            &meta,
        );
        assert_eq!(toggled.entries, direct.entries);
        assert_eq!(names(&direct), vec!["Also", "Has"]);
    }

    fn permutations(items: &[Contact]) -> Vec<Vec<Contact>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_precedence_holds_for_every_input_order() {
        let contacts = vec![
            contact("1", "Ann", "2024-01-01", None),
            contact("2", "Bob", "2024-02-01", None),
            contact("3", "Cid", "2024-03-01", None),
            contact("4", "Dee", "2024-04-01", None),
            contact("5", "Eve", "2024-05-01", None),
        ];
        let meta = Metadata::default()
            .toggle_pinned(&"4".into(), now())
            .toggle_pinned(&"5".into(), now())
            .toggle_favorite(&"5".into(), now())
            .toggle_favorite(&"3".into(), now());

        let orders = permutations(&contacts);
        assert_eq!(orders.len(), 120);
        for order in orders {
            for sort in [
                SortOption::UpdatedDesc,
                SortOption::CreatedDesc,
                SortOption::NameAsc,
                SortOption::NameDesc,
            ] {
                let state = ViewState::default().with_contacts(order.clone()).with_sort(sort);
                let list = recompute(&state, &meta);
                let ranks: Vec<(bool, bool)> = list
                    .entries
                    .iter()
                    .map(|e| (!e.pinned, !e.favorite))
                    .collect();
                let mut sorted = ranks.clone();
                sorted.sort();
                assert_eq!(ranks, sorted, "order {:?} sort {:?}", names(&list), sort);
                assert_eq!(list.len(), 5);
            }
            let state = ViewState::default()
                .with_contacts(order)
                .with_sort(SortOption::NameAsc);
            assert_eq!(
                names(&recompute(&state, &meta)),
                vec!["Eve", "Dee", "Cid", "Ann", "Bob"]
            );
        }
    }

    #[test]
    fn test_search_results_replace_snapshot() {
        let state = ViewState::default()
            .with_contacts(vec![
                contact("1", "Ann", "2024-01-01", None),
                contact("2", "Bob", "2024-01-01", None),
            ])
            .with_search("bo", Some(vec![contact("2", "Bob", "2024-01-01", None)]));
        let list = recompute(&state, &Metadata::default());
        assert_eq!(names(&list), vec!["Bob"]);

        // results without an active term are ignored
        let blank = state.clone().with_search("  ", Some(vec![]));
        assert_eq!(recompute(&blank, &Metadata::default()).len(), 2);

        // a failed search leaves no results and falls back to the snapshot
        let failed = state.with_search("bo", None);
        assert_eq!(recompute(&failed, &Metadata::default()).len(), 2);
    }

    #[test]
    fn test_clear_filters_keeps_sort() {
        let state = ViewState::new(SortOption::NameDesc)
            .with_search("x", Some(vec![]))
            .with_address_filter(true)
            .clear_filters();
        assert_eq!(state.sort, SortOption::NameDesc);
        assert!(!state.address_only);
        assert!(!state.search_active());
        assert!(state.search_results.is_none());
    }

    #[test]
    fn test_summary() {
        let mut a = contact("1", "Ann", "2024-01-01", Some("2024-04-01"));
        a.email = "ann@b.com".into();
        let mut b = contact("2", "Bob", "2024-02-01", None);
        b.email = "bob@b.com".into();
        let mut c = contact("3", "Cid", "garbage", None);
        c.email = "cid@B.com".into();
        let mut d = contact("4", "Dee", "2024-01-01", None);
        d.email = "no-domain".into();

        let summary = Summary::from_contacts(&[a, b, c, d]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.unique_domains, 2);
        assert_eq!(summary.last_activity, parse_timestamp("2024-04-01"));

        let empty = Summary::from_contacts(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.unique_domains, 0);
        assert_eq!(empty.last_activity, None);
    }

    #[test]
    fn test_with_contacts_reconciles_selection() {
        let selection = Selection::default()
            .toggled(&"1".into())
            .toggled(&"2".into());
        let state = ViewState::default()
            .with_selection(selection)
            .with_contacts(vec![contact("2", "Bob", "2024-01-01", None)]);
        assert_eq!(state.selection.ids(), vec![ContactId::from("2")]);

        let list = recompute(&state, &Metadata::default());
        assert!(list.all_selected());
    }

    #[test]
    fn test_recompute_is_repeatable() {
        let state = ViewState::default().with_contacts(vec![
            contact("1", "Ann", "2024-01-01", None),
            contact("2", "Bob", "2024-01-01", None),
        ]);
        let meta = Metadata::default().with_note(&"2".into(), "call", now());
        let first = recompute(&state, &meta);
        let second = recompute(&state, &meta);
        assert_eq!(first.entries, second.entries);
        assert_eq!(first.entries[1].note, "call");
    }

    #[test]
    fn test_sort_option_cycle_and_labels() {
        let mut sort = SortOption::default();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(sort.label());
            sort = sort.next();
        }
        assert_eq!(sort, SortOption::UpdatedDesc);
        assert_eq!(
            seen,
            vec!["Recently Updated", "Recently Added", "Name A–Z", "Name Z–A"]
        );
        assert_eq!(
            serde_json::to_string(&SortOption::NameAsc).unwrap(),
            "\"nameAsc\""
        );
    }
}
