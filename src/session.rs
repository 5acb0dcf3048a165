//! Session controller: owns the repository, the metadata store and the view
//! state, and turns user intents into repository calls plus notices.

use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::export;
use crate::meta::{MetaStore, Metadata};
use crate::model::{Contact, ContactDraft, ContactId, FieldError};
use crate::repository::{ContactRepository, RepositoryError};
use crate::search;
use crate::view::{self, DisplayList, SortOption, ViewState};

const FETCH_FAILED: &str = "Failed to load contacts. Please try again.";
const SEARCH_FAILED: &str = "Search failed. Please try again.";
const BULK_DELETE_FAILED: &str = "Failed to delete selected contacts.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{}", FETCH_FAILED)]
    FetchFailure(#[source] RepositoryError),
    #[error("{}", SEARCH_FAILED)]
    SearchFailure(#[source] RepositoryError),
    #[error("{message}")]
    MutationFailure {
        message: String,
        #[source]
        source: RepositoryError,
    },
    #[error("{}", BULK_DELETE_FAILED)]
    BulkDeleteFailure { failed: usize, total: usize },
    #[error("{}", join_field_errors(.0))]
    Validation(Vec<FieldError>),
    #[error("failed to save contact metadata: {0}")]
    Store(String),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field.label(), e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Create,
    Update,
    Delete,
}

impl Mutation {
    fn fallback(self) -> &'static str {
        match self {
            Mutation::Create => "Failed to add contact.",
            Mutation::Update => "Failed to update contact.",
            Mutation::Delete => "Failed to delete contact.",
        }
    }

    fn success(self) -> &'static str {
        match self {
            Mutation::Create => "Contact added successfully!",
            Mutation::Update => "Contact updated successfully!",
            Mutation::Delete => "Contact deleted successfully!",
        }
    }

    // Deletes always report the generic text.
    fn message(self, err: &RepositoryError) -> String {
        match self {
            Mutation::Delete => self.fallback().to_string(),
            _ => err
                .user_message()
                .unwrap_or_else(|| self.fallback().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

pub struct Session {
    repo: Box<dyn ContactRepository>,
    meta: MetaStore,
    state: ViewState,
    error: Option<String>,
    success: Option<(String, Instant)>,
    notice_ttl: Duration,
}

impl Session {
    pub fn new(
        repo: Box<dyn ContactRepository>,
        meta: MetaStore,
        sort: SortOption,
        notice_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            meta,
            state: ViewState::new(sort),
            error: None,
            success: None,
            notice_ttl,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn metadata(&self) -> &Metadata {
        self.meta.metadata()
    }

    pub fn backend(&self) -> String {
        self.repo.describe()
    }

    pub fn display(&self) -> DisplayList {
        view::recompute(&self.state, self.meta.metadata())
    }

    pub fn contact(&self, id: &ContactId) -> Option<&Contact> {
        self.state.contacts.iter().find(|c| &c.id == id)
    }

    /// Current record straight from the backend, bypassing the snapshot.
    pub fn fetch_contact(&self, id: &ContactId) -> Result<Contact, RepositoryError> {
        self.repo.get(id).inspect_err(|err| {
            error!("failed to fetch contact {}: {}", id, err);
        })
    }

    fn update_state(&mut self, change: impl FnOnce(ViewState) -> ViewState) {
        let current = mem::take(&mut self.state);
        self.state = change(current);
    }

    // ----- notices -----

    /// The error notice if any, else a success notice that has not expired.
    pub fn notice(&self) -> Option<Notice> {
        if let Some(text) = &self.error {
            return Some(Notice {
                kind: NoticeKind::Error,
                text: text.clone(),
            });
        }
        self.success
            .as_ref()
            .filter(|(_, at)| at.elapsed() < self.notice_ttl)
            .map(|(text, _)| Notice {
                kind: NoticeKind::Success,
                text: text.clone(),
            })
    }

    pub fn dismiss_notice(&mut self) {
        self.error = None;
        self.success = None;
    }

    /// Drop an expired success notice. Returns true when one was dropped.
    pub fn expire_notices(&mut self) -> bool {
        let expired = self
            .success
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= self.notice_ttl);
        if expired {
            self.success = None;
        }
        expired
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.error = Some(text.into());
    }

    fn set_success(&mut self, text: impl Into<String>) {
        self.success = Some((text.into(), Instant::now()));
    }

    fn store_failed(&mut self, err: anyhow::Error) -> SessionError {
        let err = SessionError::Store(format!("{:#}", err));
        error!("{}", err);
        self.set_error(err.to_string());
        err
    }

    // ----- repository round-trips -----

    /// Re-fetch the snapshot, prune metadata and selection to it, and re-run
    /// an active search.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        self.error = None;
        let contacts = match self.repo.list() {
            Ok(contacts) => contacts,
            Err(err) => {
                error!("failed to fetch contacts: {}", err);
                self.set_error(FETCH_FAILED);
                return Err(SessionError::FetchFailure(err));
            }
        };
        info!(count = contacts.len(), "fetched contacts");

        self.update_state(|state| state.with_contacts(contacts));
        let ids = self.state.snapshot_ids();
        if let Err(err) = self.meta.reconcile(&ids) {
            return Err(self.store_failed(err));
        }

        if self.state.search_active() {
            self.run_search()?;
        }
        Ok(())
    }

    pub fn search(&mut self, term: &str) -> Result<(), SessionError> {
        let Some(term) = search::normalize_query(term) else {
            self.update_state(ViewState::without_search);
            return Ok(());
        };
        self.update_state(|state| state.with_search(term, None));
        self.run_search()
    }

    fn run_search(&mut self) -> Result<(), SessionError> {
        let term = self.state.search_term.clone();
        match self.repo.search(&term) {
            Ok(results) => {
                info!(term = %term, hits = results.len(), "search completed");
                self.update_state(|state| state.with_search(term, Some(results)));
                Ok(())
            }
            Err(err) => {
                error!("search for {:?} failed: {}", term, err);
                self.update_state(|state| state.with_search(term, None));
                self.set_error(SEARCH_FAILED);
                Err(SessionError::SearchFailure(err))
            }
        }
    }

    pub fn create(&mut self, draft: ContactDraft) -> Result<Contact, SessionError> {
        let draft = draft.normalized();
        draft.validate().map_err(SessionError::Validation)?;
        let result = self.repo.create(&draft);
        self.finish_write(Mutation::Create, result)
    }

    pub fn update(&mut self, id: &ContactId, draft: ContactDraft) -> Result<Contact, SessionError> {
        let draft = draft.normalized();
        draft.validate().map_err(SessionError::Validation)?;
        let result = self.repo.update(id, &draft);
        self.finish_write(Mutation::Update, result)
    }

    fn finish_write(
        &mut self,
        kind: Mutation,
        result: Result<Contact, RepositoryError>,
    ) -> Result<Contact, SessionError> {
        match result {
            Ok(contact) => {
                info!(id = %contact.id, "{}", kind.success());
                if let Err(err) = self.meta.touch(&contact.id) {
                    warn!("failed to stamp last touched for {}: {:#}", contact.id, err);
                }
                self.set_success(kind.success());
                // refresh failures leave their own notice
                let _ = self.refresh();
                Ok(contact)
            }
            Err(err) => Err(self.mutation_failed(kind, err)),
        }
    }

    fn mutation_failed(&mut self, kind: Mutation, err: RepositoryError) -> SessionError {
        error!("{:?} failed: {}", kind, err);
        let message = kind.message(&err);
        self.set_error(message.clone());
        SessionError::MutationFailure {
            message,
            source: err,
        }
    }

    pub fn delete(&mut self, id: &ContactId) -> Result<(), SessionError> {
        if let Err(err) = self.repo.delete(id) {
            return Err(self.mutation_failed(Mutation::Delete, err));
        }
        info!(id = %id, "deleted contact");

        if let Err(err) = self.meta.forget(id) {
            warn!("failed to drop metadata for {}: {:#}", id, err);
        }
        let id = id.clone();
        self.update_state(|state| {
            let selection = state.selection.clone().without(&id);
            state.with_selection(selection)
        });
        self.set_success(Mutation::Delete.success());
        let _ = self.refresh();
        Ok(())
    }

    /// Delete every selected contact concurrently. Returns how many were
    /// deleted; nothing selected is a no-op.
    pub fn bulk_delete(&mut self) -> Result<usize, SessionError> {
        let ids = self.state.selection.ids();
        if ids.is_empty() {
            return Ok(0);
        }

        // one worker per id: deletes block on the backend, not the CPU
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(ids.len())
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                error!("failed to start bulk delete workers: {}", err);
                self.set_error(BULK_DELETE_FAILED);
                return Err(SessionError::BulkDeleteFailure {
                    failed: ids.len(),
                    total: ids.len(),
                });
            }
        };

        let repo = self.repo.as_ref();
        let failures: Vec<(&ContactId, RepositoryError)> = pool.install(|| {
            ids.par_iter()
                .filter_map(|id| repo.delete(id).err().map(|err| (id, err)))
                .collect()
        });

        if !failures.is_empty() {
            for (id, err) in &failures {
                error!("failed to delete {}: {}", id, err);
            }
            let failed = failures.len();
            self.set_error(BULK_DELETE_FAILED);
            return Err(SessionError::BulkDeleteFailure {
                failed,
                total: ids.len(),
            });
        }

        let count = ids.len();
        info!(count, "bulk deleted contacts");
        if let Err(err) = self.meta.forget_all(&ids) {
            warn!("failed to drop metadata after bulk delete: {:#}", err);
        }
        self.update_state(|state| {
            let selection = state.selection.clone().cleared();
            state.with_selection(selection)
        });
        self.set_success(format!("{} contacts deleted.", count));
        let _ = self.refresh();
        Ok(count)
    }

    // ----- metadata intents -----

    pub fn toggle_favorite(&mut self, id: &ContactId) -> Result<(), SessionError> {
        self.meta
            .toggle_favorite(id)
            .map_err(|err| self.store_failed(err))
    }

    pub fn toggle_pinned(&mut self, id: &ContactId) -> Result<(), SessionError> {
        self.meta
            .toggle_pinned(id)
            .map_err(|err| self.store_failed(err))
    }

    pub fn set_note(&mut self, id: &ContactId, text: &str) -> Result<(), SessionError> {
        self.meta
            .set_note(id, text)
            .map_err(|err| self.store_failed(err))
    }

    // ----- view intents -----

    pub fn set_sort(&mut self, sort: SortOption) {
        self.update_state(|state| state.with_sort(sort));
    }

    pub fn cycle_sort(&mut self) {
        let next = self.state.sort.next();
        self.set_sort(next);
    }

    pub fn set_address_filter(&mut self, enabled: bool) {
        self.update_state(|state| state.with_address_filter(enabled));
    }

    pub fn toggle_address_filter(&mut self) {
        let enabled = !self.state.address_only;
        self.set_address_filter(enabled);
    }

    pub fn clear_filters(&mut self) {
        self.update_state(ViewState::clear_filters);
    }

    pub fn toggle_selection(&mut self, id: &ContactId) {
        self.update_state(|state| {
            let selection = state.selection.clone().toggled(id);
            state.with_selection(selection)
        });
    }

    pub fn select_all_or_none(&mut self) {
        let displayed = self.display().ids();
        self.update_state(|state| {
            let selection = state.selection.clone().all_or_none(&displayed);
            state.with_selection(selection)
        });
    }

    /// Write the current display list as CSV into `dir`.
    pub fn export_csv(&self, dir: &Path, now: OffsetDateTime) -> anyhow::Result<PathBuf> {
        let list = self.display();
        let path = export::write_csv(dir, list.contacts(), now)?;
        info!(path = %path.display(), rows = list.len(), "exported contacts");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::db::Database;
    use crate::repository::{LocalRepository, RepoResult};

    /// Local repository with switchable failures.
    struct Flaky {
        inner: LocalRepository,
        fail_list: AtomicBool,
        fail_search: AtomicBool,
        fail_deletes: Mutex<HashSet<ContactId>>,
        delete_delay: Mutex<Duration>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl Flaky {
        fn new() -> Self {
            Self {
                inner: LocalRepository::new(Database::open_in_memory().unwrap()),
                fail_list: AtomicBool::new(false),
                fail_search: AtomicBool::new(false),
                fail_deletes: Mutex::new(HashSet::new()),
                delete_delay: Mutex::new(Duration::ZERO),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl ContactRepository for std::sync::Arc<Flaky> {
        fn describe(&self) -> String {
            "flaky".to_string()
        }

        fn list(&self) -> RepoResult<Vec<Contact>> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(RepositoryError::Transport("connection refused".into()));
            }
            self.inner.list()
        }

        fn search(&self, term: &str) -> RepoResult<Vec<Contact>> {
            if self.fail_search.load(Ordering::SeqCst) {
                return Err(RepositoryError::Api {
                    status: 500,
                    message: None,
                });
            }
            self.inner.search(term)
        }

        fn get(&self, id: &ContactId) -> RepoResult<Contact> {
            self.inner.get(id)
        }

        fn create(&self, draft: &ContactDraft) -> RepoResult<Contact> {
            self.inner.create(draft)
        }

        fn update(&self, id: &ContactId, draft: &ContactDraft) -> RepoResult<Contact> {
            self.inner.update(id, draft)
        }

        fn delete(&self, id: &ContactId) -> RepoResult<()> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
            let delay = *self.delete_delay.lock().unwrap();
            std::thread::sleep(delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_deletes.lock().unwrap().contains(id) {
                return Err(RepositoryError::Api {
                    status: 500,
                    message: Some("boom".into()),
                });
            }
            self.inner.delete(id)
        }
    }

    fn draft(name: &str) -> ContactDraft {
        ContactDraft {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "555-123-4567".into(),
            address: None,
        }
    }

    fn session() -> (Session, std::sync::Arc<Flaky>) {
        let repo = std::sync::Arc::new(Flaky::new());
        let meta = MetaStore::load(Database::open_in_memory().unwrap());
        let session = Session::new(
            Box::new(repo.clone()),
            meta,
            SortOption::NameAsc,
            Duration::from_secs(3),
        );
        (session, repo)
    }

    fn names(session: &Session) -> Vec<String> {
        session
            .display()
            .contacts()
            .map(|c| c.name.clone())
            .collect()
    }

    fn notice_text(session: &Session) -> Option<String> {
        session.notice().map(|n| n.text)
    }

    #[test]
    fn test_create_refreshes_and_stamps() {
        let (mut session, _) = session();
        let created = session.create(draft("Ann")).unwrap();
        assert_eq!(names(&session), vec!["Ann"]);
        assert!(session.metadata().last_touched(&created.id).is_some());
        assert_eq!(
            session.notice(),
            Some(Notice {
                kind: NoticeKind::Success,
                text: "Contact added successfully!".into()
            })
        );
    }

    #[test]
    fn test_create_validation_never_reaches_repository() {
        let (mut session, repo) = session();
        let err = session
            .create(ContactDraft {
                name: "Ann".into(),
                email: "bad".into(),
                phone: "123".into(),
                address: None,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(ref errors) if errors.len() == 2));
        assert!(repo.inner.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_conflict_uses_backend_message() {
        let (mut session, _) = session();
        session.create(draft("Ann")).unwrap();
        let err = session.create(draft("Ann")).unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
        assert_eq!(notice_text(&session).as_deref(), Some("Email already exists"));
    }

    #[test]
    fn test_update_failure_falls_back_to_generic_text() {
        let (mut session, repo) = session();
        let ann = session.create(draft("Ann")).unwrap();
        repo.fail_list.store(true, Ordering::SeqCst);
        // update succeeds but the follow-up refresh fails
        session.update(&ann.id, draft("Ann")).unwrap();
        assert_eq!(notice_text(&session).as_deref(), Some(FETCH_FAILED));
        repo.fail_list.store(false, Ordering::SeqCst);

        let err = session.update(&"not-a-number".into(), draft("Zed")).unwrap_err();
        assert_eq!(err.to_string(), "Contact not found with id: not-a-number");
    }

    #[test]
    fn test_fetch_failure_keeps_previous_snapshot() {
        let (mut session, repo) = session();
        session.create(draft("Ann")).unwrap();
        repo.fail_list.store(true, Ordering::SeqCst);
        let err = session.refresh().unwrap_err();
        assert!(matches!(err, SessionError::FetchFailure(_)));
        assert_eq!(names(&session), vec!["Ann"]);
        assert_eq!(
            session.notice().map(|n| n.kind),
            Some(NoticeKind::Error)
        );
    }

    #[test]
    fn test_search_and_failure_fallback() {
        let (mut session, repo) = session();
        session.create(draft("Ann")).unwrap();
        session.create(draft("Bob")).unwrap();

        session.search("bo").unwrap();
        assert_eq!(names(&session), vec!["Bob"]);

        session.search("   ").unwrap();
        assert_eq!(names(&session), vec!["Ann", "Bob"]);

        repo.fail_search.store(true, Ordering::SeqCst);
        assert!(matches!(
            session.search("bo"),
            Err(SessionError::SearchFailure(_))
        ));
        assert_eq!(names(&session), vec!["Ann", "Bob"]);
        assert_eq!(notice_text(&session).as_deref(), Some(SEARCH_FAILED));
    }

    #[test]
    fn test_refresh_reruns_active_search() {
        let (mut session, _) = session();
        session.create(draft("Bob")).unwrap();
        session.search("bo").unwrap();
        session.create(draft("Bonnie")).unwrap();
        assert_eq!(names(&session), vec!["Bob", "Bonnie"]);
    }

    #[test]
    fn test_delete_forgets_metadata_and_selection() {
        let (mut session, _) = session();
        let ann = session.create(draft("Ann")).unwrap();
        session.create(draft("Bob")).unwrap();
        session.toggle_favorite(&ann.id).unwrap();
        session.set_note(&ann.id, "call back").unwrap();
        session.toggle_selection(&ann.id);

        session.delete(&ann.id).unwrap();
        assert_eq!(names(&session), vec!["Bob"]);
        assert!(session.metadata().entry(&ann.id).is_none());
        assert!(session.state().selection.is_empty());
        assert_eq!(
            notice_text(&session).as_deref(),
            Some("Contact deleted successfully!")
        );
    }

    #[test]
    fn test_delete_failure_message() {
        let (mut session, _) = session();
        let err = session.delete(&"99".into()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete contact.");
    }

    #[test]
    fn test_bulk_delete_success() {
        let (mut session, _) = session();
        for name in ["Ann", "Bob", "Cid"] {
            session.create(draft(name)).unwrap();
        }
        session.select_all_or_none();
        assert_eq!(session.state().selection.len(), 3);

        assert_eq!(session.bulk_delete().unwrap(), 3);
        assert!(names(&session).is_empty());
        assert!(session.state().selection.is_empty());
        assert_eq!(notice_text(&session).as_deref(), Some("3 contacts deleted."));
    }

    #[test]
    fn test_fetch_contact_reads_backend() {
        let (mut session, _) = session();
        let ann = session.create(draft("Ann")).unwrap();
        assert_eq!(session.fetch_contact(&ann.id).unwrap(), ann);
        assert!(matches!(
            session.fetch_contact(&"99".into()),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_bulk_delete_runs_every_delete_at_once() {
        let (mut session, repo) = session();
        for name in ["Ann", "Bob", "Cid", "Dee"] {
            session.create(draft(name)).unwrap();
        }
        session.select_all_or_none();
        *repo.delete_delay.lock().unwrap() = Duration::from_millis(100);

        assert_eq!(session.bulk_delete().unwrap(), 4);
        assert_eq!(repo.peak_in_flight.load(Ordering::SeqCst), 4);
        assert!(names(&session).is_empty());
    }

    #[test]
    fn test_bulk_delete_partial_failure() {
        let (mut session, repo) = session();
        let ann = session.create(draft("Ann")).unwrap();
        let bob = session.create(draft("Bob")).unwrap();
        let cid = session.create(draft("Cid")).unwrap();
        for id in [&ann.id, &bob.id, &cid.id] {
            session.toggle_selection(id);
        }
        repo.fail_deletes.lock().unwrap().insert(bob.id.clone());

        let err = session.bulk_delete().unwrap_err();
        assert!(matches!(
            err,
            SessionError::BulkDeleteFailure {
                failed: 1,
                total: 3
            }
        ));
        assert_eq!(notice_text(&session).as_deref(), Some(BULK_DELETE_FAILED));
        // selection and snapshot untouched until the next refresh
        assert_eq!(session.state().selection.len(), 3);
        assert_eq!(names(&session).len(), 3);

        session.refresh().unwrap();
        assert_eq!(names(&session), vec!["Bob"]);
        assert_eq!(session.state().selection.ids(), vec![bob.id]);
    }

    #[test]
    fn test_bulk_delete_with_nothing_selected() {
        let (mut session, _) = session();
        assert_eq!(session.bulk_delete().unwrap(), 0);
        assert!(session.notice().is_none());
    }

    #[test]
    fn test_refresh_reconciles_metadata() {
        let (mut session, repo) = session();
        let ann = session.create(draft("Ann")).unwrap();
        session.toggle_pinned(&ann.id).unwrap();
        // removed behind the session's back
        repo.inner.delete(&ann.id).unwrap();
        session.refresh().unwrap();
        assert!(session.metadata().entry(&ann.id).is_none());
    }

    #[test]
    fn test_success_notice_expires() {
        let repo = std::sync::Arc::new(Flaky::new());
        let meta = MetaStore::load(Database::open_in_memory().unwrap());
        let mut session = Session::new(Box::new(repo), meta, SortOption::default(), Duration::ZERO);
        session.create(draft("Ann")).unwrap();
        assert!(session.notice().is_none());
        assert!(session.expire_notices());
    }

    #[test]
    fn test_error_notice_persists_until_dismissed() {
        let (mut session, repo) = session();
        repo.fail_list.store(true, Ordering::SeqCst);
        let _ = session.refresh();
        assert!(!session.expire_notices());
        assert!(session.notice().is_some());
        session.dismiss_notice();
        assert!(session.notice().is_none());
    }

    #[test]
    fn test_view_intents() {
        let (mut session, _) = session();
        let ann = session.create(draft("Ann")).unwrap();
        session.create(draft("Bob")).unwrap();

        session.cycle_sort();
        assert_eq!(session.state().sort, SortOption::NameDesc);
        assert_eq!(names(&session), vec!["Bob", "Ann"]);

        session.toggle_pinned(&ann.id).unwrap();
        assert_eq!(names(&session), vec!["Ann", "Bob"]);

        session.toggle_address_filter();
        assert!(names(&session).is_empty());
        session.clear_filters();
        assert_eq!(names(&session).len(), 2);
        assert_eq!(session.state().sort, SortOption::NameDesc);
    }

    #[test]
    fn test_export_uses_display_order() {
        let (mut session, _) = session();
        session.create(draft("Bob")).unwrap();
        let ann = session.create(draft("Ann")).unwrap();
        session.toggle_favorite(&ann.id).unwrap();
        session.set_sort(SortOption::NameDesc);

        let dir = tempfile::tempdir().unwrap();
        let now = crate::model::parse_timestamp("2024-02-03").unwrap();
        let path = session.export_csv(dir.path(), now).unwrap();
        assert!(path.ends_with("contacts-2024-02-03.csv"));

        let written = std::fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = written.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("\"Ann\""));
        assert!(rows[2].starts_with("\"Bob\""));
    }
}
