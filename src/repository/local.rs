use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;
use tracing::debug;

use super::{ContactRepository, RepoResult, RepositoryError};
use crate::db::Database;
use crate::model::{format_iso, Contact, ContactDraft, ContactId};
use crate::search;

const DUPLICATE_EMAIL: &str = "Email already exists";

/// Offline backend keeping contacts in the `contacts` table.
pub struct LocalRepository {
    db: Mutex<Database>,
}

impl LocalRepository {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn conn(&self) -> RepoResult<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| RepositoryError::Storage("database lock poisoned".to_string()))
    }

    fn fetch(db: &Database, id: &ContactId) -> RepoResult<Contact> {
        let key = row_id(id)?;
        db.get_contact(key)?
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }
}

// Ids that are not integers cannot exist in this table.
fn row_id(id: &ContactId) -> RepoResult<i64> {
    id.as_str()
        .parse()
        .map_err(|_| RepositoryError::NotFound(id.clone()))
}

fn now_iso() -> String {
    format_iso(OffsetDateTime::now_utc())
}

impl ContactRepository for LocalRepository {
    fn describe(&self) -> String {
        "local database".to_string()
    }

    fn list(&self) -> RepoResult<Vec<Contact>> {
        let db = self.conn()?;
        Ok(db.list_contacts()?)
    }

    fn search(&self, term: &str) -> RepoResult<Vec<Contact>> {
        let db = self.conn()?;
        let matches: Vec<Contact> = db
            .list_contacts()?
            .into_iter()
            .filter(|c| search::matches_term(c, term))
            .collect();
        debug!(term, hits = matches.len(), "local search");
        Ok(matches)
    }

    fn get(&self, id: &ContactId) -> RepoResult<Contact> {
        let db = self.conn()?;
        Self::fetch(&db, id)
    }

    fn create(&self, draft: &ContactDraft) -> RepoResult<Contact> {
        let db = self.conn()?;
        if db.find_by_email(&draft.email)?.is_some() {
            return Err(RepositoryError::Conflict(DUPLICATE_EMAIL.to_string()));
        }
        let key = db.insert_contact(draft, &now_iso())?;
        Self::fetch(&db, &ContactId::from(key))
    }

    fn update(&self, id: &ContactId, draft: &ContactDraft) -> RepoResult<Contact> {
        let db = self.conn()?;
        let key = row_id(id)?;
        let existing = Self::fetch(&db, id)?;
        if existing.email != draft.email {
            if let Some(owner) = db.find_by_email(&draft.email)? {
                if owner != key {
                    return Err(RepositoryError::Conflict(DUPLICATE_EMAIL.to_string()));
                }
            }
        }
        if !db.update_contact(key, draft, &now_iso())? {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        Self::fetch(&db, id)
    }

    fn delete(&self, id: &ContactId) -> RepoResult<()> {
        let db = self.conn()?;
        let key = row_id(id)?;
        if !db.delete_contact(key)? {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> LocalRepository {
        LocalRepository::new(Database::open_in_memory().unwrap())
    }

    fn draft(name: &str, email: &str, phone: &str) -> ContactDraft {
        ContactDraft {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            address: None,
        }
    }

    #[test]
    fn test_create_assigns_id_and_created_at() {
        let repo = repo();
        let created = repo
            .create(&draft("Ann", "ann@example.com", "5551234567"))
            .unwrap();
        assert_eq!(created.id.as_str(), "1");
        assert!(created.created_instant().is_some());
        assert_eq!(created.updated_at, None);
        assert_eq!(repo.list().unwrap(), vec![created]);
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let repo = repo();
        repo.create(&draft("Ann", "ann@example.com", "5551234567"))
            .unwrap();
        let err = repo
            .create(&draft("Other", "ann@example.com", "5559999999"))
            .unwrap_err();
        assert_eq!(err.user_message().as_deref(), Some("Email already exists"));
    }

    #[test]
    fn test_update_sets_updated_at_and_checks_email() {
        let repo = repo();
        let ann = repo
            .create(&draft("Ann", "ann@example.com", "5551234567"))
            .unwrap();
        repo.create(&draft("Bob", "bob@example.com", "5551234567"))
            .unwrap();

        let updated = repo
            .update(&ann.id, &draft("Ann Lee", "ann@example.com", "5551234567"))
            .unwrap();
        assert_eq!(updated.name, "Ann Lee");
        assert!(updated.updated_at.is_some());

        let err = repo
            .update(&ann.id, &draft("Ann", "bob@example.com", "5551234567"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[test]
    fn test_missing_ids() {
        let repo = repo();
        let err = repo.delete(&"41".into()).unwrap_err();
        assert_eq!(
            err.user_message().as_deref(),
            Some("Contact not found with id: 41")
        );
        assert!(matches!(
            repo.get(&"abc".into()),
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.update(&"7".into(), &draft("A", "a@b.co", "5551234567")),
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_search_matches_name_email_phone() {
        let repo = repo();
        repo.create(&draft("Ann Lee", "ann@alpha.io", "555-123-4567"))
            .unwrap();
        repo.create(&draft("Bob Roe", "bob@beta.io", "555-987-6543"))
            .unwrap();

        let names = |term: &str| -> Vec<String> {
            repo.search(term)
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect()
        };
        assert_eq!(names("LEE"), vec!["Ann Lee"]);
        assert_eq!(names("beta"), vec!["Bob Roe"]);
        assert_eq!(names("987-65"), vec!["Bob Roe"]);
        assert_eq!(names(".io").len(), 2);
        assert!(names("zzz").is_empty());
    }
}
