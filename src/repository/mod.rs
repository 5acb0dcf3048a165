//! The contact backend seam.
//!
//! - `ContactRepository` is what the session talks to
//! - `HttpRepository` speaks to the REST contacts service
//! - `LocalRepository` keeps contacts in the local SQLite database

pub mod http;
pub mod local;

use anyhow::Result;
use thiserror::Error;

use crate::config::{Backend, Config};
use crate::db::Database;
use crate::model::{Contact, ContactDraft, ContactId};

pub use http::HttpRepository;
pub use local::LocalRepository;

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Non-success response. `message` comes from the body's `message` or
    /// `error` field.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        message: Option<String>,
    },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("Contact not found with id: {0}")]
    NotFound(ContactId),
    #[error("{0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// Text meant for the user, when the backend supplied one.
    pub fn user_message(&self) -> Option<String> {
        match self {
            RepositoryError::Api { message, .. } => {
                message.clone().filter(|m| !m.trim().is_empty())
            }
            RepositoryError::NotFound(_) | RepositoryError::Conflict(_) => Some(self.to_string()),
            RepositoryError::Transport(_)
            | RepositoryError::Decode(_)
            | RepositoryError::Storage(_) => None,
        }
    }
}

impl From<anyhow::Error> for RepositoryError {
    fn from(err: anyhow::Error) -> Self {
        RepositoryError::Storage(format!("{:#}", err))
    }
}

/// Canonical contact storage. Implementations must tolerate concurrent
/// deletes from several threads.
pub trait ContactRepository: Send + Sync {
    /// Short description for status lines and logs.
    fn describe(&self) -> String;

    fn list(&self) -> RepoResult<Vec<Contact>>;

    fn search(&self, term: &str) -> RepoResult<Vec<Contact>>;

    fn get(&self, id: &ContactId) -> RepoResult<Contact>;

    fn create(&self, draft: &ContactDraft) -> RepoResult<Contact>;

    fn update(&self, id: &ContactId, draft: &ContactDraft) -> RepoResult<Contact>;

    fn delete(&self, id: &ContactId) -> RepoResult<()>;
}

/// Build the repository selected by the configuration.
pub fn open(config: &Config) -> Result<Box<dyn ContactRepository>> {
    match config.backend {
        Backend::Remote => Ok(Box::new(HttpRepository::new(&config.api_url)?)),
        Backend::Local => {
            let db = Database::open(&config.db_path())?;
            Ok(Box::new(LocalRepository::new(db)))
        }
    }
}
