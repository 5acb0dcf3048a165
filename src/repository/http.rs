use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

use super::{ContactRepository, RepoResult, RepositoryError};
use crate::model::{Contact, ContactDraft, ContactId};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/contacts";

/// Client for the REST contacts collection (`GET /`, `GET /{id}`,
/// `POST /`, `PUT /{id}`, `DELETE /{id}`, `GET /search?q=`).
pub struct HttpRepository {
    http: Client,
    collection: Url,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl HttpRepository {
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let collection = Url::parse(trimmed).context("invalid server URL")?;
        if collection.cannot_be_a_base() {
            return Err(anyhow!("invalid server URL: {}", base_url));
        }
        // Requests wait as long as the server takes.
        let http = Client::builder()
            .timeout(None)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, collection })
    }

    fn url(&self, segment: &str) -> Url {
        let mut url = self.collection.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    fn send(&self, req: RequestBuilder) -> RepoResult<reqwest::blocking::Response> {
        let response = req
            .send()
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.is_empty())
            .or(parsed.error.filter(|e| !e.is_empty()));
        error!(status = status.as_u16(), body = %body, "contacts API returned an error");
        Err(RepositoryError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> RepoResult<T> {
        let response = self.send(req)?;
        let body = response
            .text()
            .map_err(|err| RepositoryError::Transport(err.to_string()))?;
        serde_json::from_str(&body).map_err(|err| RepositoryError::Decode(err.to_string()))
    }
}

impl ContactRepository for HttpRepository {
    fn describe(&self) -> String {
        self.collection.to_string()
    }

    fn list(&self) -> RepoResult<Vec<Contact>> {
        debug!(url = %self.collection, "GET contacts");
        self.send_json(self.http.get(self.collection.clone()))
    }

    fn search(&self, term: &str) -> RepoResult<Vec<Contact>> {
        let url = self.url("search");
        debug!(url = %url, term, "GET contact search");
        self.send_json(self.http.get(url).query(&[("q", term)]))
    }

    fn get(&self, id: &ContactId) -> RepoResult<Contact> {
        let url = self.url(id.as_str());
        debug!(url = %url, "GET contact");
        self.send_json(self.http.get(url))
    }

    fn create(&self, draft: &ContactDraft) -> RepoResult<Contact> {
        debug!(url = %self.collection, "POST contact");
        self.send_json(self.http.post(self.collection.clone()).json(draft))
    }

    fn update(&self, id: &ContactId, draft: &ContactDraft) -> RepoResult<Contact> {
        let url = self.url(id.as_str());
        debug!(url = %url, "PUT contact");
        self.send_json(self.http.put(url).json(draft))
    }

    fn delete(&self, id: &ContactId) -> RepoResult<()> {
        let url = self.url(id.as_str());
        debug!(url = %url, "DELETE contact");
        self.send(self.http.delete(url)).map(|_| ())
    }
}
