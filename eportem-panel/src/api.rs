use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::model::{ApplicationState, EntryId, EntryRef, FlagUpdate, NewEntry};

/// How the server answered a mutating request. The panel refreshes either
/// way; the distinction is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    Rejected(u16),
}

/// The five calls the panel makes. `Err` means the request never got an
/// answer (transport failure).
pub trait StateApi: Send + Sync + 'static {
    fn fetch_state(&self) -> impl Future<Output = Result<ApplicationState>> + Send;

    fn set_flag(&self, update: FlagUpdate) -> impl Future<Output = Result<Ack>> + Send;

    fn add_entry(&self, entry: NewEntry) -> impl Future<Output = Result<Ack>> + Send;

    fn toggle_entry(&self, id: EntryId) -> impl Future<Output = Result<Ack>> + Send;

    fn remove_entry(&self, id: EntryId) -> impl Future<Output = Result<Ack>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }

        Ok(Self {
            client: builder.build().context("Failed to build HTTP client")?,
            base_url: config.server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<Ack> {
        let url = self.url(path);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if status.is_success() {
            info!("POST {path} accepted");
            Ok(Ack::Accepted)
        } else {
            warn!("POST {path} rejected with status: {status}");
            Ok(Ack::Rejected(status.as_u16()))
        }
    }
}

impl StateApi for HttpApi {
    async fn fetch_state(&self) -> Result<ApplicationState> {
        let url = self.url("/api/state");
        debug!("GET {url}");

        let state = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?
            .error_for_status()?
            .json::<ApplicationState>()
            .await
            .context("Malformed state from server")?;

        debug!("Fetched state with {} schedule entries", state.schedule.len());
        Ok(state)
    }

    async fn set_flag(&self, update: FlagUpdate) -> Result<Ack> {
        self.post("/api/toggle", &update.to_request()).await
    }

    async fn add_entry(&self, entry: NewEntry) -> Result<Ack> {
        self.post("/api/schedule/add", &entry).await
    }

    async fn toggle_entry(&self, id: EntryId) -> Result<Ack> {
        self.post("/api/schedule/toggle", &EntryRef { id }).await
    }

    async fn remove_entry(&self, id: EntryId) -> Result<Ack> {
        self.post("/api/schedule/remove", &EntryRef { id }).await
    }
}
