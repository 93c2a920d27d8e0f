//! Roster source boundary.
//!
//! [`RosterSource`] is the raw collaborator: it may fail, hang or return
//! duplicates. [`RetryingSource`] wraps it with a per-attempt timeout and
//! exponential backoff, and turns exhaustion into an empty roster so an
//! outage is never read as every member leaving at once.

use std::time::Duration;

use async_trait::async_trait;
use clanwatch_core::config::SourceConfig;
use clanwatch_core::diff::tidy_roster;
use clanwatch_core::types::RosterEntry;
use serde::Deserialize;

use crate::error::EngineError;

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_roster(&self, clan_id: &str) -> Result<Vec<RosterEntry>, EngineError>;
}

// ---------------------------------------------------------------------------
// HttpRosterSource
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MembersResponse {
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    name: String,
    points: u64,
}

/// Reads `GET {base_url}/clans/{clan_id}/members`.
pub struct HttpRosterSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRosterSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn members_url(&self, clan_id: &str) -> String {
        format!(
            "{}/clans/{}/members",
            self.base_url.trim_end_matches('/'),
            clan_id
        )
    }
}

#[async_trait]
impl RosterSource for HttpRosterSource {
    async fn fetch_roster(&self, clan_id: &str) -> Result<Vec<RosterEntry>, EngineError> {
        let url = self.members_url(clan_id);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body: MembersResponse = resp.json().await?;
        Ok(body
            .members
            .into_iter()
            .map(|m| RosterEntry::new(m.name, m.points))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RetryingSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after.
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SourceConfig::default())
    }
}

impl From<&SourceConfig> for RetryPolicy {
    fn from(cfg: &SourceConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.backoff_base_ms),
            attempt_timeout: Duration::from_secs(cfg.fetch_timeout_secs),
        }
    }
}

impl RetryPolicy {
    fn delay_before_retry(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }
}

pub struct RetryingSource {
    inner: Box<dyn RosterSource>,
    policy: RetryPolicy,
}

impl RetryingSource {
    pub fn new(inner: Box<dyn RosterSource>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Fetch, tidy (descending by points, first duplicate wins) and return
    /// the roster. Returns an empty list once every retry has failed.
    pub async fn fetch(&self, clan_id: &str) -> Vec<RosterEntry> {
        match self.try_fetch(clan_id).await {
            Ok(entries) => tidy_roster(entries),
            Err(e) => {
                tracing::warn!(
                    clan_id,
                    retries = self.policy.max_retries,
                    error = %e,
                    "roster data unavailable this cycle"
                );
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, clan_id: &str) -> Result<Vec<RosterEntry>, EngineError> {
        let mut retry = 0;
        loop {
            let attempt =
                tokio::time::timeout(self.policy.attempt_timeout, self.inner.fetch_roster(clan_id))
                    .await
                    .unwrap_or_else(|_| {
                        Err(EngineError::Timeout(self.policy.attempt_timeout.as_secs()))
                    });
            match attempt {
                Ok(entries) => return Ok(entries),
                Err(e) if retry < self.policy.max_retries => {
                    let delay = self.policy.delay_before_retry(retry);
                    tracing::debug!(clan_id, attempt = retry + 1, ?delay, error = %e, "roster fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
