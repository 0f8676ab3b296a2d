//! Documentation wiki collector.
//!
//! A single API call returning the talent's wiki edit count. Users who
//! never registered on the wiki come back as a "missing" entry with no
//! count; that is a zero, not an error.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html;
use crate::model::Talent;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "     codex";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Wiki contribution data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodexData {
    pub edit_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: QuerySection,
}

#[derive(Debug, Default, Deserialize)]
struct QuerySection {
    #[serde(default)]
    users: Vec<WikiUser>,
}

#[derive(Debug, Deserialize)]
struct WikiUser {
    #[serde(default)]
    editcount: u64,
}

#[derive(Debug)]
pub struct CodexCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl CodexCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached edit count, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> CodexData {
        read_through(&self.cache, talent, Source::Codex, ctx, scheduler)
    }

    /// Query the wiki API and cache the edit count.
    pub async fn refresh(&self, talent: &Talent) -> Result<CodexData> {
        let url = Url::parse_with_params(
            &self.sources.codex_api,
            &[
                ("action", "query"),
                ("list", "users"),
                ("ususers", talent.username.as_str()),
                ("usprop", "editcount"),
                ("format", "json"),
            ],
        )
        .into_app_err_with(|| format!("invalid wiki API URL '{}'", self.sources.codex_api))?;

        let body = html::fetch(&self.client, url.as_str()).await?;
        let data = parse_edit_count(&body)?;

        self.cache.put(talent.id, Source::Codex.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached {} wiki edits for talent {}", data.edit_count, talent.id);
        Ok(data)
    }
}

/// Decode the wiki API response down to an edit count.
pub(super) fn parse_edit_count(body: &str) -> Result<CodexData> {
    let response: ApiResponse = serde_json::from_str(body).into_app_err("unable to parse wiki API response")?;

    Ok(CodexData {
        edit_count: response.query.users.first().map_or(0, |user| user.editcount),
    })
}
