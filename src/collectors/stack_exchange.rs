//! Q&A network collector.
//!
//! Searches the Q&A site's user API by display name and keeps the
//! top-reputation match. Display names are not unique over there, so the
//! highest-reputation account is the pragmatic interpretation; a talent
//! with no account at all yields the zero sentinel, not an error.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html;
use crate::model::{Talent, slugify};
use chrono::{DateTime, NaiveDate};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "      wpse";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Badge tallies for the matched account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeCounts {
    pub gold: u64,
    pub silver: u64,
    pub bronze: u64,
}

/// The matched Q&A account, normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackExchangeData {
    pub user_id: u64,
    pub reputation: u64,
    pub badges: BadgeCounts,
    pub member_since: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    user_id: u64,

    #[serde(default)]
    reputation: u64,

    #[serde(default)]
    badge_counts: BadgeCounts,

    /// Unix timestamp of account creation.
    #[serde(default)]
    creation_date: i64,
}

#[derive(Debug)]
pub struct StackExchangeCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl StackExchangeCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached account data, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> StackExchangeData {
        read_through(&self.cache, talent, Source::StackExchange, ctx, scheduler)
    }

    /// Search the user API by display name and cache the best match.
    pub async fn refresh(&self, talent: &Talent) -> Result<StackExchangeData> {
        let url = Url::parse_with_params(
            &self.sources.stack_exchange_api,
            &[
                ("page", "1"),
                ("pagesize", "1"),
                ("order", "desc"),
                ("sort", "reputation"),
                ("inname", &slugify(&talent.name)),
                ("site", "wordpress"),
            ],
        )
        .into_app_err_with(|| format!("invalid user API URL '{}'", self.sources.stack_exchange_api))?;

        let body = html::fetch(&self.client, url.as_str()).await?;
        let data = parse_user(&body)?;

        self.cache.put(talent.id, Source::StackExchange.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached reputation {} for talent {}", data.reputation, talent.id);
        Ok(data)
    }
}

/// Decode the user search response down to the top match.
pub(super) fn parse_user(body: &str) -> Result<StackExchangeData> {
    let response: SearchResponse = serde_json::from_str(body).into_app_err("unable to parse user API response")?;

    Ok(response.items.into_iter().next().map_or_else(StackExchangeData::default, |raw| {
        StackExchangeData {
            user_id: raw.user_id,
            reputation: raw.reputation,
            badges: raw.badge_counts,
            member_since: DateTime::from_timestamp(raw.creation_date, 0)
                .filter(|_| raw.creation_date > 0)
                .map(|dt| dt.date_naive()),
        }
    }))
}
