//! BuddyPress forum profile collector.
//!
//! The BuddyPress member pages list the talent's forum topics and replies
//! with a pagination summary ("Viewing 25 topics - 1 through 25 (of 120
//! total)"); the totals come straight out of that summary rather than from
//! counting list items.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document, lenient_number};
use crate::model::Talent;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::LazyLock;

const LOG_TARGET: &str = "buddypress";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

static TOTAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"of ([\d,]+) total").expect("invalid regex"));

/// Topic and reply totals from the BuddyPress member pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyPressData {
    pub topics: u64,
    pub replies: u64,
}

#[derive(Debug)]
pub struct BuddyPressCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl BuddyPressCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached totals, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> BuddyPressData {
        read_through(&self.cache, talent, Source::BuddyPress, ctx, scheduler)
    }

    /// Fetch the topics and replies pages and cache their totals. Either
    /// page failing to load fails the refresh and leaves the cache alone.
    pub async fn refresh(&self, talent: &Talent) -> Result<BuddyPressData> {
        let base = format!("{}/{}/forums", self.sources.buddypress_base, talent.username);

        let topics_body = html::fetch(&self.client, &format!("{base}/")).await?;
        let replies_body = html::fetch(&self.client, &format!("{base}/replies/")).await?;

        let data = BuddyPressData {
            topics: parse_total(&topics_body),
            replies: parse_total(&replies_body),
        };

        self.cache.put(talent.id, Source::BuddyPress.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached totals for talent {}: {data:?}", talent.id);
        Ok(data)
    }
}

/// Pull the all-time total out of the pagination summary; pages without one
/// (no activity at all) count as zero.
#[must_use]
pub(super) fn parse_total(body: &str) -> u64 {
    Document::parse(body)
        .text("div.bbp-pagination-count")
        .and_then(|text| TOTAL.captures(&text).and_then(|caps| caps.get(1).map(|m| lenient_number(m.as_str()))))
        .unwrap_or(0)
}
