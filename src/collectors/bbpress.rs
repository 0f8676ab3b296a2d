//! Companion forum software profile collector.
//!
//! The project's own forum site exposes topic and reply counts directly on
//! the profile page; no pagination arithmetic is needed here.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document, lenient_number};
use crate::model::Talent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "   bbpress";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Topic and reply counts from the companion forum profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BbPressData {
    pub topics: u64,
    pub replies: u64,
}

#[derive(Debug)]
pub struct BbPressCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl BbPressCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached counts, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> BbPressData {
        read_through(&self.cache, talent, Source::BbPress, ctx, scheduler)
    }

    /// Fetch, parse, and cache the forum profile counts.
    pub async fn refresh(&self, talent: &Talent) -> Result<BbPressData> {
        let url = format!("{}/{}/", self.sources.bbpress_base, talent.username);
        let body = html::fetch(&self.client, &url).await?;
        let data = parse_counts(&body);

        self.cache.put(talent.id, Source::BbPress.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached counts for talent {}: {data:?}", talent.id);
        Ok(data)
    }
}

/// Extract the "Topics Started: N" / "Replies Created: N" lines.
#[must_use]
pub fn parse_counts(body: &str) -> BbPressData {
    let doc = Document::parse(body);

    BbPressData {
        topics: labeled_count(doc.text("p.bbp-user-topic-count")),
        replies: labeled_count(doc.text("p.bbp-user-reply-count")),
    }
}

fn labeled_count(text: Option<String>) -> u64 {
    text.as_deref()
        .and_then(|t| t.split_once(':'))
        .map_or(0, |(_, value)| lenient_number(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labeled_counts() {
        let body = r#"<div>
            <p class="bbp-user-topic-count">Topics Started: 1,204</p>
            <p class="bbp-user-reply-count">Replies Created: 87</p>
        </div>"#;

        assert_eq!(parse_counts(body), BbPressData { topics: 1204, replies: 87 });
    }

    #[test]
    fn missing_counts_are_zero() {
        assert_eq!(parse_counts("<html></html>"), BbPressData::default());
    }
}
