//! Theme registry collector.
//!
//! Identical in shape to the plugin registry query; only the action name
//! and the response key differ, so the parsing lives in [`super::plugins`].

use super::plugins::{PackageInfo, author_query_url, parse_packages};
use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html;
use crate::model::Talent;
use std::sync::Arc;

const LOG_TARGET: &str = "    themes";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug)]
pub struct ThemesCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl ThemesCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached theme list, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> Vec<PackageInfo> {
        read_through(&self.cache, talent, Source::Themes, ctx, scheduler)
    }

    /// Query the registry for the talent's themes and cache the result.
    pub async fn refresh(&self, talent: &Talent) -> Result<Vec<PackageInfo>> {
        let url = author_query_url(&self.sources.themes_api, "query_themes", &talent.username)?;
        let body = html::fetch(&self.client, url.as_str()).await?;
        let packages = parse_packages(&body)?;

        self.cache.put(talent.id, Source::Themes.key(), &packages, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached {} themes for talent {}", packages.len(), talent.id);
        Ok(packages)
    }
}
