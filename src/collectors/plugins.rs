//! Plugin registry collector.
//!
//! Queries the plugin registry API for everything authored by the talent's
//! username and normalizes each entry down to the handful of fields the
//! score and search document need. [`PackageInfo`] is shared with the theme
//! collector; both registries describe their packages the same way.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html;
use crate::model::Talent;
use chrono::NaiveDate;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "   plugins";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// One registry package (plugin or theme), normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub slug: String,

    /// Aggregate user rating on the registry's 0-100 scale.
    pub rating: f64,

    /// All-time download count.
    pub downloads: u64,

    /// Date of the last released update, when the registry reported one in
    /// a recognizable form.
    pub last_updated: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default, alias = "themes")]
    plugins: Vec<RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    #[serde(default)]
    name: String,

    #[serde(default)]
    slug: String,

    #[serde(default)]
    rating: f64,

    #[serde(default)]
    downloaded: u64,

    #[serde(default)]
    last_updated: String,
}

#[derive(Debug)]
pub struct PluginsCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl PluginsCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached plugin list, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> Vec<PackageInfo> {
        read_through(&self.cache, talent, Source::Plugins, ctx, scheduler)
    }

    /// Query the registry for the talent's plugins and cache the result.
    pub async fn refresh(&self, talent: &Talent) -> Result<Vec<PackageInfo>> {
        let url = author_query_url(&self.sources.plugins_api, "query_plugins", &talent.username)?;
        let body = html::fetch(&self.client, url.as_str()).await?;
        let packages = parse_packages(&body)?;

        self.cache.put(talent.id, Source::Plugins.key(), &packages, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached {} plugins for talent {}", packages.len(), talent.id);
        Ok(packages)
    }
}

/// Compose a registry author query. Both registries share the query shape;
/// only the action name and response key differ.
pub(super) fn author_query_url(api_base: &str, action: &str, author: &str) -> Result<Url> {
    Url::parse_with_params(
        &format!("{api_base}/"),
        &[
            ("action", action),
            ("request[author]", author),
            ("request[per_page]", "100"),
            ("request[fields][downloaded]", "1"),
            ("request[fields][last_updated]", "1"),
        ],
    )
    .into_app_err_with(|| format!("invalid registry URL '{api_base}'"))
}

/// Decode a registry query response into normalized packages. Accepts both
/// registries' response shapes.
pub(super) fn parse_packages(body: &str) -> Result<Vec<PackageInfo>> {
    let response: QueryResponse = serde_json::from_str(body).into_app_err("unable to parse registry response")?;

    Ok(response
        .plugins
        .into_iter()
        .map(|raw| PackageInfo {
            name: raw.name,
            slug: raw.slug,
            rating: raw.rating,
            downloads: raw.downloaded,
            last_updated: parse_update_date(&raw.last_updated),
        })
        .collect())
}

/// The registries report update times as `YYYY-MM-DD` with an optional
/// trailing time; only the date part is meaningful here.
fn parse_update_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}
