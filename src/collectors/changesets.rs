//! Code-repository changeset collector.
//!
//! Searches the project's source browser for changesets that credit the
//! talent (via commit props) and records the total hit count plus the most
//! recent page of results. The total drives the score; the entries feed the
//! search document.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document, child_attr, child_text, element_text, lenient_number};
use crate::model::Talent;
use ohno::IntoAppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::LazyLock;
use url::Url;

const LOG_TARGET: &str = "changesets";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

static TICKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").expect("invalid regex"));

/// One changeset crediting the talent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    pub id: u64,
    pub description: String,

    /// The ticket the changeset closes, when its message references one.
    pub ticket: Option<u64>,
}

/// Changeset search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangesetData {
    /// Total hits reported by the search, across all pages.
    pub count: u64,

    /// The first page of hits, newest first.
    pub changesets: Vec<Changeset>,
}

#[derive(Debug)]
pub struct ChangesetsCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl ChangesetsCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached search results, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> ChangesetData {
        read_through(&self.cache, talent, Source::Changesets, ctx, scheduler)
    }

    /// Run the changeset search and cache the results.
    pub async fn refresh(&self, talent: &Talent) -> Result<ChangesetData> {
        // Commit messages credit contributors as "props <username>".
        let query = format!("props {}", talent.username);
        let url = Url::parse_with_params(
            &self.sources.trac_search,
            &[("q", query.as_str()), ("noquickjump", "1"), ("changeset", "on")],
        )
        .into_app_err_with(|| format!("invalid search URL '{}'", self.sources.trac_search))?;

        let body = html::fetch(&self.client, url.as_str()).await?;
        let data = parse_changesets(&body);

        self.cache.put(talent.id, Source::Changesets.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached {} changeset hits for talent {}", data.count, talent.id);
        Ok(data)
    }
}

/// Extract the hit count and result entries from a search results page.
#[must_use]
pub fn parse_changesets(body: &str) -> ChangesetData {
    let doc = Document::parse(body);

    let count = doc
        .attr("meta[name=\"totalResults\"]", "content")
        .map_or(0, |content| lenient_number(&content));

    // Results render as alternating <dt> (link) / <dd> (message) pairs.
    let links = doc.elements("dl#results dt");
    let messages = doc.elements("dl#results dd");

    let changesets = links
        .into_iter()
        .zip(messages)
        .map(|(dt, dd)| {
            let title = child_text(dt, "a").unwrap_or_default();
            let message = element_text(dd);

            Changeset {
                id: child_attr(dt, "a", "href").map_or(0, |href| changeset_id(&href)),
                description: title.split_once(':').map_or(title.clone(), |(_, rest)| rest.trim().to_owned()),
                ticket: TICKET
                    .captures(&message)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse().ok()),
            }
        })
        .collect();

    ChangesetData { count, changesets }
}

/// Changeset links look like `/changeset/12345`; the id is the second path
/// segment.
fn changeset_id(href: &str) -> u64 {
    href.split('/').nth(2).map_or(0, lenient_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><meta name="totalResults" content="523" /></head><body>
        <dl id="results">
            <dt><a href="/changeset/30157">[30157]: Improve widget handling</a></dt>
            <dd>Improve widget handling in customizer. Props johndoe. Fixes #29858.</dd>
            <dt><a href="/changeset/29001">[29001]: Cleanup</a></dt>
            <dd>General cleanup pass. Props johndoe, janedoe.</dd>
        </dl>
        </body></html>"#;

    #[test]
    fn parses_count_and_entries() {
        let data = parse_changesets(PAGE);

        assert_eq!(data.count, 523);
        assert_eq!(data.changesets.len(), 2);
        assert_eq!(data.changesets[0].id, 30157);
        assert_eq!(data.changesets[0].description, "Improve widget handling");
        assert_eq!(data.changesets[0].ticket, Some(29858));
        assert_eq!(data.changesets[1].ticket, None);
    }

    #[test]
    fn no_results_is_all_zero() {
        assert_eq!(parse_changesets("<html></html>"), ChangesetData::default());
    }
}
