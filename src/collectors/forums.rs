//! Support forum profile collector.
//!
//! Scrapes a talent's forum profile page: the threads they started, the
//! replies they wrote, and an estimated all-time reply total. The profile
//! page only shows one page of replies; when a pagination bar is present,
//! the total is estimated as `last page number x replies per page` rather
//! than crawling every page.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document, child_attr, child_text, element_text, lenient_number};
use crate::model::Talent;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "    forums";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// One thread or reply listed on the profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumEntry {
    pub title: String,
    pub url: String,

    /// The freshness label as shown ("2 months ago", "May 5, 2014").
    pub date: String,
}

/// Scraped forum activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForumsData {
    /// Estimated all-time reply count, extrapolated from pagination.
    pub total_replies: u64,

    pub threads: Vec<ForumEntry>,
    pub replies: Vec<ForumEntry>,
}

#[derive(Debug)]
pub struct ForumsCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl ForumsCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached forum activity, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> ForumsData {
        read_through(&self.cache, talent, Source::Forums, ctx, scheduler)
    }

    /// Fetch, parse, and cache the forum profile page.
    pub async fn refresh(&self, talent: &Talent) -> Result<ForumsData> {
        let url = format!("{}/{}", self.sources.forums_base, talent.username);
        let body = html::fetch(&self.client, &url).await?;
        let data = parse_forums(&body);

        self.cache.put(talent.id, Source::Forums.key(), &data, TTL)?;
        log::debug!(
            target: LOG_TARGET,
            "Cached forum activity for talent {}: {} threads, ~{} replies",
            talent.id,
            data.threads.len(),
            data.total_replies
        );
        Ok(data)
    }
}

/// Extract forum activity from a profile page body.
#[must_use]
pub fn parse_forums(body: &str) -> ForumsData {
    let doc = Document::parse(body);

    let threads: Vec<ForumEntry> = doc.elements("div#user-threads ol li").into_iter().map(parse_entry).collect();
    let replies: Vec<ForumEntry> = doc.elements("div#user-replies ol li").into_iter().map(parse_entry).collect();

    ForumsData {
        total_replies: estimate_total(&doc.texts(".page-numbers"), replies.len()),
        threads,
        replies,
    }
}

fn parse_entry(li: ElementRef<'_>) -> ForumEntry {
    ForumEntry {
        title: child_text(li, "a").unwrap_or_default(),
        url: child_attr(li, "a", "href").unwrap_or_default(),
        date: trailing_date(&element_text(li)),
    }
}

/// The freshness label trails each list item as its last three words, with
/// a possible sentence-ending period.
fn trailing_date(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 3 {
        return String::new();
    }
    tokens[tokens.len() - 3..].join(" ").replace('.', "")
}

/// The pagination bar is rendered twice (above and below the list); the
/// last real page number sits two entries before the end of the first copy.
/// Without a bar, the visible replies are all there are.
fn estimate_total(page_numbers: &[String], visible_replies: usize) -> u64 {
    let visible = visible_replies as u64;
    if page_numbers.len() < 4 {
        return visible;
    }

    let last_page = lenient_number(&page_numbers[page_numbers.len() / 2 - 2]);
    if last_page == 0 { visible } else { last_page * visible }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div id="user-threads"><ol>
                <li><a href="https://forums.example/topic/broken-widget">Broken widget</a> Started 2 months ago.</li>
            </ol></div>
            <div id="user-replies"><ol>
                <li><a href="https://forums.example/topic/help-1">Help 1</a> Posted on May 5, 2014.</li>
                <li><a href="https://forums.example/topic/help-2">Help 2</a> Posted 3 weeks ago.</li>
            </ol></div>
            <span class="page-numbers">1</span>
            <span class="page-numbers">2</span>
            <span class="page-numbers">12</span>
            <span class="page-numbers">Next</span>
            <span class="page-numbers">1</span>
            <span class="page-numbers">2</span>
            <span class="page-numbers">12</span>
            <span class="page-numbers">Next</span>
        </body></html>"#;

    #[test]
    fn parses_threads_and_replies() {
        let data = parse_forums(PAGE);

        assert_eq!(data.threads.len(), 1);
        assert_eq!(data.threads[0].title, "Broken widget");
        assert_eq!(data.threads[0].date, "2 months ago");

        assert_eq!(data.replies.len(), 2);
        assert_eq!(data.replies[0].date, "May 5, 2014");
    }

    #[test]
    fn total_extrapolates_from_last_page_number() {
        // 12 pages at 2 visible replies each.
        assert_eq!(parse_forums(PAGE).total_replies, 24);
    }

    #[test]
    fn total_without_pagination_counts_visible_replies() {
        let page = r#"<div id="user-replies"><ol>
            <li><a href="u">A</a> one two ago.</li>
            <li><a href="u">B</a> one two ago.</li>
            <li><a href="u">C</a> one two ago.</li>
        </ol></div>"#;
        assert_eq!(parse_forums(page).total_replies, 3);
    }

    #[test]
    fn empty_profile_is_all_zero() {
        assert_eq!(parse_forums("<html></html>"), ForumsData::default());
    }
}
