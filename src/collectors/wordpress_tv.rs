//! Video directory collector.
//!
//! Scrapes the talent's speaker page on the community video site. Results
//! are paginated with an "older videos" link; pages are followed in order
//! and concatenated, capped at a fixed page budget so a runaway archive
//! cannot stall a refresh cycle. Hitting the cap is still a successful
//! refresh, just with partial data.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document, child_attr, child_text};
use crate::model::{Talent, slugify};
use chrono::NaiveDate;
use ohno::IntoAppError;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const LOG_TARGET: &str = "    videos";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound on pagination depth per refresh.
const MAX_PAGES: usize = 50;

/// One published talk or interview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
    pub url: String,
    pub thumbnail: String,

    /// The event the talk was recorded at, when listed.
    pub event: String,

    pub description: String,
    pub date: Option<NaiveDate>,
}

/// All scraped videos plus their count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoData {
    pub total: u64,
    pub videos: Vec<Video>,
}

/// One parsed listing page.
#[derive(Debug, Default, PartialEq)]
pub(super) struct VideoPage {
    pub videos: Vec<Video>,

    /// Link to the next-older page, if the archive continues.
    pub older: Option<String>,
}

#[derive(Debug)]
pub struct WordPressTvCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl WordPressTvCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached video list, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> VideoData {
        read_through(&self.cache, talent, Source::WordPressTv, ctx, scheduler)
    }

    /// Walk the speaker page and its "older videos" chain, then cache the
    /// concatenated result. Any page failing to load fails the refresh and
    /// leaves the previous cache entry in place.
    ///
    /// Speaker pages are filed under the display name, not the login.
    pub async fn refresh(&self, talent: &Talent) -> Result<VideoData> {
        let mut url = format!("{}/{}/", self.sources.tv_base, slugify(&talent.name));
        let mut videos = Vec::new();

        for page_number in 1..=MAX_PAGES {
            let body = html::fetch(&self.client, &url).await?;
            let page = parse_video_page(&body);
            videos.extend(page.videos);

            let Some(older) = page.older else { break };
            if page_number == MAX_PAGES {
                log::debug!(target: LOG_TARGET, "Stopping after {MAX_PAGES} pages for talent {}", talent.id);
                break;
            }
            url = absolute(&url, &older)?;
        }

        let data = VideoData {
            total: videos.len() as u64,
            videos,
        };

        self.cache.put(talent.id, Source::WordPressTv.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached {} videos for talent {}", data.total, talent.id);
        Ok(data)
    }
}

/// Resolve a possibly-relative "older videos" link against the page it
/// appeared on.
fn absolute(current: &str, older: &str) -> Result<String> {
    let base = Url::parse(current).into_app_err_with(|| format!("invalid page URL '{current}'"))?;
    let resolved = base.join(older).into_app_err_with(|| format!("invalid pagination link '{older}'"))?;
    Ok(resolved.into())
}

/// Extract the video entries and the next-older link from a listing page.
#[must_use]
pub(super) fn parse_video_page(body: &str) -> VideoPage {
    let doc = Document::parse(body);

    VideoPage {
        videos: doc.elements("ul.video-list li").into_iter().map(parse_video).collect(),
        older: doc.attr(".nav-previous a", "href"),
    }
}

fn parse_video(li: ElementRef<'_>) -> Video {
    let description = child_text(li, ".video-excerpt p").unwrap_or_default();

    Video {
        title: child_text(li, "h4 a").unwrap_or_default(),
        url: child_attr(li, "h4 a", "href").unwrap_or_default(),
        thumbnail: child_attr(li, "img", "src").unwrap_or_default(),
        event: child_text(li, ".video-events a").unwrap_or_default(),
        date: leading_date(&description),
        description,
    }
}

/// Excerpts open with the publication date as their first three words.
fn leading_date(description: &str) -> Option<NaiveDate> {
    let candidate: Vec<&str> = description.split_whitespace().take(3).collect();
    if candidate.len() < 3 {
        return None;
    }
    NaiveDate::parse_from_str(&candidate.join(" "), "%B %d, %Y").ok()
}
