//! Public profile page collector.
//!
//! The profile page is the richest single source: display name, avatar,
//! location, employer, badges, and a free-form bio. Besides caching the
//! scraped data, a successful refresh folds identity fields back into the
//! talent record itself — the profile is authoritative for the display name,
//! and the employer line seeds an empty job title.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html::{self, Document};
use crate::model::{Talent, TalentKind};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LOG_TARGET: &str = "   profile";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Everything scraped off a public profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub name: String,
    pub avatar: String,
    pub location: String,
    pub company: String,
    pub website: String,
    pub slack: String,
    pub member_since: Option<NaiveDate>,
    pub badges: Vec<String>,
    pub bio: String,
}

#[derive(Debug)]
pub struct ProfileCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,
}

impl ProfileCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self { client, cache, sources }
    }

    /// The latest cached profile, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> ProfileData {
        read_through(&self.cache, talent, Source::Profile, ctx, scheduler)
    }

    /// Fetch, parse, and cache the profile page, then fold identity fields
    /// back into the talent record. A retrieval failure leaves both the
    /// cache and the record untouched.
    pub async fn refresh(&self, talent: &Talent) -> Result<ProfileData> {
        let url = format!("{}/{}", self.sources.profile_base, talent.username);
        let body = html::fetch(&self.client, &url).await?;
        let data = parse_profile(&body);

        self.cache.put(talent.id, Source::Profile.key(), &data, TTL)?;
        self.apply_identity(talent, &data)?;

        log::debug!(target: LOG_TARGET, "Cached profile for talent {} ({} badges)", talent.id, data.badges.len());
        Ok(data)
    }

    /// Fold profile fields into the talent record: the profile name is
    /// authoritative, the employer line fills an empty job title for
    /// persons, the bio fills empty content, and the avatar URL is stored
    /// as plain meta for hosts to render.
    fn apply_identity(&self, talent: &Talent, data: &ProfileData) -> Result<()> {
        let mut updated = talent.clone();
        let mut dirty = false;

        if !data.name.is_empty() && updated.name != data.name {
            updated.name = data.name.clone();
            dirty = true;
        }

        if updated.kind == TalentKind::Person && updated.job_title.is_none() && !data.company.is_empty() {
            updated.job_title = Some(data.company.clone());
            dirty = true;
        }

        if updated.content.is_empty() && !data.bio.is_empty() {
            updated.content = data.bio.clone();
            dirty = true;
        }

        if dirty {
            self.cache.store().update_talent(&updated)?;
        }

        if !data.avatar.is_empty() {
            self.cache
                .store()
                .put_meta(talent.id, "_avatar", serde_json::Value::String(data.avatar.clone()))?;
        }

        Ok(())
    }
}

/// Extract profile fields from a profile page body. Every field is
/// optional in the markup; misses produce empty strings, never errors.
#[must_use]
pub fn parse_profile(body: &str) -> ProfileData {
    let doc = Document::parse(body);

    ProfileData {
        name: doc.text("h2.fn").unwrap_or_default(),
        avatar: doc
            .attr("div#meta-status-badge-container a img", "src")
            .map(|src| src.split('?').next().unwrap_or_default().to_owned())
            .unwrap_or_default(),
        location: doc.text("li#user-location").unwrap_or_default(),
        company: doc.text("li#user-company").unwrap_or_default(),
        website: doc.attr("li#user-website a", "href").unwrap_or_default(),
        slack: doc
            .text("li#slack-username")
            .and_then(|text| text.split_whitespace().next().map(|s| s.trim_start_matches('@').to_owned()))
            .unwrap_or_default(),
        member_since: doc.text("li#user-member-since").as_deref().and_then(parse_member_since),
        badges: doc.attrs("ul#user-badges li div", "title"),
        bio: doc.text("div.item-meta-about").unwrap_or_default(),
    }
}

/// The member-since line reads "Member since <Month> <day>, <year>"; take
/// the trailing three tokens and parse them as a date.
fn parse_member_since(text: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }

    let candidate = tokens[tokens.len() - 3..].join(" ");
    NaiveDate::parse_from_str(&candidate, "%B %d, %Y").ok()
}
