//! Gravatar profile collector.
//!
//! Gravatar exposes a JSON document next to every avatar image listing the
//! verified accounts linked to it. The avatar URL itself is taken from the
//! profile collector's `_avatar` meta, so this collector yields the empty
//! sentinel until a profile refresh has run at least once.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::html;
use crate::model::Talent;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "  gravatar";

const TTL: core::time::Duration = core::time::Duration::from_secs(7 * 24 * 60 * 60);

/// Social handles linked to the talent's Gravatar account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GravatarData {
    pub twitter: String,
    pub linkedin: String,
    pub facebook: String,
    pub google: String,
    pub website: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    entry: Vec<RawEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    #[serde(default)]
    accounts: Vec<RawAccount>,

    #[serde(default)]
    urls: Vec<RawUrl>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(default)]
    shortname: String,

    #[serde(default)]
    username: String,

    #[serde(default)]
    url: String,

    #[serde(default)]
    userid: String,
}

#[derive(Debug, Deserialize)]
struct RawUrl {
    #[serde(default)]
    value: String,
}

#[derive(Debug)]
pub struct GravatarCollector {
    client: reqwest::Client,
    cache: TalentCache,
}

impl GravatarCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache) -> Self {
        Self { client, cache }
    }

    /// The latest cached handles, scheduling a renewal when permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> GravatarData {
        read_through(&self.cache, talent, Source::Gravatar, ctx, scheduler)
    }

    /// Fetch the Gravatar profile document and cache the linked accounts.
    /// A talent with no known avatar yields the empty sentinel without any
    /// network traffic.
    pub async fn refresh(&self, talent: &Talent) -> Result<GravatarData> {
        let avatar = self
            .cache
            .store()
            .get_meta(talent.id, "_avatar")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();

        let data = if avatar.is_empty() {
            log::debug!(target: LOG_TARGET, "No avatar known for talent {}; skipping lookup", talent.id);
            GravatarData::default()
        } else {
            let body = html::fetch(&self.client, &profile_json_url(&avatar)).await?;
            parse_accounts(&body)?
        };

        self.cache.put(talent.id, Source::Gravatar.key(), &data, TTL)?;
        log::debug!(target: LOG_TARGET, "Cached linked accounts for talent {}", talent.id);
        Ok(data)
    }
}

/// The JSON profile lives next to the avatar image: drop the `/avatar/`
/// path segment, force the canonical host, and append `.json`.
#[must_use]
pub(super) fn profile_json_url(avatar: &str) -> String {
    let mut url = avatar.to_owned();
    if let Some(rest) = url.strip_prefix("//") {
        url = format!("https://{rest}");
    }
    url = url.replace("secure.gravatar.com", "www.gravatar.com").replace("/avatar/", "/");
    format!("{url}.json")
}

/// Decode the profile document's first entry into normalized handles. The
/// first listed URL backfills an account-less website.
pub(super) fn parse_accounts(body: &str) -> Result<GravatarData> {
    let response: ProfileResponse = serde_json::from_str(body).into_app_err("unable to parse avatar profile")?;
    let entry = response.entry.into_iter().next().unwrap_or_default();

    let mut data = GravatarData::default();
    for account in entry.accounts {
        match account.shortname.as_str() {
            "twitter" if data.twitter.is_empty() => data.twitter = account.username,
            "linkedin" if data.linkedin.is_empty() => data.linkedin = account.url,
            "facebook" if data.facebook.is_empty() => data.facebook = account.username,
            "google" if data.google.is_empty() => data.google = account.userid,
            "wordpress" if data.website.is_empty() => data.website = account.url,
            _ => {}
        }
    }

    if data.website.is_empty() {
        data.website = entry.urls.into_iter().next().map(|u| u.value).unwrap_or_default();
    }

    Ok(data)
}
