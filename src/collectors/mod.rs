//! Data collection and normalization from the external sources.
//!
//! Each submodule owns one third-party source: it checks the per-talent
//! cache, fetches and parses when allowed to, and writes normalized data
//! back under its source-scoped key. Parsing is kept in pure functions so
//! the scraping rules are testable without I/O.
//!
//! # Implementation Model
//!
//! [`Source`] is the static registry of collectors — callers iterate it or
//! name a member directly instead of dispatching on strings. [`Collectors`]
//! aggregates one collector instance per source behind a shared HTTP client
//! and cache, and [`TalentFacts`] is the flat snapshot of every source's
//! current cached value that the score engine and sync layer consume.
//!
//! Reads never block on the network: a stale or missing value is returned
//! as-is (or as the zero/empty sentinel) and, when the caller's
//! [`ReadContext`] permits renewal, a refresh is handed to a
//! [`RefreshScheduler`] to run outside the request.

use crate::Result;
use crate::cache::{CacheState, TalentCache};
use crate::config::{HTTP_TIMEOUT, Sources};
use crate::model::{Talent, TalentId};
use crate::store::Store;
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub mod bbpress;
pub mod buddypress;
pub mod changesets;
pub mod codex;
pub mod contributions;
pub mod forums;
pub mod gravatar;
pub mod plugins;
pub mod profile;
pub mod stack_exchange;
pub mod themes;
pub mod wordpress_tv;

const LOG_TARGET: &str = "collectors";

/// The registry of collectors, one per external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Source {
    /// First in the registry: its refresh seeds the `_avatar` meta the
    /// Gravatar lookup keys off.
    Profile,

    Gravatar,
    Plugins,
    Themes,
    Forums,

    #[strum(serialize = "bbpress")]
    BbPress,

    #[strum(serialize = "buddypress")]
    BuddyPress,

    Changesets,
    Codex,
    Contributions,
    StackExchange,

    #[strum(serialize = "wordpress-tv")]
    WordPressTv,
}

impl Source {
    /// The cache key this source stores its normalized data under.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Profile => "_profile",
            Self::Gravatar => "_gravatar",
            Self::Plugins => "_plugins",
            Self::Themes => "_themes",
            Self::Forums => "_forums",
            Self::BbPress => "_bbpress",
            Self::BuddyPress => "_buddypress",
            Self::Changesets => "_changesets",
            Self::Codex => "_codex",
            Self::Contributions => "_contributions",
            Self::StackExchange => "_wpse",
            Self::WordPressTv => "_wordpresstv",
        }
    }
}

/// Whether the current execution context may trigger a refresh.
///
/// Interactive page renders may renew; API, bulk, and cron-triggered reads
/// must serve whatever is cached to avoid cascading network calls during
/// high-fanout operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    may_renew: bool,
}

impl ReadContext {
    /// A context allowed to schedule refreshes (interactive render).
    #[must_use]
    pub const fn interactive() -> Self {
        Self { may_renew: true }
    }

    /// A context restricted to cached data (API, bulk, cron fan-out).
    #[must_use]
    pub const fn cached_only() -> Self {
        Self { may_renew: false }
    }

    #[must_use]
    pub const fn may_renew(self) -> bool {
        self.may_renew
    }
}

/// Receives refresh requests produced by stale reads. Implemented by the
/// task queue; tests substitute recording stubs.
pub trait RefreshScheduler: Send + Sync {
    /// Request that `source` be refreshed for `talent` at some point after
    /// the current operation completes.
    fn schedule(&self, talent: TalentId, source: Source);
}

/// A scheduler that drops every request; useful where renewal is
/// structurally impossible (tests, one-shot CLI reads).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScheduler;

impl RefreshScheduler for NoScheduler {
    fn schedule(&self, _talent: TalentId, _source: Source) {}
}

/// The shared cache-first read path every collector's `get` goes through.
///
/// Fresh data is returned directly. Stale or missing data is returned as
/// the last known value (or the type's zero/empty sentinel) and a refresh
/// is scheduled when the context permits one; the caller never waits on
/// the network.
pub(crate) fn read_through<T>(
    cache: &TalentCache,
    talent: &Talent,
    source: Source,
    ctx: ReadContext,
    scheduler: &dyn RefreshScheduler,
) -> T
where
    T: DeserializeOwned + Default,
{
    match cache.get::<T>(talent.id, source.key()) {
        CacheState::Fresh(data) => data,
        CacheState::Stale(data) => {
            if ctx.may_renew() {
                scheduler.schedule(talent.id, source);
            }
            data
        }
        CacheState::Missing => {
            if ctx.may_renew() {
                scheduler.schedule(talent.id, source);
            }
            T::default()
        }
    }
}

/// One collector instance per source, sharing an HTTP client and cache.
#[derive(Debug)]
pub struct Collectors {
    profile: profile::ProfileCollector,
    gravatar: gravatar::GravatarCollector,
    plugins: plugins::PluginsCollector,
    themes: themes::ThemesCollector,
    forums: forums::ForumsCollector,
    bbpress: bbpress::BbPressCollector,
    buddypress: buddypress::BuddyPressCollector,
    changesets: changesets::ChangesetsCollector,
    codex: codex::CodexCollector,
    contributions: contributions::ContributionsCollector,
    stack_exchange: stack_exchange::StackExchangeCollector,
    wordpress_tv: wordpress_tv::WordPressTvCollector,
    cache: TalentCache,
}

impl Collectors {
    /// Build the full collector set against a store and source endpoints.
    pub fn new(store: Arc<dyn Store>, sources: Sources) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("talent-rank/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .into_app_err("unable to create HTTP client")?;

        let cache = TalentCache::new(store);
        let sources = Arc::new(sources);

        Ok(Self {
            profile: profile::ProfileCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            gravatar: gravatar::GravatarCollector::new(client.clone(), cache.clone()),
            plugins: plugins::PluginsCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            themes: themes::ThemesCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            forums: forums::ForumsCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            bbpress: bbpress::BbPressCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            buddypress: buddypress::BuddyPressCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            changesets: changesets::ChangesetsCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            codex: codex::CodexCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            contributions: contributions::ContributionsCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            stack_exchange: stack_exchange::StackExchangeCollector::new(client.clone(), cache.clone(), Arc::clone(&sources)),
            wordpress_tv: wordpress_tv::WordPressTvCollector::new(client, cache.clone(), sources),
            cache,
        })
    }

    /// The cache all collectors write through.
    #[must_use]
    pub const fn cache(&self) -> &TalentCache {
        &self.cache
    }

    /// The profile collector, used directly by the importer for seeding.
    #[must_use]
    pub const fn profile(&self) -> &profile::ProfileCollector {
        &self.profile
    }

    /// Refresh one source for a talent.
    ///
    /// Without `force`, a still-fresh cache entry short-circuits the call;
    /// `force` bypasses the freshness check entirely (periodic ticks and
    /// `--force-update`).
    pub async fn refresh(&self, source: Source, talent: &Talent, force: bool) -> Result<()> {
        if !force && self.cache.get::<serde_json::Value>(talent.id, source.key()).is_fresh() {
            log::debug!(target: LOG_TARGET, "Skipping {source} refresh for talent {}: cache is fresh", talent.id);
            return Ok(());
        }

        log::info!(target: LOG_TARGET, "Refreshing {source} for talent {} ('{}')", talent.id, talent.username);

        match source {
            Source::Profile => self.profile.refresh(talent).await.map(|_| ()),
            Source::Gravatar => self.gravatar.refresh(talent).await.map(|_| ()),
            Source::Plugins => self.plugins.refresh(talent).await.map(|_| ()),
            Source::Themes => self.themes.refresh(talent).await.map(|_| ()),
            Source::Forums => self.forums.refresh(talent).await.map(|_| ()),
            Source::BbPress => self.bbpress.refresh(talent).await.map(|_| ()),
            Source::BuddyPress => self.buddypress.refresh(talent).await.map(|_| ()),
            Source::Changesets => self.changesets.refresh(talent).await.map(|_| ()),
            Source::Codex => self.codex.refresh(talent).await.map(|_| ()),
            Source::Contributions => self.contributions.refresh(talent).await.map(|_| ()),
            Source::StackExchange => self.stack_exchange.refresh(talent).await.map(|_| ()),
            Source::WordPressTv => self.wordpress_tv.refresh(talent).await.map(|_| ()),
        }
    }

    /// Refresh every source for a talent, sequentially in registry order.
    /// Failures are per-source; one source failing never stops the rest.
    pub async fn refresh_all(&self, talent: &Talent, force: bool) -> Vec<(Source, Result<()>)> {
        let mut results = Vec::new();
        for source in Source::iter() {
            let result = self.refresh(source, talent, force).await;
            if let Err(e) = &result {
                log::warn!(target: LOG_TARGET, "{source} refresh failed for talent {}: {e:#}", talent.id);
            }
            results.push((source, result));
        }
        results
    }

    /// Snapshot every source's current cached value without any I/O.
    #[must_use]
    pub fn facts(&self, talent: &Talent) -> TalentFacts {
        TalentFacts::load(&self.cache, talent.id)
    }
}

/// The flat, possibly-stale snapshot of all collector outputs for one
/// talent. This is what the score engine computes over and what the sync
/// layer embeds into the search document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TalentFacts {
    pub profile: profile::ProfileData,
    pub gravatar: gravatar::GravatarData,
    pub plugins: Vec<plugins::PackageInfo>,
    pub themes: Vec<plugins::PackageInfo>,
    pub forums: forums::ForumsData,
    pub bbpress: bbpress::BbPressData,
    pub buddypress: buddypress::BuddyPressData,
    pub changesets: changesets::ChangesetData,
    pub codex: codex::CodexData,
    pub contributions: contributions::ContributionsData,
    pub wpse: stack_exchange::StackExchangeData,
    pub videos: wordpress_tv::VideoData,
}

impl TalentFacts {
    /// Load the latest cached value of every source, stale entries
    /// included, substituting the zero/empty sentinel where a source was
    /// never fetched.
    #[must_use]
    pub fn load(cache: &TalentCache, id: TalentId) -> Self {
        Self {
            profile: cache.get(id, Source::Profile.key()).latest_or_default(),
            gravatar: cache.get(id, Source::Gravatar.key()).latest_or_default(),
            plugins: cache.get(id, Source::Plugins.key()).latest_or_default(),
            themes: cache.get(id, Source::Themes.key()).latest_or_default(),
            forums: cache.get(id, Source::Forums.key()).latest_or_default(),
            bbpress: cache.get(id, Source::BbPress.key()).latest_or_default(),
            buddypress: cache.get(id, Source::BuddyPress.key()).latest_or_default(),
            changesets: cache.get(id, Source::Changesets.key()).latest_or_default(),
            codex: cache.get(id, Source::Codex.key()).latest_or_default(),
            contributions: cache.get(id, Source::Contributions.key()).latest_or_default(),
            wpse: cache.get(id, Source::StackExchange.key()).latest_or_default(),
            videos: cache.get(id, Source::WordPressTv.key()).latest_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TalentKind;
    use crate::store::MemoryStore;
    use core::time::Duration;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingScheduler {
        scheduled: Mutex<Vec<(TalentId, Source)>>,
    }

    impl RefreshScheduler for RecordingScheduler {
        fn schedule(&self, talent: TalentId, source: Source) {
            self.scheduled.lock().unwrap().push((talent, source));
        }
    }

    fn setup() -> (TalentCache, Talent) {
        let store = Arc::new(MemoryStore::new());
        let talent = store.create_talent("johndoe", "John Doe", TalentKind::Person).unwrap();
        (TalentCache::new(store), talent)
    }

    #[test]
    fn source_registry_is_complete_and_string_addressable() {
        use core::str::FromStr;

        assert_eq!(Source::iter().count(), 12);
        assert_eq!(Source::from_str("wordpress-tv").unwrap(), Source::WordPressTv);
        assert_eq!(Source::from_str("buddypress").unwrap(), Source::BuddyPress);
        assert_eq!(Source::Profile.key(), "_profile");

        // Cache keys are unique across the registry.
        let mut keys: Vec<_> = Source::iter().map(Source::key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 12);

        // The profile refresh must run before the Gravatar lookup so the
        // avatar meta it seeds is available in the same pass.
        let order: Vec<_> = Source::iter().collect();
        assert!(order.iter().position(|s| *s == Source::Profile) < order.iter().position(|s| *s == Source::Gravatar));
    }

    #[test]
    fn fresh_read_does_not_schedule() {
        let (cache, talent) = setup();
        cache
            .put(talent.id, Source::Codex.key(), &5_u64, Duration::from_secs(3600))
            .unwrap();

        let scheduler = RecordingScheduler::default();
        let value: u64 = read_through(&cache, &talent, Source::Codex, ReadContext::interactive(), &scheduler);

        assert_eq!(value, 5);
        assert!(scheduler.scheduled.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_read_returns_last_value_and_schedules() {
        let (cache, talent) = setup();
        let past = chrono::Utc::now() - chrono::Duration::hours(2);
        cache
            .put_at(talent.id, Source::Codex.key(), &5_u64, Duration::from_secs(3600), past)
            .unwrap();

        let scheduler = RecordingScheduler::default();
        let value: u64 = read_through(&cache, &talent, Source::Codex, ReadContext::interactive(), &scheduler);

        assert_eq!(value, 5);
        assert_eq!(*scheduler.scheduled.lock().unwrap(), vec![(talent.id, Source::Codex)]);
    }

    #[test]
    fn cached_only_context_never_schedules() {
        let (cache, talent) = setup();

        let scheduler = RecordingScheduler::default();
        let value: u64 = read_through(&cache, &talent, Source::Codex, ReadContext::cached_only(), &scheduler);

        assert_eq!(value, 0);
        assert!(scheduler.scheduled.lock().unwrap().is_empty());
    }
}
