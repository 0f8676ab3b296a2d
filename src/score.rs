//! Deterministic reputation scoring over collected facts.
//!
//! The component functions are pure: given the same facts they produce the
//! same number, regardless of cache or store state. [`ScoreEngine`] wraps
//! them with the 12-hour score cache and the company aggregation, which
//! recursively scores every team member and pulls the company's own score
//! toward the team average.
//!
//! All components are additive onto a base of 1; the final score is the
//! rounded accumulation, floored at 1.

use crate::Result;
use crate::cache::TalentCache;
use crate::collectors::TalentFacts;
use crate::collectors::contributions::ContributionsData;
use crate::collectors::forums::ForumsData;
use crate::collectors::plugins::PackageInfo;
use crate::model::{RelationKind, Talent, TalentId, TalentKind};
use chrono::{Months, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const LOG_TARGET: &str = "     score";

pub const SCORE_KEY: &str = "_score";

/// Scores move with every collector refresh; renew twice a day.
const TTL: core::time::Duration = core::time::Duration::from_secs(12 * 60 * 60);

/// Computes and caches talent scores.
#[derive(Debug)]
pub struct ScoreEngine {
    cache: TalentCache,
}

impl ScoreEngine {
    #[must_use]
    pub const fn new(cache: TalentCache) -> Self {
        Self { cache }
    }

    /// The talent's score, recomputed when the cached one has expired or
    /// `force` is set.
    pub fn score(&self, talent: &Talent, force: bool) -> Result<u64> {
        self.score_guarded(talent, force, &mut HashSet::new())
    }

    fn score_guarded(&self, talent: &Talent, force: bool, visited: &mut HashSet<TalentId>) -> Result<u64> {
        if !visited.insert(talent.id) {
            // Relationship cycle; fall back to the last cached score so the
            // aggregation terminates.
            log::warn!(target: LOG_TARGET, "Scoring cycle detected at talent {}; using cached score", talent.id);
            return Ok(self.cache.get::<u64>(talent.id, SCORE_KEY).into_latest().unwrap_or(1));
        }

        if !force {
            if let crate::cache::CacheState::Fresh(score) = self.cache.get::<u64>(talent.id, SCORE_KEY) {
                return Ok(score);
            }
        }

        let facts = TalentFacts::load(&self.cache, talent.id);
        let today = Utc::now().date_naive();

        let mut accumulated = 1.0
            + plugin_score(&facts.plugins, today)
            + theme_score(&facts.themes)
            + badge_score(&facts.profile.badges) as f64
            + contribution_score(&facts.contributions, facts.changesets.count) as f64
            + video_score(facts.videos.videos.len()) as f64
            + forums_score(&facts.forums) as f64;

        if talent.kind == TalentKind::Company {
            if talent.is_vip && facts.profile.badges.is_empty() {
                accumulated += 10.0;
            }

            if let Some(team) = self.team_score(talent, force, visited)? {
                accumulated = (team + accumulated) / 2.0;
            }
        }

        let score = accumulated.round().max(1.0) as u64;
        self.cache.put(talent.id, SCORE_KEY, &score, TTL)?;
        log::debug!(target: LOG_TARGET, "Scored talent {} at {score}", talent.id);
        Ok(score)
    }

    /// The arithmetic mean of every team member's score, or `None` for a
    /// company with no team relationships.
    fn team_score(&self, company: &Talent, force: bool, visited: &mut HashSet<TalentId>) -> Result<Option<f64>> {
        let store = Arc::clone(self.cache.store());
        let members = store.related(company.id, RelationKind::Team);

        let mut scores = Vec::new();
        for relationship in members {
            if let Some(person) = store.talent(relationship.to) {
                scores.push(self.score_guarded(&person, force, visited)? as f64);
            }
        }

        if scores.is_empty() {
            return Ok(None);
        }
        Ok(Some(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

/// Per-plugin rating points plus a bonus banded on the median download
/// count. Plugins without an update in the last two years are ignored; a
/// talent with no plugins at all contributes nothing.
#[must_use]
pub fn plugin_score(plugins: &[PackageInfo], today: NaiveDate) -> f64 {
    if plugins.is_empty() {
        return 0.0;
    }

    let cutoff = today.checked_sub_months(Months::new(24)).unwrap_or(today);
    let maintained: Vec<&PackageInfo> = plugins
        .iter()
        .filter(|p| p.last_updated.is_some_and(|updated| updated >= cutoff))
        .collect();

    let rating_points: f64 = maintained.iter().map(|p| 1.0 + p.rating / 100.0).sum();
    let median = median_downloads(maintained.iter().map(|p| p.downloads).collect());

    let band = if median > 100_000 {
        10.0
    } else if median > 50_000 {
        7.0
    } else if median > 10_000 {
        4.0
    } else if median > 1_000 {
        2.0
    } else {
        1.0
    };

    rating_points + band
}

/// Like the plugin score but without the recency filter and with higher
/// download bands; themes age better than plugins.
#[must_use]
pub fn theme_score(themes: &[PackageInfo]) -> f64 {
    if themes.is_empty() {
        return 0.0;
    }

    let rating_points: f64 = themes.iter().map(|t| 1.0 + t.rating / 100.0).sum();
    let median = median_downloads(themes.iter().map(|t| t.downloads).collect());

    let band = if median > 100_000 {
        15.0
    } else if median > 50_000 {
        9.0
    } else if median > 10_000 {
        5.0
    } else if median > 1_000 {
        3.0
    } else {
        1.0
    };

    rating_points + band
}

/// Sum of per-badge weights, by exact badge name.
#[must_use]
pub fn badge_score(badges: &[String]) -> u64 {
    badges
        .iter()
        .map(|badge| match badge.as_str() {
            "Core Team" => 50,
            "Meta Team" => 25,
            "Plugin Developer" | "Theme Developer" => 15,
            "Community Team" | "WordCamp Speaker" => 10,
            "Theme Review Team" => 5,
            _ => 2,
        })
        .sum()
}

/// Role counts weighted by seniority, plus up to 20 points for credited
/// changesets (one point per twenty), truncated to an integer.
#[must_use]
pub fn contribution_score(contributions: &ContributionsData, changeset_count: u64) -> u64 {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for role in contributions.values() {
        *counts.entry(role.as_str()).or_insert(0) += 1;
    }

    let roles: u64 = counts
        .iter()
        .map(|(role, count)| {
            let factor = match *role {
                "Core Contributor" => 2,
                "Core Committer" => 3,
                "Core Developer" => 4,
                "Lead Developer" => 5,
                "Release Lead" => 6,
                _ => 1,
            };
            factor * count
        })
        .sum();

    roles + ((changeset_count as f64 / 20.0).min(20.0).trunc() as u64)
}

/// Banded on the number of published videos.
#[must_use]
pub const fn video_score(videos: usize) -> u64 {
    if videos > 20 {
        20
    } else if videos > 15 {
        15
    } else if videos > 10 {
        9
    } else if videos > 3 {
        3
    } else {
        1
    }
}

/// Banded on the estimated all-time reply count, plus a small bonus for
/// starting discussions.
#[must_use]
pub fn forums_score(forums: &ForumsData) -> u64 {
    let replies = forums.total_replies;

    let mut score = if replies >= 1000 {
        50
    } else if replies > 750 {
        37
    } else if replies >= 490 {
        25
    } else if replies >= 90 {
        10
    } else if replies > 10 {
        2
    } else {
        0
    };

    if forums.threads.len() > 5 {
        score += 5;
    }

    score
}

/// Median of a download-count list: sort ascending and index the middle,
/// rounding the midpoint up for even-length lists. Empty lists are 0.
fn median_downloads(mut downloads: Vec<u64>) -> u64 {
    if downloads.is_empty() {
        return 0;
    }

    downloads.sort_unstable();
    let index = ((downloads.len() as f64 / 2.0).round() as usize).saturating_sub(1);
    downloads[index]
}
