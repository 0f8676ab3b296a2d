//! Core release contribution collector.
//!
//! Walks every credited release from the oldest tracked one up to the
//! current version, asking the credits API who was credited and in what
//! role. The per-release credits documents are identical for every talent,
//! so they are memoized for the life of the process and only the per-talent
//! version-to-role map is cached in the store.

use super::{ReadContext, RefreshScheduler, Source, read_through};
use crate::Result;
use crate::cache::TalentCache;
use crate::config::Sources;
use crate::html;
use crate::model::Talent;
use ohno::IntoAppError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

const LOG_TARGET: &str = "   credits";

/// Credits shift rarely once a release is out; renew monthly.
const TTL: core::time::Duration = core::time::Duration::from_secs(4 * 7 * 24 * 60 * 60);

/// Map of release version to the role the talent was credited with.
pub type ContributionsData = BTreeMap<String, String>;

/// One release's parsed credits document.
#[derive(Debug, Deserialize)]
pub(super) struct CreditsData {
    #[serde(default)]
    version: String,

    /// Groups in document order; the order decides which credit wins for
    /// people listed in more than one group.
    #[serde(default, deserialize_with = "ordered_groups")]
    groups: Vec<(String, CreditsGroup)>,
}

#[derive(Debug, Deserialize)]
struct CreditsGroup {
    /// Group display name; the API emits `false` instead of a string for
    /// unnamed groups.
    #[serde(default)]
    name: Value,

    #[serde(default, rename = "type")]
    kind: String,

    /// Username to person details. Details are an array for title-carrying
    /// groups and a bare string elsewhere.
    #[serde(default)]
    data: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    data: CreditsData,
}

/// Deserialize the groups object into a vector so the document's own group
/// order survives; a plain map would re-sort it by key.
fn ordered_groups<'de, D>(deserializer: D) -> core::result::Result<Vec<(String, CreditsGroup)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct GroupsVisitor;

    impl<'de> serde::de::Visitor<'de> for GroupsVisitor {
        type Value = Vec<(String, CreditsGroup)>;

        fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str("a map of credit groups")
        }

        fn visit_map<A>(self, mut access: A) -> core::result::Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            let mut groups = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(entry) = access.next_entry()? {
                groups.push(entry);
            }
            Ok(groups)
        }
    }

    deserializer.deserialize_map(GroupsVisitor)
}

#[derive(Debug)]
pub struct ContributionsCollector {
    client: reqwest::Client,
    cache: TalentCache,
    sources: Arc<Sources>,

    /// Per-release credits, shared across talents. `None` records a release
    /// the API has no distinct document for.
    memo: Mutex<HashMap<String, Option<Arc<CreditsData>>>>,
}

impl ContributionsCollector {
    pub(super) fn new(client: reqwest::Client, cache: TalentCache, sources: Arc<Sources>) -> Self {
        Self {
            client,
            cache,
            sources,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// The latest cached contribution map, scheduling a renewal when
    /// permitted.
    #[must_use]
    pub fn get(&self, talent: &Talent, ctx: ReadContext, scheduler: &dyn RefreshScheduler) -> ContributionsData {
        read_through(&self.cache, talent, Source::Contributions, ctx, scheduler)
    }

    /// Scan all credited releases for the talent and cache the resulting
    /// version-to-role map. A release whose credits cannot be fetched is
    /// skipped; it will be retried on the next refresh cycle.
    pub async fn refresh(&self, talent: &Talent) -> Result<ContributionsData> {
        let mut contributions = ContributionsData::new();

        for version in self.sources.credited_releases() {
            match self.credits(&version).await {
                Ok(Some(credits)) => {
                    if let Some(role) = credited_role(&credits, &talent.username) {
                        let _ = contributions.insert(version, role);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Skipping release {version}: {e:#}");
                }
            }
        }

        self.cache.put(talent.id, Source::Contributions.key(), &contributions, TTL)?;
        log::debug!(
            target: LOG_TARGET,
            "Cached credits in {} releases for talent {}",
            contributions.len(),
            talent.id
        );
        Ok(contributions)
    }

    /// The credits document for one release, fetched at most once per
    /// process. The API answers for the nearest published version; a
    /// mismatched version in the reply means the requested release has no
    /// document of its own.
    async fn credits(&self, version: &str) -> Result<Option<Arc<CreditsData>>> {
        if let Some(known) = self.memo.lock().await.get(version) {
            return Ok(known.clone());
        }

        let url = Url::parse_with_params(&format!("{}/", self.sources.credits_api), &[("version", version), ("locale", "en_US")])
            .into_app_err_with(|| format!("invalid credits API URL '{}'", self.sources.credits_api))?;

        let body = html::fetch(&self.client, url.as_str()).await?;
        let response: CreditsResponse =
            serde_json::from_str(&body).into_app_err_with(|| format!("unable to parse credits for release {version}"))?;

        let entry = if response.data.version == version {
            Some(Arc::new(response.data))
        } else {
            None
        };

        let _ = self.memo.lock().await.insert(version.to_owned(), entry.clone());
        Ok(entry)
    }
}

/// Find the role a username was credited with in one release, if any.
///
/// Library-typed groups credit upstream projects, not people, and are
/// skipped. Within title-carrying groups the most specific label wins: a
/// personal title, then the group's display name, then the group slug
/// prettified; a trailing plural "s" is dropped. Members of plain name-list
/// groups are all "Core Contributor". Groups are scanned in document order
/// and the first match wins.
pub(super) fn credited_role(credits: &CreditsData, username: &str) -> Option<String> {
    for (slug, group) in &credits.groups {
        if group.kind == "libraries" {
            continue;
        }

        let member = group.data.keys().find(|person| person.eq_ignore_ascii_case(username));
        if member.is_none() {
            continue;
        }

        if group.kind != "titles" {
            return Some("Core Contributor".to_owned());
        }

        let details = member.and_then(|person| group.data.get(person));
        let role = details
            .and_then(|d| d.get(3))
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .map(str::to_owned)
            .or_else(|| group.name.as_str().filter(|name| !name.is_empty()).map(str::to_owned))
            .unwrap_or_else(|| prettify_slug(slug));

        return Some(role.trim_end_matches('s').to_owned());
    }

    None
}

fn prettify_slug(slug: &str) -> String {
    let spaced = slug.replace('-', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().collect::<String>() + chars.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credits(json: &str) -> CreditsData {
        serde_json::from_str(json).unwrap()
    }

    const RELEASE: &str = r#"{
        "version": "4.2",
        "groups": {
            "project-leaders": {
                "name": "Project Leaders",
                "type": "titles",
                "data": {
                    "matt": ["Matt", "hash1", "m", "Cofounder, Project Lead"],
                    "johndoe": ["John Doe", "hash2", "johndoe", "Release Lead"]
                }
            },
            "core-developers": {
                "name": false,
                "type": "titles",
                "data": {
                    "janedoe": ["Jane Doe", "hash3", "janedoe", ""]
                }
            },
            "contributing-developers": {
                "name": "Contributing Developers",
                "type": "titles",
                "data": {
                    "dev1": ["Dev One", "hash4", "dev1"]
                }
            },
            "props": {
                "name": "Core Contributors",
                "type": "list",
                "data": {
                    "helper": "Helpful Person"
                }
            },
            "libraries": {
                "name": "External Libraries",
                "type": "libraries",
                "data": {
                    "johndoe": "jQuery"
                }
            }
        }
    }"#;

    #[test]
    fn personal_title_wins() {
        let credits = credits(RELEASE);
        assert_eq!(credited_role(&credits, "johndoe").as_deref(), Some("Release Lead"));
    }

    #[test]
    fn username_match_is_case_insensitive() {
        let credits = credits(RELEASE);
        assert_eq!(credited_role(&credits, "JohnDoe").as_deref(), Some("Release Lead"));
    }

    #[test]
    fn unnamed_group_falls_back_to_prettified_slug() {
        let credits = credits(RELEASE);
        // "core-developers" with a false name and an empty personal title.
        assert_eq!(credited_role(&credits, "janedoe").as_deref(), Some("Core developer"));
    }

    #[test]
    fn group_name_loses_its_plural() {
        let credits = credits(RELEASE);
        assert_eq!(credited_role(&credits, "dev1").as_deref(), Some("Contributing Developer"));
    }

    #[test]
    fn name_list_members_are_core_contributors() {
        let credits = credits(RELEASE);
        assert_eq!(credited_role(&credits, "helper").as_deref(), Some("Core Contributor"));
    }

    #[test]
    fn library_credits_do_not_count() {
        // johndoe also appears under libraries; only the people group hit
        // should have mattered, and a libraries-only user gets nothing.
        // The skip keys off the group type, whatever the slug says.
        let only_libraries = credits(
            r#"{"version": "4.0", "groups": {
                "external-libraries": {"name": "External Libraries", "type": "libraries",
                                       "data": {"ghost": "some-lib"}}
            }}"#,
        );
        assert_eq!(credited_role(&only_libraries, "ghost"), None);
    }

    #[test]
    fn document_order_decides_between_groups() {
        // "contributing-developers" sorts before "core-developers"; the
        // document order must win, not the alphabetical one.
        let release = credits(
            r#"{"version": "4.3", "groups": {
                "core-developers": {"name": "Core Developers", "type": "titles",
                                    "data": {"dualdev": ["Dual Dev", "hash", "dualdev", ""]}},
                "contributing-developers": {"name": "Contributing Developers", "type": "titles",
                                            "data": {"dualdev": ["Dual Dev", "hash", "dualdev", ""]}}
            }}"#,
        );
        assert_eq!(credited_role(&release, "dualdev").as_deref(), Some("Core Developer"));
    }

    #[test]
    fn uncredited_username_is_none() {
        let credits = credits(RELEASE);
        assert_eq!(credited_role(&credits, "stranger"), None);
    }
}
