//! Core entity types shared by the collectors, score engine, and sync layer.
//!
//! A [`Talent`] is the unit everything else operates on: a person, company,
//! or product tracked by the platform. Talents are owned by the backing
//! store; this crate only reads identity fields and writes source-scoped
//! meta values against them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Unique identifier of a talent in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TalentId(pub u64);

impl core::fmt::Display for TalentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of entity a talent record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TalentKind {
    Person,
    Company,
    Product,
}

/// A talent entity as read from the backing store.
///
/// `username` is the source-site login the collectors key off; talents
/// without one (products, manually entered companies) simply yield empty
/// collector data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Talent {
    pub id: TalentId,
    pub slug: String,
    pub name: String,
    pub kind: TalentKind,

    /// Free-text profile content.
    #[serde(default)]
    pub content: String,

    /// Source-site username this talent is bound to.
    #[serde(default)]
    pub username: String,

    /// Job title, only meaningful for persons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    /// Platform VIP partner flag, only meaningful for companies.
    #[serde(default)]
    pub is_vip: bool,
}

impl Talent {
    /// Create a minimal talent record with the given identity fields.
    #[must_use]
    pub fn new(id: TalentId, username: &str, name: &str, kind: TalentKind) -> Self {
        Self {
            id,
            slug: slugify(username),
            name: name.to_owned(),
            kind,
            content: String::new(),
            username: username.to_owned(),
            job_title: None,
            is_vip: false,
        }
    }
}

/// The type of a directed edge between two talents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationKind {
    /// Company → person, with an optional role.
    Team,
    /// Product → person/company.
    ProductOwner,
    /// Company → job posting.
    Hiring,
}

/// A directed, typed edge between two talents. Read-only from this crate's
/// perspective; ownership of the graph lives with the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from: TalentId,
    pub to: TalentId,
    pub kind: RelationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Produce a URL-safe slug from a display name or username.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        let _ = slug.pop();
    }

    slug
}
