//! Talent creation from a source-site username.
//!
//! Importing validates the username against the live profile site before
//! touching the store, creates the talent, then synchronously seeds it with
//! a profile refresh. If seeding fails the created talent is deleted again,
//! so a failed import leaves no trace and a retry with the same username
//! starts clean.

use crate::Result;
use crate::collectors::Collectors;
use crate::config::{HTTP_TIMEOUT, Sources};
use crate::model::{Talent, TalentKind};
use crate::store::Store;
use ohno::IntoAppError;
use std::sync::Arc;

const LOG_TARGET: &str = "  importer";

/// Why an import was rejected or failed.
#[derive(Debug)]
pub enum ImportError {
    /// Only persons and companies can be imported from a profile.
    InvalidKind(TalentKind),

    /// A talent is already bound to this username.
    AlreadyExists(String),

    /// The profile site has no user with this username.
    RemoteUserNotFound(String),

    /// The store rejected the new talent.
    CreationFailed(ohno::AppError),

    /// The initial profile refresh failed; the talent was rolled back.
    SeedFailed(ohno::AppError),
}

impl core::fmt::Display for ImportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidKind(kind) => write!(f, "cannot import a talent of kind '{kind}'"),
            Self::AlreadyExists(username) => write!(f, "a talent for username '{username}' already exists"),
            Self::RemoteUserNotFound(username) => write!(f, "no profile found for username '{username}'"),
            Self::CreationFailed(e) => write!(f, "unable to create talent: {e}"),
            Self::SeedFailed(e) => write!(f, "unable to seed talent data: {e}"),
        }
    }
}

impl core::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::CreationFailed(e) | Self::SeedFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Creates talents from source-site usernames.
#[derive(Debug)]
pub struct Importer<'a> {
    store: Arc<dyn Store>,
    collectors: &'a Collectors,
    sources: Arc<Sources>,

    /// Client with redirects disabled: the profile site answers unknown
    /// usernames with a redirect rather than a 404.
    head_client: reqwest::Client,
}

impl<'a> Importer<'a> {
    pub fn new(store: Arc<dyn Store>, collectors: &'a Collectors, sources: Sources) -> Result<Self> {
        let head_client = reqwest::Client::builder()
            .user_agent(concat!("talent-rank/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self {
            store,
            collectors,
            sources: Arc::new(sources),
            head_client,
        })
    }

    /// Import one talent, seeding it from their public profile.
    pub async fn import(
        &self,
        username: &str,
        display_name: Option<&str>,
        kind: TalentKind,
    ) -> core::result::Result<Talent, ImportError> {
        if kind == TalentKind::Product {
            return Err(ImportError::InvalidKind(kind));
        }

        if self.store.talent_by_username(username).is_some() {
            return Err(ImportError::AlreadyExists(username.to_owned()));
        }

        if !self.profile_exists(username).await {
            return Err(ImportError::RemoteUserNotFound(username.to_owned()));
        }

        let talent = self
            .store
            .create_talent(username, display_name.unwrap_or(username), kind)
            .map_err(ImportError::CreationFailed)?;

        log::info!(target: LOG_TARGET, "Created talent {} for username '{username}'", talent.id);

        if let Err(e) = self.collectors.profile().refresh(&talent).await {
            // Roll back so a retry starts clean.
            if let Err(delete_error) = self.store.delete_talent(talent.id) {
                log::error!(target: LOG_TARGET, "Rollback of talent {} failed: {delete_error:#}", talent.id);
            } else {
                log::info!(target: LOG_TARGET, "Rolled back talent {} after failed seed", talent.id);
            }
            return Err(ImportError::SeedFailed(e));
        }

        // The profile refresh may have updated identity fields.
        Ok(self.store.talent(talent.id).unwrap_or(talent))
    }

    /// HEAD the profile URL with redirects disabled. The profile site
    /// redirects unknown usernames to its front page, so anything but a
    /// direct 2xx means the user does not exist.
    async fn profile_exists(&self, username: &str) -> bool {
        let url = format!("{}/{username}", self.sources.profile_base);

        match self.head_client.head(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Profile existence check failed for '{username}': {e:#}");
                false
            }
        }
    }
}
