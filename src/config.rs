//! Endpoint configuration for the external sources.
//!
//! The exact URLs the collectors talk to are configuration, not protocol:
//! production uses the defaults below, while tests point individual fields
//! at a local mock server. Only base URLs live here; query strings and path
//! segments are composed by the collectors themselves.

use core::time::Duration;

/// Timeout applied to every outbound HTTP request, since a synchronous
/// renewal path can block a user-facing request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// The oldest release the contribution-credits lookup walks back to.
pub const OLDEST_CREDITED_RELEASE: &str = "3.2";

/// Base URLs and source-wide settings for all collectors.
#[derive(Debug, Clone)]
pub struct Sources {
    /// Public profile pages, `{profile_base}/{username}`.
    pub profile_base: String,

    /// Plugin registry query API.
    pub plugins_api: String,

    /// Theme registry query API.
    pub themes_api: String,

    /// Support forum profile pages, `{forums_base}/{username}`.
    pub forums_base: String,

    /// bbPress forum profile pages, `{bbpress_base}/{username}/`.
    pub bbpress_base: String,

    /// BuddyPress member pages, `{buddypress_base}/{username}/forums/`.
    pub buddypress_base: String,

    /// Code-repository changeset search page.
    pub trac_search: String,

    /// Wiki user-contribution API endpoint.
    pub codex_api: String,

    /// Versioned contributor-credits API endpoint.
    pub credits_api: String,

    /// Q&A site user search API endpoint.
    pub stack_exchange_api: String,

    /// Video directory speaker pages, `{tv_base}/{slug}/`.
    pub tv_base: String,

    /// The currently running core version; the credits lookup steps from
    /// [`OLDEST_CREDITED_RELEASE`] up to this in 0.1 increments.
    pub current_version: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            profile_base: "https://profiles.wordpress.org".to_owned(),
            plugins_api: "https://api.wordpress.org/plugins/info/1.1".to_owned(),
            themes_api: "https://api.wordpress.org/themes/info/1.1".to_owned(),
            forums_base: "https://wordpress.org/support/profile".to_owned(),
            bbpress_base: "https://bbpress.org/forums/profile".to_owned(),
            buddypress_base: "https://buddypress.org/members".to_owned(),
            trac_search: "https://core.trac.wordpress.org/search".to_owned(),
            codex_api: "https://codex.wordpress.org/api.php".to_owned(),
            credits_api: "https://api.wordpress.org/core/credits/1.1".to_owned(),
            stack_exchange_api: "https://api.stackexchange.com/2.2/users".to_owned(),
            tv_base: "https://wordpress.tv/speakers".to_owned(),
            current_version: "6.4".to_owned(),
        }
    }
}

impl Sources {
    /// A configuration where every endpoint points at the given base URL.
    /// Intended for tests running against a mock server.
    #[must_use]
    pub fn for_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            profile_base: format!("{base}/profiles"),
            plugins_api: format!("{base}/plugins-api"),
            themes_api: format!("{base}/themes-api"),
            forums_base: format!("{base}/forums/profile"),
            bbpress_base: format!("{base}/bbpress/profile"),
            buddypress_base: format!("{base}/buddypress/members"),
            trac_search: format!("{base}/trac/search"),
            codex_api: format!("{base}/codex/api.php"),
            credits_api: format!("{base}/credits"),
            stack_exchange_api: format!("{base}/wpse/users"),
            tv_base: format!("{base}/tv/speakers"),
            current_version: "6.4".to_owned(),
        }
    }

    /// The release versions to scan for contribution credits, oldest first.
    ///
    /// Steps in 0.1 increments; `3.9` is followed by `4.0`, mirroring how
    /// core versions are actually numbered.
    #[must_use]
    pub fn credited_releases(&self) -> Vec<String> {
        let start = version_tenths(OLDEST_CREDITED_RELEASE);
        let end = version_tenths(&self.current_version);

        let (Some(start), Some(end)) = (start, end) else {
            return Vec::new();
        };

        (start..=end).map(|t| format!("{}.{}", t / 10, t % 10)).collect()
    }
}

/// Parse a `major.minor` version string into total tenths (`"4.2"` → 42).
fn version_tenths(version: &str) -> Option<u32> {
    let (major, minor) = version.split_once('.')?;
    let major: u32 = major.parse().ok()?;
    let minor: u32 = minor.parse().ok()?;
    Some(major * 10 + minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credited_releases_step_in_tenths() {
        let sources = Sources {
            current_version: "4.1".to_owned(),
            ..Sources::default()
        };

        let releases = sources.credited_releases();
        assert_eq!(releases.first().map(String::as_str), Some("3.2"));
        assert_eq!(releases.last().map(String::as_str), Some("4.1"));

        // 3.9 is followed by 4.0, not 3.10.
        let pos = releases.iter().position(|v| v == "3.9").unwrap();
        assert_eq!(releases[pos + 1], "4.0");
        assert_eq!(releases.len(), 10);
    }

    #[test]
    fn credited_releases_empty_on_garbage_version() {
        let sources = Sources {
            current_version: "not-a-version".to_owned(),
            ..Sources::default()
        };
        assert!(sources.credited_releases().is_empty());
    }

    #[test]
    fn for_base_rewrites_every_endpoint() {
        let sources = Sources::for_base("http://127.0.0.1:9999/");
        assert_eq!(sources.profile_base, "http://127.0.0.1:9999/profiles");
        assert_eq!(sources.tv_base, "http://127.0.0.1:9999/tv/speakers");
    }
}
