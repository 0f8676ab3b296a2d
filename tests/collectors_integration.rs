//! End-to-end collector tests against a mock source site.

use std::sync::Arc;
use std::time::Duration;
use talent_rank::cache::CacheState;
use talent_rank::collectors::buddypress::BuddyPressData;
use talent_rank::collectors::gravatar::GravatarData;
use talent_rank::collectors::profile::ProfileData;
use talent_rank::collectors::wordpress_tv::VideoData;
use talent_rank::collectors::{Collectors, NoScheduler, ReadContext, Source};
use talent_rank::config::Sources;
use talent_rank::model::{Talent, TalentKind};
use talent_rank::store::{MemoryStore, Store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(server: &MockServer) -> (Arc<MemoryStore>, Collectors, Talent) {
    let store = Arc::new(MemoryStore::new());
    let talent = store.create_talent("johndoe", "John Doe", TalentKind::Person).unwrap();
    let collectors = Collectors::new(store.clone(), Sources::for_base(&server.uri())).unwrap();
    (store, collectors, talent)
}

const PROFILE_PAGE: &str = r#"
    <html><body>
        <h2 class="fn">John Doe</h2>
        <li id="user-company">Acme Corp</li>
        <div id="meta-status-badge-container">
            <a href="/profiles/johndoe"><img src="https://example.com/avatar/abc?s=96" /></a>
        </div>
        <ul id="user-badges"><li><div title="Core Team"></div></li></ul>
        <div class="item-meta-about">Open source person.</div>
    </body></html>"#;

#[tokio::test]
async fn profile_refresh_caches_data_and_updates_identity() {
    let server = MockServer::start().await;
    let (store, collectors, talent) = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/profiles/johndoe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    collectors.refresh(Source::Profile, &talent, false).await.unwrap();

    let cached: CacheState<ProfileData> = collectors.cache().get(talent.id, Source::Profile.key());
    match cached {
        CacheState::Fresh(data) => {
            assert_eq!(data.name, "John Doe");
            assert_eq!(data.badges, vec!["Core Team"]);
        }
        other => panic!("expected a fresh profile, got {other:?}"),
    }

    let updated = store.talent(talent.id).unwrap();
    assert_eq!(updated.job_title.as_deref(), Some("Acme Corp"));
    assert_eq!(updated.content, "Open source person.");
    assert_eq!(
        store.get_meta(talent.id, "_avatar"),
        Some(serde_json::Value::String("https://example.com/avatar/abc".to_owned()))
    );
}

#[tokio::test]
async fn cached_only_reads_never_touch_the_network() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    let data = collectors.profile().get(&talent, ReadContext::cached_only(), &NoScheduler);

    assert_eq!(data, ProfileData::default());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fresh_cache_short_circuits_refresh_unless_forced() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/profiles/johndoe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PROFILE_PAGE))
        .expect(2)
        .mount(&server)
        .await;

    collectors.refresh(Source::Profile, &talent, false).await.unwrap();
    collectors.refresh(Source::Profile, &talent, false).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    collectors.refresh(Source::Profile, &talent, true).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn retrieval_failure_leaves_the_cache_untouched() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    let previous = ProfileData {
        name: "John Doe".to_owned(),
        ..ProfileData::default()
    };
    collectors
        .cache()
        .put(talent.id, Source::Profile.key(), &previous, Duration::from_secs(1))
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/profiles/johndoe"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(collectors.refresh(Source::Profile, &talent, true).await.is_err());

    let cached: CacheState<ProfileData> = collectors.cache().get(talent.id, Source::Profile.key());
    assert_eq!(cached.into_latest(), Some(previous));
}

fn video_page(titles: &[&str], older: Option<&str>) -> String {
    let items: String = titles
        .iter()
        .map(|title| {
            format!(
                r#"<li><div class="video-description">
                    <h4><a href="https://tv.example/{title}/">{title}</a></h4>
                    <div class="video-excerpt"><p>June 14, 2014 — A talk.</p></div>
                </div></li>"#
            )
        })
        .collect();

    let nav = older.map_or(String::new(), |href| format!(r#"<div class="nav-previous"><a href="{href}">Older</a></div>"#));

    format!("<html><body><ul class=\"video-list\">{items}</ul>{nav}</body></html>")
}

#[tokio::test]
async fn video_pagination_concatenates_pages_in_order() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    // Speaker pages are addressed by display name, not login.
    Mock::given(method("GET"))
        .and(path("/tv/speakers/john-doe/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(video_page(&["talk-a", "talk-b"], Some("/tv/speakers/john-doe/page/2/"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/speakers/john-doe/page/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(video_page(&["talk-c"], Some("/tv/speakers/john-doe/page/3/"))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tv/speakers/john-doe/page/3/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(video_page(&["talk-d"], None)))
        .mount(&server)
        .await;

    collectors.refresh(Source::WordPressTv, &talent, false).await.unwrap();

    let cached: CacheState<VideoData> = collectors.cache().get(talent.id, Source::WordPressTv.key());
    let data = cached.into_latest().unwrap();

    assert_eq!(data.total, 4);
    let titles: Vec<&str> = data.videos.iter().map(|v| v.title.as_str()).collect();
    assert_eq!(titles, vec!["talk-a", "talk-b", "talk-c", "talk-d"]);
}

#[tokio::test]
async fn refresh_all_keeps_going_past_failing_sources() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    // Only the profile endpoint exists; every other source 404s. The page
    // carries no avatar, so the Gravatar lookup stays a local no-op.
    Mock::given(method("GET"))
        .and(path("/profiles/johndoe"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<html><body><h2 class="fn">John Doe</h2></body></html>"#))
        .mount(&server)
        .await;

    let results = collectors.refresh_all(&talent, false).await;
    assert_eq!(results.len(), 12);

    let profile_result = results.iter().find(|(source, _)| *source == Source::Profile).unwrap();
    assert!(profile_result.1.is_ok());
    assert!(results.iter().filter(|(_, result)| result.is_err()).count() >= 9);
}

#[tokio::test]
async fn gravatar_refresh_follows_the_seeded_avatar() {
    let server = MockServer::start().await;
    let (store, collectors, talent) = setup(&server).await;

    // No avatar known yet: the refresh caches the empty sentinel without
    // touching the network.
    collectors.refresh(Source::Gravatar, &talent, true).await.unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());

    store
        .put_meta(
            talent.id,
            "_avatar",
            serde_json::Value::String(format!("{}/avatar/abc123", server.uri())),
        )
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/abc123.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"entry": [{"accounts": [{"shortname": "twitter", "username": "johnd"}]}]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    collectors.refresh(Source::Gravatar, &talent, true).await.unwrap();

    let cached: CacheState<GravatarData> = collectors.cache().get(talent.id, Source::Gravatar.key());
    assert_eq!(cached.into_latest().unwrap().twitter, "johnd");
}

#[tokio::test]
async fn buddypress_refresh_reads_both_pagination_totals() {
    let server = MockServer::start().await;
    let (_store, collectors, talent) = setup(&server).await;

    Mock::given(method("GET"))
        .and(path("/buddypress/members/johndoe/forums/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="bbp-pagination-count">Viewing 25 topics - 1 through 25 (of 120 total)</div>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/buddypress/members/johndoe/forums/replies/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="bbp-pagination-count">Viewing 25 replies - 1 through 25 (of 1,430 total)</div>"#,
        ))
        .mount(&server)
        .await;

    collectors.refresh(Source::BuddyPress, &talent, true).await.unwrap();

    let cached: CacheState<BuddyPressData> = collectors.cache().get(talent.id, Source::BuddyPress.key());
    assert_eq!(cached.into_latest(), Some(BuddyPressData { topics: 120, replies: 1430 }));
}
