use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tubedl::error::{Error, Result};
use tubedl::fetch::PageFetcher;
use tubedl::reference::VideoId;
use tubedl::{Resolver, StreamOption};

/// Serves canned watch pages and records which ids were requested.
#[derive(Default)]
struct CannedPages {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl CannedPages {
    fn with(id: &str, markup: String) -> Self {
        let mut pages = CannedPages::default();
        pages.pages.insert(id.to_string(), markup);
        pages
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl PageFetcher for CannedPages {
    async fn fetch_page(&self, id: &VideoId) -> Result<String> {
        self.requested.lock().unwrap().push(id.to_string());
        self.pages
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| Error::FetchFailed(format!("404 for {}", id)))
    }

    fn host(&self) -> &str {
        "www.youtube.com"
    }
}

fn watch_page(player_response: Value) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><script src=\"/s/player/9a1b2c3d/player_ias.vflset/en_US/base.js\"></script></head>",
            "<body><script nonce=\"abc\">var ytInitialPlayerResponse = {};var meta = {{}};</script>\n",
            "<script>var ytInitialData = {{\"contents\":{{}}}};</script></body></html>"
        ),
        player_response
    )
}

fn sample_response() -> Value {
    json!({
        "videoDetails": { "videoId": "dQw4w9WgXcQ", "title": "Never Gonna Give You Up: Official Video?" },
        "streamingData": {
            "formats": [
                { "itag": 18, "url": "https://rr1.test/videoplayback?itag=18\\u0026mime=video%2Fmp4" },
                { "itag": 22, "url": "https://rr1.test/videoplayback?itag=22\\u0026mime=video%2Fmp4" }
            ],
            "adaptiveFormats": [
                { "itag": 137, "url": "https://rr1.test/videoplayback?itag=137" },
                { "itag": 248, "signatureCipher": "s=ABC123&sp=sig&url=https%3A%2F%2Frr1.test%2Fvideoplayback%3Fitag%3D248" },
                { "itag": 299, "type": "FORMAT_STREAM_TYPE_OTF", "url": "https://rr1.test/sq/0" },
                { "itag": 140, "url": "https://rr1.test/videoplayback?itag=140" },
                { "itag": 251, "url": "https://rr1.test/videoplayback?itag=251" },
                { "itag": 600, "url": "https://rr1.test/videoplayback?itag=600" },
                { "itag": 141 }
            ]
        }
    })
}

#[tokio::test]
async fn resolves_a_watch_url_into_options() {
    let fetcher = CannedPages::with("dQw4w9WgXcQ", watch_page(sample_response()));
    let resolver = Resolver::new(fetcher);

    let bundle = resolver
        .resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s")
        .await
        .unwrap();

    assert_eq!(resolver.fetcher().requested(), vec!["dQw4w9WgXcQ"]);
    assert_eq!(bundle.title, "Never Gonna Give You Up: Official Video?");
    assert_eq!(bundle.stem, "Never Gonna Give You Up Official Video");
    assert_eq!(
        bundle.player_script.as_deref(),
        Some("https://www.youtube.com/s/player/9a1b2c3d/player_ias.vflset/en_US/base.js")
    );

    let keys: Vec<String> = bundle.options.iter().map(StreamOption::key).collect();
    assert_eq!(
        keys,
        vec!["1080p-mp4", "1080p-webm", "720p-mp4", "360p-mp4"]
    );

    match bundle.find("720p").unwrap() {
        StreamOption::Muxed(stream) => {
            assert_eq!(stream.itag, 22);
            assert_eq!(stream.url, "https://rr1.test/videoplayback?itag=22&mime=video%2Fmp4");
        }
        other => panic!("unexpected option {other:?}"),
    }
    assert_eq!(
        bundle.filename(bundle.find("720p").unwrap()),
        "Never Gonna Give You Up Official Video_720p.mp4"
    );
}

#[tokio::test]
async fn ciphered_streams_are_flagged_not_fetched() {
    let fetcher = CannedPages::with("dQw4w9WgXcQ", watch_page(sample_response()));
    let bundle = Resolver::new(fetcher).resolve("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

    let webm = bundle.find("1080p-webm").unwrap();
    assert!(webm.needs_descrambling());
    let video = webm.primary();
    assert_eq!(video.itag, 248);
    assert!(video.cipher_resolution);
    assert_eq!(video.url, "https://rr1.test/videoplayback?itag=248");
    assert_eq!(video.signature.as_deref(), Some("ABC123"));

    let mp4 = bundle.find("1080p-mp4").unwrap();
    assert!(!mp4.needs_descrambling());
}

#[tokio::test]
async fn skipped_entries_do_not_appear() {
    let fetcher = CannedPages::with("dQw4w9WgXcQ", watch_page(sample_response()));
    let bundle = Resolver::new(fetcher).resolve("dQw4w9WgXcQ").await.unwrap();

    let itags: Vec<u32> = bundle
        .options
        .iter()
        .flat_map(|option| option.streams())
        .map(|stream| stream.itag)
        .collect();
    // On-the-fly, unknown and location-less entries.
    for skipped in [299, 600, 141] {
        assert!(!itags.contains(&skipped), "{skipped} should be skipped");
    }
}

#[tokio::test]
async fn invalid_reference_never_fetches() {
    let resolver = Resolver::new(CannedPages::default());

    let err = resolver.resolve("not a url").await.unwrap_err();
    assert!(matches!(err, Error::InvalidReference(_)));
    assert!(resolver.fetcher().requested().is_empty());
}

#[tokio::test]
async fn fetch_failures_are_surfaced() {
    let resolver = Resolver::new(CannedPages::default());

    let err = resolver.resolve("dQw4w9WgXcQ").await.unwrap_err();
    assert!(matches!(err, Error::FetchFailed(_)));
    assert_eq!(resolver.fetcher().requested(), vec!["dQw4w9WgXcQ"]);
}

#[tokio::test]
async fn changed_page_layout_is_reported() {
    let markup = "<html><body><script>window.player = {};</script></body></html>".to_string();
    let resolver = Resolver::new(CannedPages::with("abc", markup));

    let err = resolver.resolve("abc").await.unwrap_err();
    assert!(matches!(err, Error::ManifestNotFound(_)));
}

#[tokio::test]
async fn nothing_resolvable_is_reported() {
    let response = json!({
        "videoDetails": { "title": "Live soon" },
        "streamingData": {
            "formats": [],
            "adaptiveFormats": [
                { "itag": 137, "type": "FORMAT_STREAM_TYPE_OTF", "url": "https://rr1.test/sq/0" },
                { "itag": 9001, "url": "https://rr1.test/9001" }
            ]
        }
    });
    let resolver = Resolver::new(CannedPages::with("abc", watch_page(response)));

    let err = resolver.resolve("abc").await.unwrap_err();
    assert!(err.is_resolution_error());
    assert!(matches!(err, Error::NoResolvableFormats(id) if id == "abc"));
}

#[tokio::test]
async fn independent_calls_run_concurrently() {
    let mut fetcher = CannedPages::with("first", watch_page(sample_response()));
    fetcher
        .pages
        .insert("second".to_string(), watch_page(sample_response()));
    let resolver = Resolver::new(fetcher);

    let (first, second) = tokio::join!(resolver.resolve("first"), resolver.resolve("second"));
    assert_eq!(first.unwrap(), second.unwrap());

    let mut requested = resolver.fetcher().requested();
    requested.sort();
    assert_eq!(requested, vec!["first", "second"]);
}
