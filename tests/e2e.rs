//! End-to-end tests for the HLS rewriting proxy.
//!
//! Starts a real Axum server on a random port with a wiremock upstream
//! origin, then walks the same path a media player would: fetch the
//! rewritten playlist, follow its rewritten URLs back through the proxy,
//! and receive the upstream bytes.
//!
//! The listener is bound first to discover the port so `base_url` can point
//! at the server itself, making every rewritten URL directly followable.

use hls_relay::config::Config;
use hls_relay::server::build_router;
use std::net::SocketAddr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Spin up the relay on a random port, dev mode so loopback upstreams pass
/// the SSRF guard.
async fn start_relay() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: 0,
        base_url: format!("http://{}", addr),
        is_dev: true,
    };

    let app = build_router(config);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Upstream origin with a media playlist, a key, and one segment.
async fn start_origin() -> MockServer {
    let server = MockServer::start().await;

    let playlist = concat!(
        "#EXTM3U\n",
        "#EXT-X-VERSION:3\n",
        "#EXT-X-TARGETDURATION:10\n",
        "#EXT-X-KEY:METHOD=AES-128,URI=\"enc.key\"\n",
        "#EXTINF:10.0,\n",
        "seg0.ts\n",
        "#EXT-X-ENDLIST\n",
    );

    Mock::given(method("GET"))
        .and(path("/live/playlist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(playlist))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/live/seg0.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0x47u8; 188])
                .insert_header("content-type", "video/MP2T"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/live/enc.key"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xAAu8; 16]))
        .mount(&server)
        .await;

    server
}

/// Extract the rewritten URI from a key/map directive line.
fn quoted_uri(line: &str) -> &str {
    let start = line.find("URI=\"").unwrap() + 5;
    let end = line[start..].find('"').unwrap();
    &line[start..start + end]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn player_can_walk_rewritten_playlist_end_to_end() {
    let origin = start_origin().await;
    let relay = start_relay().await;
    let client = reqwest::Client::new();

    // 1. Fetch the rewritten playlist through the proxy
    let resp = client
        .get(format!(
            "http://{relay}/proxy-manifest?url={}/live/playlist.m3u8",
            origin.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    let playlist = resp.text().await.unwrap();

    // Directive-only lines survive byte-for-byte, in order
    let lines: Vec<&str> = playlist.split('\n').collect();
    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-VERSION:3");
    assert_eq!(lines[2], "#EXT-X-TARGETDURATION:10");
    assert!(lines[3].starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\""));
    assert_eq!(lines[4], "#EXTINF:10.0,");
    assert_eq!(lines[6], "#EXT-X-ENDLIST");

    // 2. Follow the rewritten segment URL back through the proxy
    let seg_url = lines[5];
    assert!(seg_url.starts_with(&format!("http://{relay}/proxy-segment?")));

    let seg = client.get(seg_url).send().await.unwrap();
    assert_eq!(seg.status(), 200);
    assert_eq!(seg.headers().get("content-type").unwrap(), "video/MP2T");
    assert_eq!(seg.headers().get("content-length").unwrap(), "188");
    let bytes = seg.bytes().await.unwrap();
    assert_eq!(bytes.len(), 188);
    assert!(bytes.iter().all(|&b| b == 0x47));

    // 3. Follow the rewritten key URI, opaque bytes come back verbatim
    let key_url = quoted_uri(lines[3]);
    let key = client.get(key_url).send().await.unwrap();
    assert_eq!(key.status(), 200);
    let key_bytes = key.bytes().await.unwrap();
    assert_eq!(key_bytes.as_ref(), &[0xAAu8; 16]);
}

#[tokio::test]
async fn nested_playlist_routes_back_through_manifest_endpoint() {
    let origin = MockServer::start().await;
    let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/chunklist.m3u8\n";
    let media = "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n#EXT-X-ENDLIST\n";

    Mock::given(method("GET"))
        .and(path("/vod/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(master))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/vod/low/chunklist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(media))
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let client = reqwest::Client::new();

    let text = client
        .get(format!(
            "http://{relay}/proxy-manifest?url={}/vod/master.m3u8",
            origin.uri()
        ))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let nested_url = text
        .split('\n')
        .find(|l| l.contains("/proxy-manifest?"))
        .expect("variant line should route to the manifest endpoint");

    // Recursing into the nested playlist rewrites its segments too
    let nested = client.get(nested_url).send().await.unwrap();
    assert_eq!(nested.status(), 200);
    let nested_text = nested.text().await.unwrap();
    assert!(nested_text.contains("/proxy-segment?"));
    assert!(!nested_text.contains("\nseg0.ts"));
}

#[tokio::test]
async fn upstream_failure_status_is_forwarded() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "http://{relay}/proxy-manifest?url={}/gone.m3u8",
            origin.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn segment_without_upstream_content_type_defaults_to_mp2t() {
    let origin = MockServer::start().await;
    // No body and no content-type header at all from the upstream
    Mock::given(method("GET"))
        .and(path("/live/seg1.ts"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "http://{relay}/proxy-segment?base={base}/live/&file={base}/live/seg1.ts",
            base = origin.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/MP2T");
    assert_eq!(resp.headers().get("content-length").unwrap(), "0");
}

#[tokio::test]
async fn relative_file_resolves_against_base() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live/seg2.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 4]))
        .expect(1)
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!(
            "http://{relay}/proxy-segment?base={}/live/&file=seg2.ts",
            origin.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), 4);
}
