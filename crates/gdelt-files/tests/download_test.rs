//! End-to-end behavior of the download path against a mock HTTP server:
//! retry classification, 404 tolerance, the decompression guard, and cache
//! interaction.

use gdelt_files::cache::{CachePolicy, DiskCache};
use gdelt_files::safety::AllowedHosts;
use gdelt_files::{BombReason, Downloader, FetchError, RetryPolicy};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader(server: &MockServer, retries: u32, cache: Option<Arc<DiskCache>>) -> Downloader {
    let uri = url::Url::parse(&server.uri()).unwrap();
    Downloader::new(
        Duration::from_secs(5),
        AllowedHosts::with_extra([uri.host_str().unwrap().to_string()]),
        RetryPolicy::new(retries),
        cache,
    )
    .unwrap()
}

#[tokio::test]
async fn retry_after_is_honored_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slot"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slot"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&server, 5, None);
    let bytes = downloader
        .fetch(&format!("{}/slot", server.uri()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bytes.as_ref(), b"payload");
}

#[tokio::test]
async fn rate_limit_exhaustion_reports_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let downloader = downloader(&server, 2, None);
    let err = downloader
        .fetch(&format!("{}/limited", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { attempts: 2, .. }));
    assert_eq!(err.http_status(), Some(429));
    assert!(err.triggers_fallback());
}

#[tokio::test]
async fn missing_slot_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/absent"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&server, 3, None);
    let result = downloader
        .fetch(&format!("{}/absent", server.uri()))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&server, 5, None);
    let err = downloader
        .fetch(&format!("{}/forbidden", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::BadRequest { status: 403, .. }));
    assert!(!err.triggers_fallback());
}

#[tokio::test]
async fn server_errors_exhaust_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&server, 1, None);
    let err = downloader
        .fetch(&format!("{}/broken", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UpstreamUnavailable { .. }));
    assert!(err.triggers_fallback());
}

#[tokio::test]
async fn decompression_bomb_fails_the_slot() {
    // 64 MB of zeros gzips to well under 1 MB; the ratio cap trips long
    // before the output cap would.
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&vec![0u8; 64 * 1024 * 1024]).unwrap();
    let bomb = encoder.finish().unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bomb"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bomb))
        .mount(&server)
        .await;

    let downloader = downloader(&server, 1, None);
    let err = downloader
        .fetch_artifact(
            &format!("{}/bomb", server.uri()),
            CachePolicy::Ttl(Duration::from_secs(60)),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::DecompressBomb {
            reason: BombReason::Ratio,
            ..
        }
    ));
}

#[tokio::test]
async fn artifacts_are_served_from_cache_on_the_second_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cached.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes({
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(b"slot content").unwrap();
            encoder.finish().unwrap()
        }))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DiskCache::open(dir.path()).await.unwrap());
    let downloader = downloader(&server, 2, Some(cache));
    let url = format!("{}/cached.gz", server.uri());

    let first = downloader
        .fetch_artifact(&url, CachePolicy::Indefinite)
        .await
        .unwrap()
        .unwrap();
    let second = downloader
        .fetch_artifact(&url, CachePolicy::Indefinite)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.as_ref(), b"slot content");
    assert_eq!(first, second);
}
