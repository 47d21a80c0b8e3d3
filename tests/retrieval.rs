//! Listing and download flows end to end against a mock API.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{blocking, client, link, listing_page, products_url};
use dewey::{
    DATE_PARTITION_AFTER, DATE_PARTITION_BEFORE, Downloader, Error, FileRecord, OutputFormat,
    RequestParams, Reporter, list_files,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn mount_metadata(server: &MockServer, product: &str, meta: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v3/products/{product}/files/metadata")))
        .respond_with(ResponseTemplate::new(200).set_body_json(meta))
        .mount(server)
        .await;
}

/// Mounts `pages` as the listing of `product`; page 1 is served without a
/// `page` parameter, later pages by number. Each page must be hit exactly once.
async fn mount_listing(server: &MockServer, product: &str, pages: Vec<Vec<Value>>) {
    let total = pages.len() as u64;
    for (i, links) in pages.into_iter().enumerate() {
        let number = i as u64 + 1;
        let mock = Mock::given(method("GET")).and(path(format!("/v3/products/{product}/files")));
        let mock = if number == 1 {
            mock.and(query_param_is_missing("page"))
        } else {
            mock.and(query_param("page", number.to_string()))
        };
        mock.respond_with(
            ResponseTemplate::new(200).set_body_json(listing_page(number, total, links)),
        )
        .expect(1)
        .mount(server)
        .await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn n_page_listing_issues_n_requests_in_order() {
    let server = MockServer::start().await;
    mount_metadata(&server, "p", json!({"partition_type": "NON_PARTITIONED"})).await;

    let pages: Vec<Vec<Value>> = (0..4)
        .map(|p| {
            (0..p + 1)
                .map(|i| link(&format!("https://files.test/{p}/{i}.csv"), i, ""))
                .collect()
        })
        .collect();
    let expected: Vec<String> = (0..4u64)
        .flat_map(|p| (0..p + 1).map(move |i| format!("https://files.test/{p}/{i}.csv")))
        .collect();
    mount_listing(&server, "p", pages).await;

    let base = products_url(&server);
    let (urls, fetched) = blocking(move || {
        let c = client(&base, Duration::ZERO);
        let mut listing = list_files(&c, "p", &RequestParams::new()).expect("metadata");
        let urls: Vec<String> = listing
            .by_ref()
            .map(|r| r.expect("listing page").url)
            .collect();
        (urls, listing.pages_fetched())
    })
    .await;

    assert_eq!(fetched, 4);
    assert_eq!(urls.len(), 1 + 2 + 3 + 4);
    assert_eq!(urls, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn delay_spaces_listing_requests() {
    let server = MockServer::start().await;
    mount_metadata(&server, "slow", json!({})).await;

    let seen: Arc<Mutex<Vec<Instant>>> = Arc::default();
    for number in 1..=3u64 {
        let seen = Arc::clone(&seen);
        let mock = Mock::given(method("GET")).and(path("/v3/products/slow/files"));
        let mock = if number == 1 {
            mock.and(query_param_is_missing("page"))
        } else {
            mock.and(query_param("page", number.to_string()))
        };
        mock.respond_with(move |_: &Request| {
            seen.lock().unwrap().push(Instant::now());
            ResponseTemplate::new(200).set_body_json(listing_page(
                number,
                3,
                vec![link(&format!("https://files.test/{number}.csv"), 1, "")],
            ))
        })
        .expect(1)
        .mount(&server)
        .await;
    }

    let delay = Duration::from_millis(150);
    let base = products_url(&server);
    let count = blocking(move || {
        let c = client(&base, delay);
        list_files(&c, "slow", &RequestParams::new())
            .expect("metadata")
            .map(|r| r.expect("page"))
            .count()
    })
    .await;

    assert_eq!(count, 3);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[2].duration_since(seen[0]) >= delay * 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_downloads_partitioned_layout_and_reports_in_order() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_metadata(&server, "978cz-306w", json!({"partition_type": "CATEGORICAL"})).await;
    mount_listing(
        &server,
        "978cz-306w",
        vec![vec![
            link(&format!("{uri}/x/a.csv"), 100, "p1"),
            link(&format!("{uri}/x/b.csv"), 200, ""),
        ]],
    )
    .await;
    for (name, size) in [("a.csv", 100usize), ("b.csv", 200)] {
        Mock::given(method("GET"))
            .and(path(format!("/x/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; size]))
            .mount(&server)
            .await;
    }

    let tmp = TempDir::new().expect("failed to create temp dir");
    let dest = tmp.path().join("out");
    let base = products_url(&server);
    let dest_for_run = dest.clone();
    let (summary, report) = blocking(move || {
        let c = client(&base, Duration::ZERO);
        let listing = list_files(&c, "978cz-306w", &RequestParams::new()).expect("metadata");
        let mut reporter = Reporter::new(Vec::new(), OutputFormat::JsonLines);
        let summary = Downloader::new(&dest_for_run)
            .download_all(&c, listing, |r| reporter.write(r))
            .expect("download should succeed");
        (summary, reporter.finish().expect("report"))
    })
    .await;

    assert_eq!(summary.files, 2);
    assert_eq!(summary.bytes, 300);
    assert_eq!(std::fs::read(dest.join("p1").join("a.csv")).unwrap().len(), 100);
    assert_eq!(std::fs::read(dest.join("b.csv")).unwrap().len(), 200);

    let reported: Vec<FileRecord> = String::from_utf8(report)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        reported,
        vec![
            FileRecord::new(format!("{uri}/x/a.csv"), 100, "p1"),
            FileRecord::new(format!("{uri}/x/b.csv"), 200, ""),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_product_fails_before_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/products/nope/files/metadata"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "unknown product"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/products/nope/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(1, 1, vec![])))
        .expect(0)
        .mount(&server)
        .await;

    let base = products_url(&server);
    let err = blocking(move || {
        let c = client(&base, Duration::ZERO);
        list_files(&c, "nope", &RequestParams::new()).err()
    })
    .await
    .expect("404 should fail");

    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.to_string().contains("unknown product"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_page_keeps_earlier_downloads() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_metadata(&server, "p", json!({})).await;
    Mock::given(method("GET"))
        .and(path("/v3/products/p/files"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(
            1,
            3,
            vec![link(&format!("{uri}/x/first.csv"), 3, "")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/products/p/files"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/products/p/files"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(3, 3, vec![])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x/first.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("failed to create temp dir");
    let dest = tmp.path().to_path_buf();
    let base = products_url(&server);
    let (err, reported) = blocking(move || {
        let c = client(&base, Duration::ZERO);
        let listing = list_files(&c, "p", &RequestParams::new()).expect("metadata");
        let mut reported = 0;
        let err = Downloader::new(&dest)
            .download_all(&c, listing, |_| {
                reported += 1;
                Ok(())
            })
            .expect_err("page 2 fails");
        (err, reported)
    })
    .await;

    assert!(matches!(err, Error::Api { status: 502, .. }));
    assert_eq!(reported, 1);
    assert_eq!(std::fs::read(tmp.path().join("first.csv")).unwrap(), b"abc");
}

#[tokio::test(flavor = "multi_thread")]
async fn date_partitioned_product_requests_full_range_by_default() {
    let server = MockServer::start().await;
    mount_metadata(&server, "daily", json!({"partition_type": "DATE"})).await;
    Mock::given(method("GET"))
        .and(path("/v3/products/daily/files"))
        .and(query_param("partition_key_after", DATE_PARTITION_AFTER))
        .and(query_param("partition_key_before", DATE_PARTITION_BEFORE))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(
            1,
            1,
            vec![link("https://files.test/d.csv", 1, "2024-05-01")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let base = products_url(&server);
    let records = blocking(move || {
        let c = client(&base, Duration::ZERO);
        list_files(&c, "daily", &RequestParams::new())
            .expect("metadata")
            .collect::<Result<Vec<_>, _>>()
    })
    .await
    .expect("listing");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].partition(), Some("2024-05-01"));
}
