// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{fetcher, html_page, mount_page, mount_status, TestHarness, TOPIC};
use crawl_fanout::domain::models::crawl_job::CrawlJob;
use crawl_fanout::domain::models::crawl_page::PageStatus;
use crawl_fanout::domain::repositories::crawl_page_repository::CrawlPageRepository;
use crawl_fanout::infrastructure::storage::LocalStorage;
use crawl_fanout::workers::{CrawlWorker, CrawlerPolicy, ProcessOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_depth_zero_persists_page_without_children() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b"])).await;

    let harness = TestHarness::new(2);
    let job = CrawlJob::root(format!("{}/", server.uri()), 0, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            page_persisted: true,
            children_published: 0,
            children_failed: 0,
        }
    );
    assert!(harness.published_jobs().is_empty());

    let page = harness.pages.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(page.title, "Home");
    assert_eq!(page.depth_level, 0);
    assert_eq!(page.status, PageStatus::Completed);
    assert!(harness.storage.get(&job.key()).is_some());
}

#[tokio::test]
async fn test_children_carry_decremented_depth_and_parent() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page("Home", &["/a", "/b", "/a", "mailto:someone@example.com"]),
    )
    .await;

    let harness = TestHarness::new(2);
    let job = CrawlJob::root(format!("{}/", server.uri()), 3, vec!["h1".to_string()]);

    let outcome = harness.worker().process(&job).await;
    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            page_persisted: true,
            children_published: 2,
            children_failed: 0,
        }
    );

    let children = harness.published_jobs();
    assert_eq!(children.len(), 2);

    let urls: HashSet<String> = children.iter().map(|c| c.url.clone()).collect();
    assert!(urls.contains(&format!("{}/a", server.uri())));
    assert!(urls.contains(&format!("{}/b", server.uri())));

    for child in &children {
        assert_eq!(child.depth, 2);
        assert_eq!(child.parent_id, Some(job.id));
        assert_eq!(child.selectors, vec!["h1".to_string()]);
        assert_ne!(child.id, job.id);
    }
}

#[tokio::test]
async fn test_reprocessing_keeps_one_page_per_id() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let harness = TestHarness::new(1);
    let worker = harness.worker();
    let job = CrawlJob::root(format!("{}/", server.uri()), 0, vec![]);

    worker.process(&job).await;
    worker.process(&job).await;

    assert_eq!(harness.pages.len(), 1);
    assert_eq!(harness.storage.len(), 1);
}

#[tokio::test]
async fn test_not_found_persists_nothing() {
    let server = MockServer::start().await;
    mount_status(&server, "/missing", 404).await;

    let harness = TestHarness::new(1);
    let job = CrawlJob::root(format!("{}/missing", server.uri()), 2, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(outcome, ProcessOutcome::FetchFailed);
    assert!(harness.pages.is_empty());
    assert!(harness.storage.is_empty());
    assert!(harness.published_jobs().is_empty());
}

#[tokio::test]
async fn test_non_http_url_is_rejected() {
    let harness = TestHarness::new(1);
    let job = CrawlJob::root("ftp://example.com/file", 1, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(outcome, ProcessOutcome::Rejected);
    assert!(harness.pages.is_empty());
}

#[tokio::test]
async fn test_child_publish_failures_are_counted() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b", "/c"])).await;

    let harness = TestHarness::new(2);
    harness.queue.set_fail_publish(true);
    let job = CrawlJob::root(format!("{}/", server.uri()), 1, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            page_persisted: true,
            children_published: 0,
            children_failed: 3,
        }
    );
    assert_eq!(harness.pages.len(), 1);
}

#[tokio::test]
async fn test_metadata_failure_still_recurses_by_default() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a"])).await;

    let harness = TestHarness::new(1);
    harness.pages.set_fail_upsert(true);
    let job = CrawlJob::root(format!("{}/", server.uri()), 1, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            page_persisted: false,
            children_published: 1,
            children_failed: 0,
        }
    );
    assert_eq!(harness.storage.len(), 1);
}

#[tokio::test]
async fn test_metadata_failure_blocks_recursion_when_configured() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a"])).await;

    let harness = TestHarness::new(1);
    harness.pages.set_fail_upsert(true);
    let worker = harness.worker().with_policy(CrawlerPolicy {
        recurse_on_metadata_failure: false,
    });
    let job = CrawlJob::root(format!("{}/", server.uri()), 1, vec![]);

    worker.process(&job).await;

    assert!(harness.published_jobs().is_empty());
}

#[tokio::test]
async fn test_local_storage_writes_raw_body() {
    let server = MockServer::start().await;
    let body = html_page("Stored", &[]);
    mount_page(&server, "/", body.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let harness = TestHarness::new(1);
    let worker = CrawlWorker::new(
        Arc::new(LocalStorage::new(dir.path().join("pages"))),
        harness.pages.clone(),
        harness.queue.clone(),
        fetcher(),
        TOPIC,
    );
    let job = CrawlJob::root(format!("{}/", server.uri()), 0, vec![]);

    worker.process(&job).await;

    let expected = dir.path().join("pages").join(format!("{}.html", job.id));
    assert_eq!(std::fs::read_to_string(&expected).unwrap(), body);

    let page = harness.pages.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(page.file_path, expected.to_string_lossy());
}

#[tokio::test]
async fn test_storage_failure_skips_metadata_and_children() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b"])).await;

    let harness = TestHarness::new(2);
    harness.storage.set_fail_save(true);
    let job = CrawlJob::root(format!("{}/", server.uri()), 1, vec![]);

    let outcome = harness.worker().process(&job).await;

    assert_eq!(outcome, ProcessOutcome::StorageFailed);
    assert!(harness.pages.is_empty());
    assert!(harness.queue.published(TOPIC).is_empty());
}

#[tokio::test]
async fn test_latin1_page_served_without_charset_fans_out() {
    let server = MockServer::start().await;
    let mut body = br#"<html><head><meta charset="iso-8859-1"><title>caf"#.to_vec();
    body.push(0xE9);
    body.extend_from_slice(br#"</title></head><body><a href="/x">x</a></body></html>"#);
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let harness = TestHarness::new(1);
    let job = CrawlJob::root(format!("{}/", server.uri()), 1, vec![]);

    harness.worker().process(&job).await;

    let page = harness.pages.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(page.title, "café");
    let children = harness.published_jobs();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].url, format!("{}/x", server.uri()));
}
