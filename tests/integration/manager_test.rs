// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    html_page, mount_page, mount_status, wait_until, MemoryWorker, TestHarness, GROUP, TOPIC,
};
use async_trait::async_trait;
use crawl_fanout::application::dto::crawl_request::CrawlRequestDto;
use crawl_fanout::application::use_cases::submit_crawl::SubmitCrawlUseCase;
use crawl_fanout::domain::models::crawl_job::CrawlJob;
use crawl_fanout::domain::repositories::crawl_page_repository::CrawlPageRepository;
use crawl_fanout::engines::traits::{FetchError, FetchResponse, PageFetcher};
use crawl_fanout::queue::job_queue::MessageQueue;
use crawl_fanout::utils::errors::WorkerError;
use crawl_fanout::workers::{CrawlWorker, WorkerManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn start_manager(
    harness: &TestHarness,
    worker: MemoryWorker,
    shutdown: CancellationToken,
) -> JoinHandle<Result<(), WorkerError>> {
    let manager = WorkerManager::new(Arc::new(worker), harness.queue.clone(), TOPIC, GROUP)
        .with_shutdown_grace(Duration::from_secs(5));
    tokio::spawn(async move { manager.run(shutdown).await })
}

#[tokio::test]
async fn test_processed_messages_are_committed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &[])).await;

    let harness = TestHarness::new(1);
    for _ in 0..3 {
        let job = CrawlJob::root(format!("{}/", server.uri()), 0, vec![]);
        harness.queue.publish_job(TOPIC, &job).await.unwrap();
    }

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, harness.worker(), shutdown.clone());

    let queue = harness.queue.clone();
    assert!(wait_until(Duration::from_secs(10), || queue.committed(GROUP, TOPIC, 0) == Some(3)).await);
    assert_eq!(harness.pages.len(), 3);

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_undecodable_message_is_acknowledged() {
    let harness = TestHarness::new(1);
    let (partition, offset) = harness
        .queue
        .publish(TOPIC, "poison", b"definitely not json")
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, harness.worker(), shutdown.clone());

    let queue = harness.queue.clone();
    assert!(
        wait_until(Duration::from_secs(5), || {
            queue.committed(GROUP, TOPIC, partition) == Some(offset + 1)
        })
        .await
    );
    assert!(harness.pages.is_empty());

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_not_found_is_still_acknowledged() {
    let server = MockServer::start().await;
    mount_status(&server, "/missing", 404).await;

    let harness = TestHarness::new(1);
    let job = CrawlJob::root(format!("{}/missing", server.uri()), 2, vec![]);
    harness.queue.publish_job(TOPIC, &job).await.unwrap();

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, harness.worker(), shutdown.clone());

    let queue = harness.queue.clone();
    assert!(wait_until(Duration::from_secs(5), || queue.lag(GROUP, TOPIC) == 0).await);
    assert!(harness.pages.is_empty());
    assert_eq!(harness.queue.published(TOPIC).len(), 1);

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_shutdown_leaves_buffered_messages_unacknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", &[]), "text/html")
                .set_delay(Duration::from_millis(600)),
        )
        .mount(&server)
        .await;

    let harness = TestHarness::new(1);
    for _ in 0..3 {
        let job = CrawlJob::root(format!("{}/slow", server.uri()), 0, vec![]);
        harness.queue.publish_job(TOPIC, &job).await.unwrap();
    }

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, harness.worker(), shutdown.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());

    // The in-flight job finishes inside the grace period, the rest stay pending
    assert_eq!(harness.queue.committed(GROUP, TOPIC, 0), Some(1));
    assert_eq!(harness.queue.lag(GROUP, TOPIC), 2);
    assert_eq!(harness.pages.len(), 1);
}

struct PanickingFetcher;

#[async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
        panic!("fetcher exploded");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

#[tokio::test]
async fn test_panicking_job_stops_the_runtime_without_ack() {
    let harness = TestHarness::new(1);
    let job = CrawlJob::root("https://example.com/", 0, vec![]);
    harness.queue.publish_job(TOPIC, &job).await.unwrap();

    let worker = CrawlWorker::new(
        harness.storage.clone(),
        harness.pages.clone(),
        harness.queue.clone(),
        Arc::new(PanickingFetcher),
        TOPIC,
    );

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, worker, shutdown.clone());

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("runtime exits on its own")
        .unwrap();

    assert!(matches!(
        result,
        Err(WorkerError::PartitionFailed { partition: 0 })
    ));
    assert_eq!(harness.queue.committed(GROUP, TOPIC, 0), None);
}

#[tokio::test]
async fn test_depth_two_crawl_fans_out_to_grandchildren() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Home", &["/a", "/b", "/c", "/a"])).await;
    for section in ["/a", "/b", "/c"] {
        mount_page(&server, section, html_page(section, &["/d", "/e"])).await;
    }
    for leaf in ["/d", "/e"] {
        mount_page(&server, leaf, html_page(leaf, &["/"])).await;
    }

    let harness = TestHarness::new(3);
    let use_case = SubmitCrawlUseCase::new(harness.queue.clone(), TOPIC);
    let root = use_case
        .submit(CrawlRequestDto {
            url: server.uri(),
            depth: 2,
            selectors: vec![],
        })
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, harness.worker(), shutdown.clone());

    let queue = harness.queue.clone();
    let pages = harness.pages.clone();
    assert!(
        wait_until(Duration::from_secs(15), || {
            pages.len() == 10 && queue.lag(GROUP, TOPIC) == 0
        })
        .await
    );

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());

    let jobs = harness.published_jobs();
    assert_eq!(jobs.len(), 10);
    assert_eq!(jobs.iter().filter(|j| j.depth == 2).count(), 1);
    assert_eq!(jobs.iter().filter(|j| j.depth == 1).count(), 3);
    assert_eq!(jobs.iter().filter(|j| j.depth == 0).count(), 6);

    let children: Vec<&CrawlJob> = jobs.iter().filter(|j| j.depth == 1).collect();
    assert!(children.iter().all(|c| c.parent_id == Some(root.id)));
    for child in children {
        let grandchildren = jobs
            .iter()
            .filter(|j| j.parent_id == Some(child.id))
            .count();
        assert_eq!(grandchildren, 2);
    }

    let root_page = harness.pages.find_by_id(root.id).await.unwrap().unwrap();
    assert_eq!(root_page.title, "Home");
    assert_eq!(root_page.depth_level, 2);
}

fn html_response(title: &str) -> FetchResponse {
    FetchResponse {
        status_code: 200,
        body: html_page(title, &[]).into(),
        content_type: Some("text/html; charset=utf-8".to_string()),
        response_time_ms: 1,
    }
}

/// 记录同时进行中的抓取数量
#[derive(Default)]
struct ConcurrencyTrackingFetcher {
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for ConcurrencyTrackingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(html_response("Tracked"))
    }

    fn name(&self) -> &'static str {
        "concurrency-tracking"
    }
}

#[tokio::test]
async fn test_partition_processes_one_job_at_a_time_and_commits_in_order() {
    let harness = TestHarness::new(1);
    for i in 0..5 {
        let job = CrawlJob::root(format!("https://example.com/{}", i), 0, vec![]);
        harness.queue.publish_job(TOPIC, &job).await.unwrap();
    }

    let fetcher = Arc::new(ConcurrencyTrackingFetcher::default());
    let worker = CrawlWorker::new(
        harness.storage.clone(),
        harness.pages.clone(),
        harness.queue.clone(),
        fetcher.clone(),
        TOPIC,
    );

    let queue = harness.queue.clone();
    let sampler = tokio::spawn(async move {
        let mut seen = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            let committed = queue.committed(GROUP, TOPIC, 0);
            seen.push(committed);
            if committed == Some(5) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        seen
    });

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, worker, shutdown.clone());

    let seen = sampler.await.unwrap();
    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());

    assert_eq!(seen.last().copied().flatten(), Some(5));
    assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    assert_eq!(harness.pages.len(), 5);
}

/// 每次抓取都等待测试放行
struct GatedFetcher {
    started: AtomicUsize,
    release: Semaphore,
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
        Ok(html_response("Gated"))
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn test_revoked_partition_finishes_in_flight_job_and_leaves_buffer_unacked() {
    let harness = TestHarness::new(1);
    for i in 0..3 {
        let job = CrawlJob::root(format!("https://example.com/{}", i), 0, vec![]);
        harness.queue.publish_job(TOPIC, &job).await.unwrap();
    }

    let fetcher = Arc::new(GatedFetcher {
        started: AtomicUsize::new(0),
        release: Semaphore::new(0),
    });
    let worker = CrawlWorker::new(
        harness.storage.clone(),
        harness.pages.clone(),
        harness.queue.clone(),
        fetcher.clone(),
        TOPIC,
    );

    let shutdown = CancellationToken::new();
    let handle = start_manager(&harness, worker, shutdown.clone());

    let gate = fetcher.clone();
    assert!(wait_until(Duration::from_secs(5), || gate.started.load(Ordering::SeqCst) == 1).await);

    harness.queue.revoke(GROUP, TOPIC, 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    fetcher.release.add_permits(10);

    let pages = harness.pages.clone();
    assert!(wait_until(Duration::from_secs(5), || pages.len() == 1).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // the in-flight job completed but its commit was refused, the buffered jobs never ran
    assert_eq!(fetcher.started.load(Ordering::SeqCst), 1);
    assert_eq!(harness.pages.len(), 1);
    assert_eq!(harness.queue.committed(GROUP, TOPIC, 0), None);
    assert_eq!(harness.queue.lag(GROUP, TOPIC), 3);

    shutdown.cancel();
    assert!(handle.await.unwrap().is_ok());
}
