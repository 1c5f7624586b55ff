// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

#![allow(dead_code)]

use crawl_fanout::domain::models::crawl_job::CrawlJob;
use crawl_fanout::engines::reqwest_engine::ReqwestEngine;
use crawl_fanout::engines::traits::PageFetcher;
use crawl_fanout::infrastructure::repositories::in_memory_page_repo::InMemoryCrawlPageRepository;
use crawl_fanout::infrastructure::storage::InMemoryStorage;
use crawl_fanout::queue::memory::InMemoryQueue;
use crawl_fanout::workers::CrawlWorker;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOPIC: &str = "crawler-get";
pub const GROUP: &str = "crawler-worker-group";

pub type MemoryWorker = CrawlWorker<InMemoryStorage, InMemoryCrawlPageRepository, InMemoryQueue>;

/// 测试用的内存依赖集合
pub struct TestHarness {
    pub storage: Arc<InMemoryStorage>,
    pub pages: Arc<InMemoryCrawlPageRepository>,
    pub queue: Arc<InMemoryQueue>,
}

impl TestHarness {
    pub fn new(partitions: usize) -> Self {
        Self {
            storage: Arc::new(InMemoryStorage::new()),
            pages: Arc::new(InMemoryCrawlPageRepository::new()),
            queue: Arc::new(InMemoryQueue::new(partitions)),
        }
    }

    pub fn worker(&self) -> MemoryWorker {
        CrawlWorker::new(
            self.storage.clone(),
            self.pages.clone(),
            self.queue.clone(),
            fetcher(),
            TOPIC,
        )
    }

    /// 已发布到作业主题的全部作业
    pub fn published_jobs(&self) -> Vec<CrawlJob> {
        self.queue
            .published(TOPIC)
            .iter()
            .map(|payload| CrawlJob::decode(payload).expect("published payload is a job"))
            .collect()
    }
}

pub fn fetcher() -> Arc<dyn PageFetcher> {
    Arc::new(ReqwestEngine::new(Duration::from_secs(5)).expect("client builds"))
}

/// 构造包含标题和链接的HTML页面
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, anchors
    )
}

pub async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// 轮询直到条件成立，超时则返回 false
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
