// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlJob;
use crate::domain::models::crawl_page::CrawlPage;
use crate::domain::repositories::crawl_page_repository::CrawlPageRepository;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::services::crawl_service::LinkDiscoverer;
use crate::domain::services::extraction_service::ExtractionService;
use crate::engines::traits::{FetchError, FetchResponse, PageFetcher};
use crate::infrastructure::metrics;
use crate::queue::job_queue::MessageQueue;
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::url_utils::is_http_url;
use scraper::Html;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// 爬取策略
#[derive(Debug, Clone)]
pub struct CrawlerPolicy {
    /// 页面元数据写入失败时是否仍然发布子作业
    pub recurse_on_metadata_failure: bool,
}

impl Default for CrawlerPolicy {
    fn default() -> Self {
        Self {
            recurse_on_metadata_failure: true,
        }
    }
}

/// 单个作业的处理结果
///
/// 所有失败都已在处理过程中记录日志，结果只用于上报和测试
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// URL 不是 HTTP(S)，未做任何网络请求
    Rejected,
    /// 抓取失败或返回非2xx状态码
    FetchFailed,
    /// 响应声明了无法识别的字符集
    ParseFailed,
    /// 原始内容保存失败
    StorageFailed,
    /// 原始内容已保存
    Completed {
        page_persisted: bool,
        children_published: usize,
        children_failed: usize,
    },
}

impl ProcessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Rejected => "rejected",
            ProcessOutcome::FetchFailed => "fetch_failed",
            ProcessOutcome::ParseFailed => "parse_failed",
            ProcessOutcome::StorageFailed => "storage_failed",
            ProcessOutcome::Completed {
                page_persisted: false,
                ..
            } => "metadata_failed",
            ProcessOutcome::Completed { .. } => "completed",
        }
    }
}

/// 爬取工作器
///
/// 对每个投递的作业执行：校验 → 抓取 → 解析 → 提取 → 保存原始内容 →
/// 写入页面元数据 → 递归发布子作业
pub struct CrawlWorker<S, P, Q>
where
    S: StorageRepository + ?Sized,
    P: CrawlPageRepository + ?Sized,
    Q: MessageQueue + ?Sized,
{
    storage: Arc<S>,
    pages: Arc<P>,
    queue: Arc<Q>,
    fetcher: Arc<dyn PageFetcher>,
    topic: String,
    policy: CrawlerPolicy,
    retry_policy: RetryPolicy,
}

impl<S, P, Q> CrawlWorker<S, P, Q>
where
    S: StorageRepository + ?Sized,
    P: CrawlPageRepository + ?Sized,
    Q: MessageQueue + ?Sized,
{
    /// 创建新的爬取工作器
    ///
    /// # 参数
    ///
    /// * `storage` - 原始内容存储
    /// * `pages` - 页面元数据仓库
    /// * `queue` - 用于发布子作业的消息队列
    /// * `fetcher` - 页面抓取引擎
    /// * `topic` - 子作业发布到的主题
    pub fn new(
        storage: Arc<S>,
        pages: Arc<P>,
        queue: Arc<Q>,
        fetcher: Arc<dyn PageFetcher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            pages,
            queue,
            fetcher,
            topic: topic.into(),
            policy: CrawlerPolicy::default(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CrawlerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// 处理单个作业
    ///
    /// 不会返回错误：抓取、解析和存储失败都会终止本作业并记录日志，
    /// 元数据写入失败和子作业发布失败只记录日志
    #[instrument(skip(self, job), fields(job_id = %job.id, url = %job.url, depth = job.depth))]
    pub async fn process(&self, job: &CrawlJob) -> ProcessOutcome {
        let outcome = self.run_pipeline(job).await;
        metrics::record_job_outcome(outcome.label());
        info!(outcome = outcome.label(), "Job finished");
        outcome
    }

    async fn run_pipeline(&self, job: &CrawlJob) -> ProcessOutcome {
        if !is_http_url(&job.url) {
            warn!("Rejecting job with non-HTTP(S) URL");
            return ProcessOutcome::Rejected;
        }

        let base_url = match Url::parse(job.url.trim()) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Rejecting job with unparseable URL");
                return ProcessOutcome::Rejected;
            }
        };

        let response = match self.fetch_with_retry(base_url.as_str()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Fetch failed, abandoning job");
                return ProcessOutcome::FetchFailed;
            }
        };
        debug!(
            bytes = response.body.len(),
            elapsed_ms = response.response_time_ms,
            "Page fetched"
        );

        let text = match ExtractionService::decode_body(&response.body, response.content_type.as_deref()) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to decode page, abandoning job");
                return ProcessOutcome::ParseFailed;
            }
        };

        // Html is !Send; it must be dropped before the next await
        let (extracted, links) = {
            let document = Html::parse_document(&text);
            let extracted = ExtractionService::extract(&document, &job.selectors);
            let links = if job.depth > 0 {
                LinkDiscoverer::discover_links(&document, &base_url)
            } else {
                Vec::new()
            };
            (extracted, links)
        };

        let location = match self.storage.save(&job.key(), &response.body).await {
            Ok(location) => location,
            Err(e) => {
                error!(error = %e, "Failed to store raw content, abandoning job");
                return ProcessOutcome::StorageFailed;
            }
        };

        let page = CrawlPage::completed(job, extracted.title, location, extracted.parsed_data);
        let page_persisted = match self.pages.upsert(&page).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to persist page metadata");
                false
            }
        };

        if !page_persisted && !self.policy.recurse_on_metadata_failure {
            warn!(
                skipped_links = links.len(),
                "Skipping recursion after metadata failure"
            );
            return ProcessOutcome::Completed {
                page_persisted,
                children_published: 0,
                children_failed: 0,
            };
        }

        let (children_published, children_failed) = self.publish_children(job, links).await;

        ProcessOutcome::Completed {
            page_persisted,
            children_published,
            children_failed,
        }
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let result = self.fetcher.fetch(url).await;
            metrics::record_fetch_duration(start.elapsed());

            match result {
                Err(e) if e.is_retryable() && self.retry_policy.should_retry(attempt) => {
                    attempt += 1;
                    let backoff = self.retry_policy.calculate_backoff(attempt);
                    warn!(attempt, error = %e, ?backoff, "Retrying fetch");
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn publish_children(&self, job: &CrawlJob, links: Vec<String>) -> (usize, usize) {
        if job.depth == 0 || links.is_empty() {
            return (0, 0);
        }

        let mut published = 0;
        let mut failed = 0;

        for link in links {
            let child = CrawlJob::child(job, link);
            match self.queue.publish_job(&self.topic, &child).await {
                Ok((partition, offset)) => {
                    debug!(child_id = %child.id, child_url = %child.url, partition, offset, "Child job published");
                    published += 1;
                }
                Err(e) => {
                    warn!(child_url = %child.url, error = %e, "Failed to publish child job");
                    failed += 1;
                }
            }
        }

        metrics::record_children(published, failed);
        info!(published, failed, "Child jobs dispatched");
        (published, failed)
    }
}
