// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::crawl_request::CrawlRequestDto;
use crate::domain::models::crawl_job::CrawlJob;
use crate::queue::job_queue::{MessageQueue, QueueError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Failed to enqueue crawl job: {0}")]
    Queue(#[from] QueueError),
}

/// 提交爬取用例
///
/// 校验请求、生成根作业并同步发布到作业主题
pub struct SubmitCrawlUseCase {
    queue: Arc<dyn MessageQueue>,
    topic: String,
}

impl SubmitCrawlUseCase {
    pub fn new(queue: Arc<dyn MessageQueue>, topic: impl Into<String>) -> Self {
        Self {
            queue,
            topic: topic.into(),
        }
    }

    /// 提交根作业
    ///
    /// # 参数
    ///
    /// * `dto` - 爬取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlJob)` - broker 已确认的根作业
    /// * `Err(SubmitError)` - 校验失败或发布失败
    #[instrument(skip(self, dto), fields(url = %dto.url, depth = dto.depth))]
    pub async fn submit(&self, dto: CrawlRequestDto) -> Result<CrawlJob, SubmitError> {
        dto.validate()
            .map_err(|e| SubmitError::ValidationError(e.to_string()))?;

        let job = CrawlJob::root(dto.url, dto.depth, dto.selectors);
        let (partition, offset) = self.queue.publish_job(&self.topic, &job).await?;

        info!(job_id = %job.id, partition, offset, "Root crawl job published");
        Ok(job)
    }
}
