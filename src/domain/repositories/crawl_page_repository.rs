// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::crawl_page::CrawlPage;
pub use crate::utils::errors::RepositoryError;

/// 爬取页面仓库特质
///
/// 定义页面元数据的持久化接口，以页面ID为键
#[async_trait]
pub trait CrawlPageRepository: Send + Sync {
    /// 插入或覆盖页面记录
    async fn upsert(&self, page: &CrawlPage) -> Result<(), RepositoryError>;

    /// 根据ID查找页面记录
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlPage>, RepositoryError>;
}

#[async_trait]
impl<T: CrawlPageRepository + ?Sized> CrawlPageRepository for Arc<T> {
    async fn upsert(&self, page: &CrawlPage) -> Result<(), RepositoryError> {
        (**self).upsert(page).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlPage>, RepositoryError> {
        (**self).find_by_id(id).await
    }
}
