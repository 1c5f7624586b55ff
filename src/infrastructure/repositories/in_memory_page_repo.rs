// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_page::CrawlPage;
use crate::domain::repositories::crawl_page_repository::{CrawlPageRepository, RepositoryError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// 内存页面仓库（用于测试和本地运行）
#[derive(Clone, Default)]
pub struct InMemoryCrawlPageRepository {
    pages: Arc<RwLock<HashMap<Uuid, CrawlPage>>>,
    fail_upsert: Arc<AtomicBool>,
}

impl InMemoryCrawlPageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使后续写入全部失败
    pub fn set_fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<CrawlPage> {
        self.pages.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }
}

#[async_trait]
impl CrawlPageRepository for InMemoryCrawlPageRepository {
    async fn upsert(&self, page: &CrawlPage) -> Result<(), RepositoryError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseError(
                "in-memory repository set to fail".to_string(),
            ));
        }
        self.pages.write().insert(page.id, page.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlPage>, RepositoryError> {
        Ok(self.pages.read().get(&id).cloned())
    }
}
