// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::crawl_page::{CrawlPage, PageStatus};
use crate::domain::repositories::crawl_page_repository::{CrawlPageRepository, RepositoryError};
use crate::infrastructure::database::entities::crawl_page as page_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{sea_query::OnConflict, *};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// 爬取页面仓库实现
pub struct CrawlPageRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl CrawlPageRepositoryImpl {
    /// 创建新的页面仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的页面仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_model(page: &CrawlPage) -> Result<page_entity::Model, RepositoryError> {
    let parsed_data = serde_json::to_value(&page.parsed_data)
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
    let depth_level = i32::try_from(page.depth_level)
        .map_err(|_| RepositoryError::InvalidData(format!("depth {} out of range", page.depth_level)))?;

    Ok(page_entity::Model {
        id: page.id,
        parent_id: page.parent_id,
        url: page.url.clone(),
        title: page.title.clone(),
        file_path: page.file_path.clone(),
        parsed_data,
        status: page.status.to_string(),
        depth_level,
        created_at: page.created_at.into(),
        updated_at: Utc::now().into(),
    })
}

fn from_model(m: page_entity::Model) -> Result<CrawlPage, RepositoryError> {
    let parsed_data: BTreeMap<String, String> = serde_json::from_value(m.parsed_data)
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
    let status: PageStatus = m.status.parse().map_err(RepositoryError::InvalidData)?;
    let depth_level = u32::try_from(m.depth_level)
        .map_err(|_| RepositoryError::InvalidData(format!("negative depth {}", m.depth_level)))?;

    Ok(CrawlPage {
        id: m.id,
        parent_id: m.parent_id,
        url: m.url,
        title: m.title,
        file_path: m.file_path,
        parsed_data,
        status,
        depth_level,
        created_at: m.created_at.into(),
    })
}

#[async_trait]
impl CrawlPageRepository for CrawlPageRepositoryImpl {
    /// 插入或覆盖页面记录
    ///
    /// 使用 `INSERT ... ON CONFLICT (id) DO UPDATE`，重复投递同一作业时
    /// 只会保留一条记录
    async fn upsert(&self, page: &CrawlPage) -> Result<(), RepositoryError> {
        let model: page_entity::ActiveModel = to_model(page)?.into();

        page_entity::Entity::insert(model)
            .on_conflict(
                OnConflict::column(page_entity::Column::Id)
                    .update_columns([
                        page_entity::Column::ParentId,
                        page_entity::Column::Url,
                        page_entity::Column::Title,
                        page_entity::Column::FilePath,
                        page_entity::Column::ParsedData,
                        page_entity::Column::Status,
                        page_entity::Column::DepthLevel,
                        page_entity::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlPage>, RepositoryError> {
        let model = page_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model.map(from_model).transpose()
    }
}
