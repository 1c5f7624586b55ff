// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 存储仓库特质
///
/// 保存抓取到的原始字节。实现必须在重试时保持幂等（相同ID覆盖），
/// 并在首次使用时创建所需的目录或容器结构。
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// 保存数据并返回稳定的存储位置
    async fn save(&self, id: &str, data: &[u8]) -> Result<String, StorageError>;
}

#[async_trait]
impl<T: StorageRepository + ?Sized> StorageRepository for Arc<T> {
    async fn save(&self, id: &str, data: &[u8]) -> Result<String, StorageError> {
        (**self).save(id, data).await
    }
}
