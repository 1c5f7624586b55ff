// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;

use crate::config::settings::StorageSettings;
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};

const PAGE_EXTENSION: &str = "html";

/// S3 对象存储实现
///
/// 对象键为 `<prefix><id>.html`，返回的位置为 `s3://<bucket>/<key>`
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(
        region: String,
        bucket: String,
        prefix: Option<String>,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    ) -> Self {
        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .region(aws_sdk_s3::config::Region::new(region))
            .credentials_provider(credentials)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest());

        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let config = config_builder.build();
        let client = aws_sdk_s3::Client::from_conf(config);

        Self {
            client,
            bucket,
            prefix: prefix.unwrap_or_default(),
        }
    }

    fn object_key(&self, id: &str) -> String {
        format!("{}{}.{}", self.prefix, id, PAGE_EXTENSION)
    }
}

#[async_trait]
impl StorageRepository for S3Storage {
    async fn save(&self, id: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = self.object_key(id);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/html")
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

/// 本地文件系统存储实现
///
/// 每个页面写入 `<base_path>/<id>.html`，目录在首次写入时创建
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn get_full_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", id, PAGE_EXTENSION))
    }
}

#[async_trait]
impl StorageRepository for LocalStorage {
    async fn save(&self, id: &str, data: &[u8]) -> Result<String, StorageError> {
        // 确保目录存在
        fs::create_dir_all(&self.base_path).await?;

        let full_path = self.get_full_path(id);
        fs::write(&full_path, data).await?;

        Ok(full_path.to_string_lossy().to_string())
    }
}

/// 存储工厂函数
pub fn create_storage_repository(
    settings: &StorageSettings,
) -> Result<Arc<dyn StorageRepository>, StorageError> {
    match settings.storage_type.as_str() {
        "local" => {
            let base_path = settings
                .local_path
                .clone()
                .unwrap_or_else(|| "./crawled_data".to_string());
            Ok(Arc::new(LocalStorage::new(base_path)))
        }
        "s3" => {
            let required = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .ok_or_else(|| StorageError::Other(format!("Missing storage setting: {}", name)))
            };
            Ok(Arc::new(S3Storage::new(
                required(&settings.s3_region, "s3_region")?,
                required(&settings.s3_bucket, "s3_bucket")?,
                settings.s3_prefix.clone(),
                required(&settings.s3_access_key, "s3_access_key")?,
                required(&settings.s3_secret_key, "s3_secret_key")?,
                settings.s3_endpoint.clone(),
            )))
        }
        "memory" => Ok(Arc::new(InMemoryStorage::new())),
        other => Err(StorageError::Other(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}

/// 内存存储实现（用于测试和本地运行）
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_save: Arc<AtomicBool>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使后续保存全部失败
    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// 读取已保存的内容
    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.data.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageRepository for InMemoryStorage {
    async fn save(&self, id: &str, data: &[u8]) -> Result<String, StorageError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::Other(
                "in-memory storage set to fail".to_string(),
            ));
        }
        self.data.write().insert(id.to_string(), data.to_vec());
        Ok(format!("memory://{}.{}", id, PAGE_EXTENSION))
    }
}
