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

use crawl_fanout::config::settings::Settings;
use crawl_fanout::engines::reqwest_engine::ReqwestEngine;
use crawl_fanout::engines::traits::PageFetcher;
use crawl_fanout::infrastructure::database::connection;
use crawl_fanout::infrastructure::metrics;
use crawl_fanout::infrastructure::repositories::crawl_page_repo_impl::CrawlPageRepositoryImpl;
use crawl_fanout::infrastructure::storage::create_storage_repository;
use crawl_fanout::queue::kafka::KafkaQueue;
use crawl_fanout::utils::retry_policy::RetryPolicy;
use crawl_fanout::utils::telemetry;
use crawl_fanout::workers::{CrawlWorker, CrawlerPolicy, WorkerManager};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 工作进程入口
///
/// 加入消费组消费爬取作业，收到 SIGINT/SIGTERM 后停止拉取消息，
/// 等待进行中的作业完成后退出
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting fanout worker...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");
    metrics::init_metrics(&settings.metrics);

    // 3. Connect to database
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connection established");
    let pages = Arc::new(CrawlPageRepositoryImpl::new(db));

    // 4. Raw content storage
    let storage = create_storage_repository(&settings.storage)?;
    info!(storage_type = %settings.storage.storage_type, "Storage initialized");

    // 5. Fetcher and broker
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(ReqwestEngine::new(settings.crawler.fetch_timeout())?);
    let queue = Arc::new(KafkaQueue::new(&settings.kafka)?);
    info!(brokers = %settings.kafka.bootstrap_servers(), "Kafka producer ready");

    let worker = CrawlWorker::new(
        storage,
        pages,
        queue.clone(),
        fetcher,
        settings.kafka.topic.clone(),
    )
    .with_policy(CrawlerPolicy {
        recurse_on_metadata_failure: settings.crawler.recurse_on_metadata_failure,
    })
    .with_retry_policy(RetryPolicy::with_max_retries(
        settings.crawler.max_fetch_retries,
    ));

    let manager = WorkerManager::new(
        Arc::new(worker),
        queue,
        settings.kafka.topic.clone(),
        settings.kafka.group_id.clone(),
    )
    .with_partition_buffer(settings.crawler.partition_buffer)
    .with_shutdown_grace(settings.crawler.shutdown_grace());

    // 6. Shutdown on signal
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    if let Err(e) = manager.run(shutdown).await {
        error!(error = %e, "Worker stopped with failure");
        return Err(e.into());
    }

    info!("Fanout worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
