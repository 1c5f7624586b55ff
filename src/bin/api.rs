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

use axum::Extension;
use crawl_fanout::application::use_cases::submit_crawl::SubmitCrawlUseCase;
use crawl_fanout::config::settings::Settings;
use crawl_fanout::infrastructure::metrics;
use crawl_fanout::presentation::routes;
use crawl_fanout::queue::kafka::KafkaQueue;
use crawl_fanout::utils::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 提交服务入口
///
/// 接收爬取请求并将根作业发布到作业主题
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting fanout api...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");
    metrics::init_metrics(&settings.metrics);

    // 3. Kafka producer
    let queue = Arc::new(KafkaQueue::new(&settings.kafka)?);
    info!(brokers = %settings.kafka.bootstrap_servers(), "Kafka producer ready");

    let use_case = Arc::new(SubmitCrawlUseCase::new(queue, settings.kafka.topic.clone()));
    let app = routes::routes().layer(Extension(use_case));

    // 4. Start server
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await?;

    Ok(())
}
