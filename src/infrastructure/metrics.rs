// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

pub const JOBS_PROCESSED: &str = "crawl_jobs_processed_total";
pub const CHILDREN_PUBLISHED: &str = "crawl_children_published_total";
pub const CHILD_PUBLISH_FAILURES: &str = "crawl_child_publish_failures_total";
pub const FETCH_DURATION: &str = "crawl_fetch_duration_seconds";
pub const POISON_MESSAGES: &str = "crawl_poison_messages_total";

/// 安装 Prometheus 导出器
///
/// 未启用时只注册指标描述，记录调用变为空操作
pub fn init_metrics(settings: &MetricsSettings) {
    if settings.enabled {
        match settings.listen_addr.parse::<SocketAddr>() {
            Ok(addr) => {
                // Ignore error if address is already in use (for development/testing)
                if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
                    warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
                } else {
                    info!("Metrics exporter listening on {}", addr);
                }
            }
            Err(e) => warn!("Invalid metrics listen address {}: {}", settings.listen_addr, e),
        }
    }

    describe_counter!(JOBS_PROCESSED, "Crawl jobs processed, by outcome");
    describe_counter!(CHILDREN_PUBLISHED, "Child jobs published by recursion");
    describe_counter!(CHILD_PUBLISH_FAILURES, "Child jobs that failed to publish");
    describe_histogram!(FETCH_DURATION, Unit::Seconds, "Page fetch latency");
    describe_counter!(POISON_MESSAGES, "Undecodable messages acknowledged and dropped");
}

pub fn record_job_outcome(outcome: &'static str) {
    counter!(JOBS_PROCESSED, "outcome" => outcome).increment(1);
}

pub fn record_children(published: usize, failed: usize) {
    counter!(CHILDREN_PUBLISHED).increment(published as u64);
    counter!(CHILD_PUBLISH_FAILURES).increment(failed as u64);
}

pub fn record_fetch_duration(elapsed: Duration) {
    histogram!(FETCH_DURATION).record(elapsed.as_secs_f64());
}

pub fn record_poison_message() {
    counter!(POISON_MESSAGES).increment(1);
}
