// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供作业处理和消费运行时：
/// - 爬取工作器（crawl_worker）：单个作业的处理流程
/// - 工作管理器（manager）：按分区调度消息并提交位点
pub mod crawl_worker;
pub mod manager;

pub use crawl_worker::{CrawlWorker, CrawlerPolicy, ProcessOutcome};
pub use manager::WorkerManager;
