// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 爬取请求的DTO和提交用例
pub mod application;

/// 配置模块
///
/// 分层加载配置文件和 `FANOUT__` 前缀的环境变量
pub mod config;

/// 领域模块
///
/// 爬取作业、页面记录、内容提取和链接发现
pub mod domain;

/// 引擎模块
///
/// 页面抓取接口及其HTTP实现
pub mod engines;

/// 基础设施模块
///
/// 数据库、原始内容存储和指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 提交爬取请求的HTTP路由和处理器
pub mod presentation;

/// 队列模块
///
/// 分区消息队列接口，Kafka和内存实现
pub mod queue;

/// 工具模块
///
/// 错误类型、URL校验、重试策略和日志初始化
pub mod utils;

/// 工作器模块
///
/// 单作业处理流程和按分区顺序消费的运行时
pub mod workers;
