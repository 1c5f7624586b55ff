// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：爬取作业和页面记录
/// - 仓库接口（repositories）：原始内容存储与页面元数据的持久化抽象
/// - 服务（services）：内容提取与链接发现
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;
