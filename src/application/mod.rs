// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含提交爬取作业的请求对象和用例
pub mod dto;
pub mod use_cases;
