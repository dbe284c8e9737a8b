// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了框架在请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、路由校验错误、模块装载错误以及诊断日志写入错误。
//! - **语义映射**：每个变体都对应特定的处理分支，由调度器（Dispatcher）将其转化为错误路由重试或 HTTP 状态码。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::fmt;

/// 框架处理请求过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了框架不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了框架不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求的静态文件不存在。对应 `404 Not Found`。
    FileNotFound,
    /// 请求的路径包含越权尝试（如 `..`）。对应 `400 Bad Request`。
    InvalidPath,
    /// module / controller / action 未通过字符类别或长度校验。
    ValidationFailure,
    /// 模块目录不存在。
    ModuleNotFound,
    /// 模块目录存在，但控制器清单文件不存在。
    ControllerNotFound,
    /// 控制器文件存在，但注册表中无法解析出对应的控制器类型。
    ClassNotResolved,
    /// 控制器已实例化，但不存在请求的 action 方法。
    ActionNotFound,
    /// 诊断日志存储不可用。
    LoggingFailure,
    /// action 主动要求以指定的 HTTP 状态码结束请求（例如 403）。
    Halt(u16),
    /// 配置文件无法读取。
    ConfigUnreadable,
    /// 数据库文件无法打开，或表结构无法创建。
    DatabaseUnavailable,
    /// SQL 语句无法准备或执行，详情已写入 `Db` 类别的错误日志。
    QueryFailed,
}

use Exception::*;

impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            ValidationFailure => write!(f, "Route parameters failed validation"),
            ModuleNotFound => write!(f, "Module directory does not exist"),
            ControllerNotFound => write!(f, "Controller file does not exist"),
            ClassNotResolved => write!(f, "Controller type could not be resolved"),
            ActionNotFound => write!(f, "Action method does not exist"),
            LoggingFailure => write!(f, "Error log store is unavailable"),
            Halt(code) => write!(f, "Action halted the request with status {}", code),
            ConfigUnreadable => write!(f, "Configuration file can't be read"),
            DatabaseUnavailable => write!(f, "Database can't be opened"),
            QueryFailed => write!(f, "Database query failed"),
        }
    }
}
