// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 字符串校验器
//!
//! 对常见字符串类别做无副作用的谓词判断。路由器与模块装载器都依赖它来
//! 约束 module / controller / action 三个核心参数。

use std::net::IpAddr;

use lazy_static::lazy_static;
use regex::Regex;

/// 可校验的字符串类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// 不做字符类别限制，只检查长度
    Raw,
    /// IPv4 / IPv6 字面量
    Ip,
    /// 以字母开头，允许字母、数字，以及用连字符分隔的组
    Username,
    /// 电子邮件地址
    Email,
    /// 仅 ASCII 字母
    Alpha,
    /// 模块与控制器名称，仅 ASCII 字母
    Module,
    /// 长度大于 7，至少一个大写字母与一个数字
    Password,
    /// 去掉 `-` 和 `_` 之后仅剩 ASCII 字母数字
    Keys,
    /// 仅 ASCII 字母数字
    AlphaNum,
    /// 十进制整数（可带符号，不允许前导零）
    Int,
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .unwrap();
    static ref USERNAME_RE: Regex =
        Regex::new(r"^[\p{Lu}\p{Ll}][\p{L}\p{N}]*(?:\p{Pd}[\p{L}\p{N}]+)*$").unwrap();
    static ref INT_RE: Regex = Regex::new(r"^[+-]?(?:0|[1-9][0-9]*)$").unwrap();
}

/// 默认最大长度
pub const DEFAULT_MAX: usize = 100;

/// 按类别校验字符串。
///
/// 长度按 Unicode 标量值计数，超过 `max` 一律失败。
pub fn validate(value: &str, kind: Kind, max: usize) -> bool {
    if value.chars().count() > max {
        return false;
    }

    match kind {
        Kind::Raw => true,
        Kind::Ip => value.parse::<IpAddr>().is_ok(),
        Kind::Username => USERNAME_RE.is_match(value),
        Kind::Email => is_email(value),
        Kind::Alpha | Kind::Module => is_ascii_class(value, |c| c.is_ascii_alphabetic()),
        Kind::Password => {
            value.len() > 7
                && value.chars().any(|c| c.is_ascii_uppercase())
                && value.chars().any(|c| c.is_ascii_digit())
        }
        Kind::Keys => {
            let stripped: String = value.chars().filter(|c| *c != '-' && *c != '_').collect();
            is_ascii_class(&stripped, |c| c.is_ascii_alphanumeric())
        }
        Kind::AlphaNum => is_ascii_class(value, |c| c.is_ascii_alphanumeric()),
        Kind::Int => INT_RE.is_match(value) && value.parse::<i64>().is_ok(),
    }
}

// 空串不属于任何字符类别
fn is_ascii_class(value: &str, pred: impl Fn(char) -> bool) -> bool {
    !value.is_empty() && value.chars().all(pred)
}

fn is_email(value: &str) -> bool {
    if !EMAIL_RE.is_match(value) {
        return false;
    }
    // 本地部分不能以点开头或结尾，也不能出现连续的点
    match value.rsplit_once('@') {
        Some((local, _)) => {
            local.len() <= 64
                && !local.starts_with('.')
                && !local.ends_with('.')
                && !local.contains("..")
        }
        None => false,
    }
}
