// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求头解析
//!
//! 把从 TCP 流中读到的原始字节解析为 `Request`。调度只关心请求行中的
//! URI，其余标头用于内容协商与确定客户端地址：
//! 1. 请求行（方法、URI、版本）。
//! 2. `User-Agent`、`Accept`、`Host`、`X-Forwarded-For`。
//! 3. `Accept-Encoding`，用于后续的压缩传输。

use crate::{exception::Exception, param::*};
use log::error;

/// 一个 HTTP 请求的头部信息，不含请求体
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 请求行中的原始 URI（含查询串）
    path: String,
    version: HttpVersion,
    user_agent: String,
    host: Option<String>,
    /// `X-Forwarded-For` 中最靠近客户端的地址
    forwarded_for: Option<String>,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    accept: Option<String>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request`。
    ///
    /// 请求不是合法 UTF-8、方法或协议版本不受支持时返回相应的 `Exception`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);
        let request_line = request_lines.next().unwrap_or("");

        // 请求行，例如 "GET /blog/post/view?id=42 HTTP/1.1"
        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::UnSupportedRequestMethod);
        }

        let method_str = parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };
        if !ALLOWED_METHODS.contains(&method) {
            error!("[ID{}]HTTP请求方法{}未被允许", id, method);
            return Err(Exception::UnSupportedRequestMethod);
        }

        let version_str = parts[parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // URI 中出现空格虽不规范，仍按原样拼回
        let path = parts[1..parts.len() - 1].join(" ");

        let mut request = Self {
            method,
            path,
            version,
            user_agent: String::new(),
            host: None,
            forwarded_for: None,
            accept_encoding: vec![],
            accept: None,
        };

        // 空行之后是请求体
        for line in request_lines.take_while(|line| !line.is_empty()) {
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim().to_lowercase(), value.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => request.user_agent = value.to_string(),
                "accept" => request.accept = Some(value.to_string()),
                "host" => request.host = Some(value.to_string()),
                "x-forwarded-for" => {
                    request.forwarded_for = value
                        .split(',')
                        .map(str::trim)
                        .find(|ip| !ip.is_empty())
                        .map(str::to_string);
                }
                "accept-encoding" => request.accept_encoding = parse_accept_encoding(value),
                _ => {}
            }
        }

        Ok(request)
    }
}

/// 只要包含关键词即视为支持
fn parse_accept_encoding(value: &str) -> Vec<HttpEncoding> {
    let mut encodings = vec![];
    if value.contains("gzip") {
        encodings.push(HttpEncoding::Gzip);
    }
    if value.contains("deflate") {
        encodings.push(HttpEncoding::Deflate);
    }
    if value.contains("br") {
        encodings.push(HttpEncoding::Br);
    }
    encodings
}

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 请求行中的 URI（含查询串）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 去掉查询串后的路径
    pub fn path_without_query(&self) -> &str {
        match self.path.split_once('?') {
            Some((path, _)) => path,
            None => &self.path,
        }
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn accept_encoding(&self) -> &Vec<HttpEncoding> {
        &self.accept_encoding
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// 客户端地址：优先使用 `X-Forwarded-For`，否则使用 TCP 对端地址
    pub fn client_ip(&self, peer: Option<&str>) -> Option<String> {
        self.forwarded_for
            .clone()
            .or_else(|| peer.map(|ip| ip.to_string()))
    }
}
