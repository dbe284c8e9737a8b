// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建
//!
//! 调度器产生的页面、静态文件与状态页都在这里序列化为 HTTP/1.1 报文。
//! 正文按客户端的 `Accept-Encoding` 选择 gzip 或 deflate 压缩。

use crate::{param::*, request::Request, util::HtmlBuilder, view::Rendered};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error, warn};

use std::{
    ffi::OsStr,
    io::{self, Write},
    path::Path,
};

const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            allow: None,
            content: None,
        }
    }

    /// 调度器渲染好的页面
    pub fn from_rendered(rendered: &Rendered, request: &Request, id: u128) -> Self {
        let mut response = Self::new();
        response.set_code(rendered.status);
        response.set_body(
            rendered.body.as_bytes().to_vec(),
            &rendered.content_type,
            request,
            id,
        );
        response
    }

    /// 静态文件，`path` 只用于根据扩展名判断 MIME 类型
    pub fn from_file(path: &Path, data: Vec<u8>, request: &Request, id: u128) -> Self {
        let mime = match path.extension() {
            Some(ext) => get_mime(ext),
            None => MIME_TYPES.get("_").copied().unwrap_or("application/octet-stream"),
        };
        debug!("[ID{}]静态文件{:?}的MIME类型为{}", id, path, mime);
        let mut response = Self::new();
        response.set_body(data, mime, request, id);
        response
    }

    /// 不依赖任何模块的状态页
    pub fn from_status_code(code: u16, request: &Request, id: u128) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        if code == 204 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
            return response;
        }
        let content = HtmlBuilder::from_status_code(code, None).build();
        response.set_body(content.into_bytes(), HTML_CONTENT_TYPE, request, id);
        response
    }

    /// `OPTIONS` 请求的应答
    pub fn options() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    fn set_body(&mut self, data: Vec<u8>, mime: &str, request: &Request, id: u128) {
        let encoding = if should_skip_compression(mime) {
            None
        } else {
            decide_encoding(request.accept_encoding())
        };
        let (body, encoding) = match compress(data.clone(), encoding) {
            Ok(compressed) => (compressed, encoding),
            Err(e) => {
                error!("[ID{}]压缩响应正文失败，改为不压缩发送：{}", id, e);
                (data, None)
            }
        };
        self.content_encoding = encoding;
        self.content_type = Some(mime.to_string());
        self.content_length = body.len() as u64;
        // HEAD 只发送响应头，但保留正文长度
        self.content = match request.method() {
            HttpRequestMethod::Head => None,
            _ => Some(Bytes::from(body)),
        };
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&information) => information.to_string(),
            None => {
                warn!("未登记的状态码：{}，原因短语按500处理", code);
                "Internal Server Error".to_string()
            }
        };
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let mut header = format!("{} {} {}{}", version, self.status_code, self.information, CRLF);
        if let Some(content_type) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", content_type, CRLF));
        }
        if let Some(encoding) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", encoding, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length, CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        if let Some(allow) = &self.allow {
            let methods: Vec<String> = allow.iter().map(|m| m.to_string()).collect();
            header.push_str(&format!("Allow: {}{}", methods.join(", "), CRLF));
        }
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if let Some(content) = &self.content {
            bytes.extend_from_slice(content);
        }
        bytes
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "font/woff",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

/// 优先 gzip，其次 deflate；brotli 压缩较慢，动态页面不使用
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}

fn get_mime(extension: &OsStr) -> &'static str {
    let fallback = "application/octet-stream";
    let extension = match extension.to_str() {
        Some(e) => e.to_lowercase(),
        None => {
            error!("无法将&OsStr转换为&str类型");
            return fallback;
        }
    };
    MIME_TYPES.get(extension.as_str()).copied().unwrap_or(fallback)
}
