// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话数据
//!
//! 每个请求持有一份会话数据：用户信息、表单令牌与一次性提示消息。
//! 会话在浏览器端的 Cookie 传输不由本模块负责。

use std::collections::HashMap;

use chrono::Local;

use crate::{
    error_log::LOGTIME_FORMAT,
    util::generate_code,
    validator::{validate, Kind},
};

/// 表单令牌长度
pub const TOKEN_LENGTH: usize = 32;

/// 一次性提示消息的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flash {
    Error,
    Warning,
    Success,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    id: String,
    user: HashMap<String, String>,
    data: HashMap<String, String>,
    token: String,
    flashes: HashMap<Flash, Vec<String>>,
}

impl Session {
    /// 新会话默认以访客身份登记，`client_ip` 不是合法 IP 时记为空串
    pub fn new(client_ip: Option<&str>) -> Self {
        let mut session = Self {
            id: generate_code(TOKEN_LENGTH),
            ..Default::default()
        };
        let ip = client_ip
            .filter(|ip| validate(ip, Kind::Ip, 45))
            .unwrap_or("");
        let id = session.id.clone();
        session.set_to_user("id", "0");
        session.set_to_user("username", "Guest");
        session.set_to_user("ip", ip);
        session.set_to_user("sess", &id);
        session.set_to_user(
            "session_start",
            &Local::now().format(LOGTIME_FORMAT).to_string(),
        );
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|v| v.as_str())
    }

    pub fn set_to_user(&mut self, key: &str, value: &str) {
        self.user.insert(key.to_string(), value.to_string());
    }

    pub fn user(&self) -> &HashMap<String, String> {
        &self.user
    }

    pub fn user_id(&self) -> u64 {
        self.user
            .get("id")
            .and_then(|id| id.parse().ok())
            .unwrap_or(0)
    }

    pub fn logged_in(&self) -> bool {
        self.user_id() > 0
    }

    /// 返回表单令牌，不存在时生成一个
    pub fn token(&mut self) -> &str {
        if self.token.is_empty() {
            self.token = generate_code(TOKEN_LENGTH);
        }
        &self.token
    }

    pub fn reset_token(&mut self) {
        self.token.clear();
    }

    pub fn flash(&mut self, kind: Flash, message: &str) {
        self.flashes
            .entry(kind)
            .or_default()
            .push(message.to_string());
    }

    pub fn set_error(&mut self, message: &str) {
        self.flash(Flash::Error, message);
    }

    pub fn set_warning(&mut self, message: &str) {
        self.flash(Flash::Warning, message);
    }

    pub fn set_success(&mut self, message: &str) {
        self.flash(Flash::Success, message);
    }

    /// 取出并清空某类提示消息
    pub fn take(&mut self, kind: Flash) -> Vec<String> {
        self.flashes.remove(&kind).unwrap_or_default()
    }
}
