// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由引擎
//!
//! 将原始请求 URI（路径 + 查询串）解析为有序的 `Route`。
//!
//! ## 路由规则：
//! 1. 路径带扩展名（如 `/style.css`）-> 不是模块路由，交给静态文件处理。
//! 2. 位置段 0 / 1 / 2 -> `module` / `controller` / `action`，各自严格校验。
//! 3. 位置段 3 起按奇数下标两两成对，作为额外参数，先出现者优先。
//! 4. 查询串参数覆盖额外参数，但永远不会覆盖三个核心键。
//! 5. 三个核心键不齐 -> 整条路由替换为固定错误路由。

use log::debug;
use percent_encoding::percent_decode_str;

use crate::{
    param::{ACTION_MAX_LEN, MODULE_MAX_LEN},
    route::{is_core_key, Route, ACTION_KEY, CONTROLLER_KEY, MODULE_KEY},
    validator::{validate, Kind},
};

/// 路由解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 交给模块装载器执行的路由（可能是固定错误路由）
    Module(Route),
    /// 请求的是带扩展名的文件，落入静态文件处理
    Static,
}

impl RouteOutcome {
    pub fn route(&self) -> Option<&Route> {
        match self {
            RouteOutcome::Module(route) => Some(route),
            RouteOutcome::Static => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// 解析原始请求 URI
    pub fn get_route(&self, raw_uri: &str) -> RouteOutcome {
        let (path, query) = split_uri(raw_uri);

        if has_extension(path) {
            debug!("请求路径{}带有扩展名，交给静态文件处理", path);
            return RouteOutcome::Static;
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return RouteOutcome::Module(Route::error());
        }

        let mut route = Route::new();
        for (index, segment) in segments.iter().enumerate() {
            set_core_parameter(&mut route, index, segment);

            // 奇数下标作为键，下一个段作为值
            if index > 2 && index % 2 == 1 {
                if let Some(value) = segments.get(index + 1) {
                    if !is_core_key(segment) {
                        route.set_if_absent(segment, value);
                    }
                }
            }
        }

        if let Some(query) = query {
            for (key, value) in parse_query(query) {
                if !is_core_key(&key) {
                    route.set(&key, &value);
                }
            }
        }

        if !route.is_complete() {
            debug!("路由{}缺少核心参数，使用固定错误路由", path);
            return RouteOutcome::Module(Route::error());
        }

        RouteOutcome::Module(route)
    }
}

fn set_core_parameter(route: &mut Route, index: usize, value: &str) {
    match index {
        0 if validate(value, Kind::Module, MODULE_MAX_LEN) => route.set(MODULE_KEY, value),
        1 if validate(value, Kind::Module, MODULE_MAX_LEN) => route.set(CONTROLLER_KEY, value),
        2 if validate(value, Kind::AlphaNum, ACTION_MAX_LEN) => route.set(ACTION_KEY, value),
        _ => {}
    }
}

/// 在第一个 `?` 处切分路径与查询串
fn split_uri(raw_uri: &str) -> (&str, Option<&str>) {
    match raw_uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_uri, None),
    }
}

/// 最后一个非空路径段中，最后一个 `.` 之后是否还有内容
fn has_extension(path: &str) -> bool {
    match path.split('/').filter(|s| !s.is_empty()).last() {
        Some(name) => match name.rfind('.') {
            Some(dot) => dot + 1 < name.len(),
            None => false,
        },
        None => false,
    }
}

/// 解析 `application/x-www-form-urlencoded` 查询串，重复的键保留最后一次出现的值
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, value),
            None => (pair, ""),
        };
        let key = decode_component(key);
        if key.is_empty() {
            continue;
        }
        let value = decode_component(value);
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => pairs.push((key, value)),
        }
    }

    pairs
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
