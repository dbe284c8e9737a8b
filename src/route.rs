// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由数据结构
//!
//! `Route` 是一个保持插入顺序的字符串映射，三个核心键为
//! `module`、`controller`、`action`，其余键是位置参数对或查询参数。

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::param::{ERROR_ACTION, ERROR_CONTROLLER, ERROR_MODULE};

pub const MODULE_KEY: &str = "module";
pub const CONTROLLER_KEY: &str = "controller";
pub const ACTION_KEY: &str = "action";

/// 核心键是否为 module / controller / action 之一
pub fn is_core_key(key: &str) -> bool {
    key == MODULE_KEY || key == CONTROLLER_KEY || key == ACTION_KEY
}

/// 有序的键值路由
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    entries: Vec<(String, String)>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定错误路由 `{module: "error", controller: "index", action: "error404"}`
    pub fn error() -> Self {
        Self::from_core(ERROR_MODULE, ERROR_CONTROLLER, ERROR_ACTION)
    }

    pub fn from_core(module: &str, controller: &str, action: &str) -> Self {
        let mut route = Self::new();
        route.set(MODULE_KEY, module);
        route.set(CONTROLLER_KEY, controller);
        route.set(ACTION_KEY, action);
        route
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// 写入键值；键已存在时原位覆盖，保留首次出现的位置
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }

    /// 仅在键不存在时写入，返回是否写入
    pub fn set_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.entries.push((key.to_string(), value.to_string()));
        true
    }

    pub fn module(&self) -> Option<&str> {
        self.get(MODULE_KEY)
    }

    pub fn controller(&self) -> Option<&str> {
        self.get(CONTROLLER_KEY)
    }

    pub fn action(&self) -> Option<&str> {
        self.get(ACTION_KEY)
    }

    /// 三个核心键是否齐全
    pub fn is_complete(&self) -> bool {
        self.module().is_some() && self.controller().is_some() && self.action().is_some()
    }

    pub fn is_error_route(&self) -> bool {
        self.module() == Some(ERROR_MODULE)
            && self.controller() == Some(ERROR_CONTROLLER)
            && self.action() == Some(ERROR_ACTION)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// 序列化为按插入顺序排列的 JSON 对象
impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
