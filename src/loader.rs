// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 控制器加载器
//!
//! 启动时登记"完整类型名 -> 控制器工厂"，请求期间由模块装载器登记
//! "命名空间前缀 -> 目录"。只有当类型名落在某个已登记的命名空间下时，
//! `resolve` 才会交出工厂，从而保证模块代码只在路由确认模块存在之后才被装载。

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

use log::{debug, warn};

use crate::controller::{instantiate, Controller, ControllerFactory};

const NAMESPACE_SEPARATOR: char = '\\';

#[derive(Default)]
pub struct Loader {
    namespaces: RwLock<Vec<(String, PathBuf)>>,
    factories: HashMap<String, ControllerFactory>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记控制器类型，重复登记时后者覆盖前者
    pub fn register<C: Controller>(&mut self, type_name: &str) {
        let name = normalize(type_name);
        if !C::actions().contains("indexAction") {
            warn!("控制器{}没有提供indexAction", name);
        }
        debug!("登记控制器类型: {}", name);
        self.factories.insert(name, instantiate::<C>);
    }

    /// 登记命名空间前缀与目录的对应关系，重复登记不会产生新条目
    pub fn add_namespace(&self, prefix: &str, dir: &Path) {
        let prefix = normalize(prefix);
        let mut namespaces = match self.namespaces.write() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        if namespaces.iter().any(|(p, d)| *p == prefix && d == dir) {
            return;
        }
        debug!("登记命名空间: {} -> {:?}", prefix, dir);
        namespaces.push((prefix, dir.to_path_buf()));
    }

    /// 类型名所属命名空间对应的目录，最长前缀优先
    pub fn namespace_dir(&self, type_name: &str) -> Option<PathBuf> {
        let name = normalize(type_name);
        let namespaces = match self.namespaces.read() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        };
        namespaces
            .iter()
            .filter(|(prefix, _)| in_namespace(&name, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, dir)| dir.clone())
    }

    pub fn resolve(&self, type_name: &str) -> Option<ControllerFactory> {
        let name = normalize(type_name);
        self.namespace_dir(&name)?;
        self.factories.get(&name).copied()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.factories.contains_key(&normalize(type_name))
    }
}

fn normalize(name: &str) -> String {
    name.trim_matches(NAMESPACE_SEPARATOR).to_string()
}

fn in_namespace(name: &str, prefix: &str) -> bool {
    name.len() > prefix.len()
        && name.starts_with(prefix)
        && name[prefix.len()..].starts_with(NAMESPACE_SEPARATOR)
}
