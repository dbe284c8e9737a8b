// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 依赖容器
//!
//! 调度器为每个请求组装一次容器，并以引用的方式传给模块装载器和每个控制器的构造函数。
//! 所有字段都是可廉价克隆的共享句柄。

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;

use crate::{
    cache::ResultCache,
    db::Database,
    error_log::ErrorLog,
    loader::Loader,
    module_loader::{ModuleCatalog, ModuleLoader, ModuleResult},
    route::Route,
    session::Session,
    view::View,
};

#[derive(Clone)]
pub struct Container {
    pub loader: Arc<Loader>,
    pub catalog: Arc<dyn ModuleCatalog>,
    pub view: Arc<Mutex<View>>,
    pub error_log: Arc<ErrorLog>,
    pub session: Arc<Mutex<Session>>,
    pub cache: Option<Arc<Mutex<ResultCache>>>,
    /// 未配置数据库时为 `None`
    pub db: Option<Arc<Database>>,
}

impl Container {
    pub fn view(&self) -> MutexGuard<'_, View> {
        lock_or_recover(&self.view, "视图")
    }

    pub fn session(&self) -> MutexGuard<'_, Session> {
        lock_or_recover(&self.session, "会话")
    }

    pub fn cache(&self) -> Option<MutexGuard<'_, ResultCache>> {
        self.cache
            .as_ref()
            .map(|cache| lock_or_recover(cache, "结果缓存"))
    }

    pub fn db(&self) -> Option<&Database> {
        self.db.as_deref()
    }

    /// 在当前请求中执行另一个模块的 action 并取回其输出，用于页面嵌入。
    ///
    /// 调用方不能在持有视图锁的同时调用本方法。
    pub fn render_module_call(
        &self,
        module: &str,
        controller: &str,
        action: &str,
        params: &Route,
    ) -> Option<String> {
        let module_loader = ModuleLoader::new(self);
        match module_loader.execute_module(module, controller, action, params, true) {
            ModuleResult::Output(html) => Some(html),
            _ => None,
        }
    }
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("{}锁被污染，恢复并继续", name);
            poisoned.into_inner()
        }
    }
}
