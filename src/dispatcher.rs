// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 前端调度器
//!
//! 每个请求依次经过：路由解析 -> 组装依赖容器 -> 模块装载 -> 视图组装。
//!
//! 调度过程是一个只有两个状态的状态机：
//! - `Normal`：执行路由器给出的路由，成功即渲染，失败进入 `ErrorFallback`。
//! - `ErrorFallback`：强制改用固定错误路由再执行一次，仍失败则返回 500 页面。
//!
//! 每个请求最多调用两次模块装载器，且总会得到一个响应。

use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};

use crate::{
    cache::ResultCache,
    container::Container,
    db::Database,
    error_log::ErrorLog,
    loader::Loader,
    module_loader::{ModuleCatalog, ModuleLoader, ModuleResult},
    route::Route,
    router::{RouteOutcome, Router},
    session::Session,
    util::HtmlBuilder,
    view::{Rendered, View, ViewKind},
};

const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";
const JSON_MEDIA_TYPE: &str = "application/json";

/// 单个请求的上下文，由连接处理器构造后逐层传递
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: u128,
    /// 原始请求 URI，含查询串
    pub uri: String,
    pub client_ip: Option<String>,
    /// `Accept` 请求头
    pub accept: Option<String>,
}

impl RequestContext {
    pub fn new(id: u128, uri: &str, client_ip: Option<&str>) -> Self {
        Self {
            id,
            uri: uri.to_string(),
            client_ip: client_ip.map(|ip| ip.to_string()),
            accept: None,
        }
    }

    pub fn with_accept(mut self, accept: Option<&str>) -> Self {
        self.accept = accept.map(|value| value.to_string());
        self
    }

    /// 客户端声明接受 JSON 时改用 `Responder` 视图
    pub fn wants_json(&self) -> bool {
        self.accept
            .as_deref()
            .map_or(false, |accept| accept.to_ascii_lowercase().contains(JSON_MEDIA_TYPE))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 不是模块路由，交给静态文件处理
    Static,
    Rendered(Rendered),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Normal,
    ErrorFallback,
}

pub struct Dispatcher {
    router: Router,
    loader: Arc<Loader>,
    catalog: Arc<dyn ModuleCatalog>,
    error_log: Arc<ErrorLog>,
    cache: Option<Arc<Mutex<ResultCache>>>,
    db: Option<Arc<Database>>,
    view_kind: ViewKind,
    main_template: String,
}

impl Dispatcher {
    pub fn new(
        loader: Arc<Loader>,
        catalog: Arc<dyn ModuleCatalog>,
        error_log: Arc<ErrorLog>,
        view_kind: ViewKind,
    ) -> Self {
        Self {
            router: Router::new(),
            loader,
            catalog,
            error_log,
            cache: None,
            db: None,
            view_kind,
            main_template: "default".to_string(),
        }
    }

    /// 所有请求共享同一个结果缓存
    pub fn with_cache(mut self, cache: Arc<Mutex<ResultCache>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_main_template(mut self, template: &str) -> Self {
        self.main_template = template.to_string();
        self
    }

    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.error_log
    }

    /// 为一个请求组装依赖容器，视图与会话都是请求私有的
    pub fn build_container(&self, ctx: &RequestContext) -> Container {
        let view_kind = match ctx.wants_json() {
            true => ViewKind::Responder,
            false => self.view_kind,
        };
        Container {
            loader: Arc::clone(&self.loader),
            catalog: Arc::clone(&self.catalog),
            view: Arc::new(Mutex::new(self.fresh_view(view_kind))),
            error_log: Arc::clone(&self.error_log),
            session: Arc::new(Mutex::new(Session::new(ctx.client_ip.as_deref()))),
            cache: self.cache.as_ref().map(Arc::clone),
            db: self.db.as_ref().map(Arc::clone),
        }
    }

    pub fn dispatch(&self, ctx: &RequestContext) -> DispatchOutcome {
        let mut route = match self.router.get_route(&ctx.uri) {
            RouteOutcome::Static => {
                debug!("[ID{}]{}不是模块路由", ctx.id, ctx.uri);
                return DispatchOutcome::Static;
            }
            RouteOutcome::Module(route) => route,
        };
        let container = self.build_container(ctx);
        DispatchOutcome::Rendered(self.run(ctx.id, &container, &mut route))
    }

    /// 在给定容器上执行路由，返回最终页面
    pub fn run(&self, id: u128, container: &Container, route: &mut Route) -> Rendered {
        let mut state = DispatchState::Normal;
        loop {
            debug!(
                "[ID{}]{:?}状态下执行路由 {}/{}/{}",
                id,
                state,
                route.module().unwrap_or(""),
                route.controller().unwrap_or(""),
                route.action().unwrap_or("")
            );
            let result = execute(container, route);

            match (state, result) {
                (_, ModuleResult::Executed) | (_, ModuleResult::Output(_)) => {
                    return render(container);
                }
                (DispatchState::Normal, ModuleResult::Halted(404)) => {
                    debug!("[ID{}]action要求返回404，改用错误路由", id);
                }
                (_, ModuleResult::Halted(code)) => {
                    info!("[ID{}]action以状态码{}结束请求", id, code);
                    return status_page(code);
                }
                (DispatchState::Normal, ModuleResult::Invalid(error_route)) => {
                    warn!("[ID{}]路由参数未通过校验，改用错误路由", id);
                    *route = error_route;
                    state = DispatchState::ErrorFallback;
                    self.reset_view(container);
                    continue;
                }
                (DispatchState::Normal, other) => {
                    warn!("[ID{}]模块执行失败({:?})，改用错误路由", id, other);
                }
                (DispatchState::ErrorFallback, other) => {
                    error!("[ID{}]错误路由执行失败({:?})，返回500", id, other);
                    return status_page(500);
                }
            }

            *route = Route::error();
            state = DispatchState::ErrorFallback;
            self.reset_view(container);
        }
    }

    /// 丢弃失败 action 留下的内容，保留本请求选定的视图类型
    fn reset_view(&self, container: &Container) {
        let mut view = container.view();
        let kind = view.kind();
        *view = self.fresh_view(kind);
    }

    fn fresh_view(&self, kind: ViewKind) -> View {
        let mut view = View::new(kind);
        view.set_main_template(&self.main_template);
        view
    }
}

fn execute(container: &Container, route: &Route) -> ModuleResult {
    ModuleLoader::new(container).execute_module(
        route.module().unwrap_or(""),
        route.controller().unwrap_or(""),
        route.action().unwrap_or(""),
        route,
        false,
    )
}

/// 先锁会话再锁视图，与控制器内的加锁顺序无关，因为此时 action 已经返回
fn render(container: &Container) -> Rendered {
    let mut session = container.session();
    let mut view = container.view();
    view.pre_dispatch(&mut session);
    view.dispatch()
}

/// 不依赖任何模块的最小状态页
pub fn status_page(code: u16) -> Rendered {
    Rendered {
        status: code,
        content_type: HTML_CONTENT_TYPE.to_string(),
        body: HtmlBuilder::from_status_code(code, None).build(),
    }
}
