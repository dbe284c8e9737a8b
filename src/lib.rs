// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # bang
//!
//! module/controller/action 三段式路由与调度框架。
//!
//! 一次请求的生命周期：
//! `Router::get_route` -> `Dispatcher` 组装 `Container` ->
//! `ModuleLoader::execute_module` -> 控制器 action -> `View` 组装页面。

pub mod cache;
pub mod config;
pub mod container;
pub mod controller;
pub mod db;
pub mod dispatcher;
pub mod error_log;
pub mod exception;
pub mod loader;
pub mod module_loader;
pub mod modules;
pub mod param;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod session;
pub mod util;
pub mod validator;
pub mod view;

pub use cache::ResultCache;
pub use container::Container;
pub use controller::{ActionResult, ActionTable, Controller};
pub use db::Database;
pub use dispatcher::{DispatchOutcome, Dispatcher, RequestContext};
pub use error_log::{ErrorLog, ErrorType};
pub use exception::Exception;
pub use loader::Loader;
pub use module_loader::{ModuleLoader, ModuleResult};
pub use request::Request;
pub use response::Response;
pub use route::Route;
pub use router::{RouteOutcome, Router};
pub use util::HtmlBuilder;
pub use validator::{validate, Kind};
