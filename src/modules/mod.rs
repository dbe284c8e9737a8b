// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内置模块
//!
//! - `error`：固定错误路由 `error/index/error404` 的目标，框架运行必需。
//! - `blog`：演示模块，展示页面嵌入、结果缓存、权限检查与 404 中止。

pub mod blog;
pub mod error;

use crate::loader::Loader;

/// 登记框架运行所必需的模块
pub fn register_builtin(loader: &mut Loader) {
    loader.register::<error::IndexController>(r"Bang\Modules\Error\indexController");
}

/// 登记全部内置模块
pub fn register_all(loader: &mut Loader) {
    register_builtin(loader);
    loader.register::<blog::PostController>(r"Bang\Modules\Blog\postController");
    loader.register::<blog::AdminController>(r"Bang\Modules\Blog\adminController");
}
