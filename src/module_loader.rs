// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模块装载器
//!
//! 对一个已校验的路由，解析并调用恰好一个控制器 action。
//!
//! ## 执行步骤：
//! 1. 以与路由器相同的规则再次校验 module / controller / action。
//! 2. 检查模块目录与控制器清单文件是否存在。
//! 3. 为模块登记控制器与模型两个命名空间。
//! 4. 拼出控制器完整类型名与 action 方法名。
//! 5. 通过加载器解析控制器类型并实例化，注入依赖容器。
//! 6. 检查 action 是否存在并调用。
//!
//! 每条失败路径都会先写入一条 `App` 类别的错误日志，再以 `ModuleResult`
//! 告知调用方，绝不把错误继续向上传播。

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};

use crate::{
    container::Container,
    error_log::{ErrorLog, ErrorType},
    exception::Exception,
    loader::Loader,
    param::{
        ACTION_MAX_LEN, ACTION_SUFFIX, CONTROLLER_MANIFEST_EXT, CONTROLLER_SUFFIX,
        MODULE_MAX_LEN, MODULE_NAMESPACE,
    },
    route::Route,
    util::{escape_html, ucfirst},
    validator::{validate, Kind},
};

/// 生成 `文件 -> Line 行号 -> 方法` 形式的位置描述
macro_rules! location {
    ($method:expr) => {
        format!("{} -> Line {} -> {}", file!(), line!(), $method)
    };
}

/// 模块装载的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleResult {
    /// action 已执行（仅副作用）
    Executed,
    /// action 已执行，调用方需要它的输出
    Output(String),
    /// 模块目录或控制器清单不存在
    NotFound(Exception),
    /// 类型无法解析、action 不存在或 action 执行出错
    Failed(Exception),
    /// action 要求以指定状态码结束请求
    Halted(u16),
    /// 参数未通过校验，携带调用方应当改用的固定错误路由
    Invalid(Route),
}

impl ModuleResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ModuleResult::Executed | ModuleResult::Output(_))
    }
}

/// 模块在存储中的布局
pub trait ModuleCatalog: Send + Sync {
    /// 模块根目录
    fn module_dir(&self, module: &str) -> PathBuf;
    fn module_exists(&self, module: &str) -> bool;
    fn controller_exists(&self, module: &str, controller: &str) -> bool;
}

/// 文件系统布局：`{root}/{module}/controllers/{controller}Controller.toml`
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// `app_path` 下的 `modules` 目录作为根
    pub fn new(app_path: &Path) -> Self {
        Self {
            root: app_path.join("modules"),
        }
    }

    fn controller_manifest(&self, module: &str, controller: &str) -> PathBuf {
        self.module_dir(module).join("controllers").join(format!(
            "{}{}.{}",
            controller, CONTROLLER_SUFFIX, CONTROLLER_MANIFEST_EXT
        ))
    }
}

impl ModuleCatalog for DirectoryCatalog {
    fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(module)
    }

    fn module_exists(&self, module: &str) -> bool {
        self.module_dir(module).is_dir()
    }

    fn controller_exists(&self, module: &str, controller: &str) -> bool {
        self.controller_manifest(module, controller).is_file()
    }
}

/// 内存中的模块清单，适合没有模块目录的嵌入场景与测试
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    modules: HashSet<String>,
    controllers: HashSet<(String, String)>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, module: &str, controller: &str) -> Self {
        self.modules.insert(module.to_string());
        self.controllers
            .insert((module.to_string(), controller.to_string()));
        self
    }

    /// 只有目录没有控制器的模块
    pub fn with_module(mut self, module: &str) -> Self {
        self.modules.insert(module.to_string());
        self
    }
}

impl ModuleCatalog for StaticCatalog {
    fn module_dir(&self, module: &str) -> PathBuf {
        Path::new("modules").join(module)
    }

    fn module_exists(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    fn controller_exists(&self, module: &str, controller: &str) -> bool {
        self.controllers
            .contains(&(module.to_string(), controller.to_string()))
    }
}

/// 控制器完整类型名，`blog` + `post` -> `Bang\Modules\Blog\postController`
pub fn controller_type_name(module: &str, controller: &str) -> String {
    format!(
        "{}\\{}\\{}{}",
        MODULE_NAMESPACE,
        ucfirst(module),
        controller,
        CONTROLLER_SUFFIX
    )
}

/// action 方法名，`view` -> `viewAction`
pub fn action_method_name(action: &str) -> String {
    format!("{}{}", action, ACTION_SUFFIX)
}

/// module / controller / action 三者必须同时通过校验
pub fn validate_app_parameters(module: &str, controller: &str, action: &str) -> bool {
    validate(module, Kind::Module, MODULE_MAX_LEN)
        && validate(controller, Kind::Module, MODULE_MAX_LEN)
        && validate(action, Kind::AlphaNum, ACTION_MAX_LEN)
}

pub struct ModuleLoader {
    error_log: Arc<ErrorLog>,
    loader: Arc<Loader>,
    catalog: Arc<dyn ModuleCatalog>,
    container: Container,
}

impl ModuleLoader {
    pub fn new(container: &Container) -> Self {
        Self {
            error_log: Arc::clone(&container.error_log),
            loader: Arc::clone(&container.loader),
            catalog: Arc::clone(&container.catalog),
            container: container.clone(),
        }
    }

    pub fn execute_module(
        &self,
        module: &str,
        controller: &str,
        action: &str,
        params: &Route,
        want_result: bool,
    ) -> ModuleResult {
        if !validate_app_parameters(module, controller, action) {
            warn!("{}，改用固定错误路由", Exception::ValidationFailure);
            self.error_log.record(
                &ErrorType::App,
                &format!(
                    "App Parameter Test | Test failed -> | Module -> {} | Controller  -> {} | Action -> {}",
                    escape_html(module),
                    escape_html(controller),
                    escape_html(action)
                ),
                &location!("ModuleLoader::execute_module"),
            );
            return ModuleResult::Invalid(Route::error());
        }

        let call_site = format!(
            "Module -> {} | Controller -> {} | Action -> {}",
            module, controller, action
        );

        if !self.catalog.module_exists(module) {
            warn!("模块{}不存在", module);
            self.error_log.record(
                &ErrorType::App,
                &format!("Module Loader -> Module {} does not exist", module),
                &format!("{} -> {}", location!("ModuleLoader::execute_module"), call_site),
            );
            return ModuleResult::NotFound(Exception::ModuleNotFound);
        }

        if !self.catalog.controller_exists(module, controller) {
            warn!("模块{}中不存在控制器{}", module, controller);
            self.error_log.record(
                &ErrorType::App,
                &format!(
                    "Action Call | File {}/controllers/{}{}.{} does not exist",
                    module, controller, CONTROLLER_SUFFIX, CONTROLLER_MANIFEST_EXT
                ),
                &format!("{} -> {}", location!("ModuleLoader::execute_module"), call_site),
            );
            return ModuleResult::NotFound(Exception::ControllerNotFound);
        }

        let module_dir = self.catalog.module_dir(module);
        let namespace = format!("{}\\{}", MODULE_NAMESPACE, ucfirst(module));
        self.loader
            .add_namespace(&namespace, &module_dir.join("controllers"));
        self.loader
            .add_namespace(&format!("{}\\Models", namespace), &module_dir.join("models"));

        let controller_to_load = controller_type_name(module, controller);
        let action_method = action_method_name(action);

        self.load_module_controller_action(&controller_to_load, &action_method, params, want_result)
    }

    /// 按完整类型名实例化控制器并调用 action 方法
    pub fn load_module_controller_action(
        &self,
        controller_to_load: &str,
        action_method: &str,
        params: &Route,
        want_result: bool,
    ) -> ModuleResult {
        let call_site = format!(
            "Controller -> {} | ActionMethod -> {}",
            controller_to_load, action_method
        );

        let factory = match self.loader.resolve(controller_to_load) {
            Some(factory) => factory,
            None => {
                // 类型已登记但命名空间缺失，说明调用方跳过了 execute_module
                let reason = match self.loader.is_registered(controller_to_load) {
                    true => "is outside every registered namespace",
                    false => "does not exist",
                };
                self.error_log.record(
                    &ErrorType::App,
                    &format!(
                        "Module Class Exists | Class {} {}.",
                        escape_html(controller_to_load),
                        reason
                    ),
                    &format!(
                        "{} -> {}",
                        location!("ModuleLoader::load_module_controller_action"),
                        call_site
                    ),
                );
                return ModuleResult::Failed(Exception::ClassNotResolved);
            }
        };

        let mut ctrl = factory(&self.container);

        if !ctrl.has_action(action_method) {
            self.error_log.record(
                &ErrorType::App,
                &format!(
                    "Action Call | Method {}/{} does not exist",
                    escape_html(controller_to_load),
                    escape_html(action_method)
                ),
                &format!(
                    "{} -> {}",
                    location!("ModuleLoader::load_module_controller_action"),
                    call_site
                ),
            );
            return ModuleResult::Failed(Exception::ActionNotFound);
        }

        if !ctrl.test_permissions() {
            debug!("{}权限检查未通过", controller_to_load);
            return ModuleResult::Halted(403);
        }

        match ctrl.invoke(action_method, params) {
            Some(Ok(output)) => {
                if want_result {
                    ModuleResult::Output(output.unwrap_or_default())
                } else {
                    ModuleResult::Executed
                }
            }
            Some(Err(Exception::Halt(code))) => {
                debug!("{}以状态码{}结束请求", call_site, code);
                ModuleResult::Halted(code)
            }
            Some(Err(e)) => {
                self.error_log.record(
                    &ErrorType::App,
                    &format!("Action Call | {} failed: {}", escape_html(action_method), e),
                    &format!(
                        "{} -> {}",
                        location!("ModuleLoader::load_module_controller_action"),
                        call_site
                    ),
                );
                ModuleResult::Failed(e)
            }
            None => ModuleResult::Failed(Exception::ActionNotFound),
        }
    }
}
