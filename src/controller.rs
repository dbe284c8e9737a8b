// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 控制器接口
//!
//! 每个模块控制器实现 `Controller`，并在 `actions()` 中登记
//! action 方法名到处理函数的映射。模块装载器只通过类型擦除后的
//! `ControllerObject` 与控制器交互。

use crate::{container::Container, exception::Exception, param::ACTION_SUFFIX, route::Route};

/// action 的返回值：`Some` 为可嵌入的渲染结果；
/// `Err(Exception::Halt(code))` 表示以指定状态码结束请求
pub type ActionResult = Result<Option<String>, Exception>;

pub type ActionHandler<C> = fn(&mut C, &Route) -> ActionResult;

/// action 方法名（含 `Action` 后缀）到处理函数的映射
pub struct ActionTable<C> {
    handlers: Vec<(String, ActionHandler<C>)>,
}

impl<C> ActionTable<C> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// 登记 action，`view` 会被登记为 `viewAction`
    pub fn action(mut self, name: &str, handler: ActionHandler<C>) -> Self {
        self.handlers
            .push((format!("{}{}", name, ACTION_SUFFIX), handler));
        self
    }

    pub fn get(&self, method: &str) -> Option<ActionHandler<C>> {
        self.handlers
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, handler)| *handler)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.get(method).is_some()
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(name, _)| name.as_str())
    }
}

impl<C> Default for ActionTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Controller: Sized + 'static {
    /// 由模块装载器实例化，注入请求级依赖容器
    fn new(container: &Container) -> Self;

    /// 每个控制器都必须至少提供 `indexAction`
    fn actions() -> ActionTable<Self>;

    /// 权限检查，返回 false 时请求以 403 结束
    fn test_permissions(&self) -> bool {
        true
    }
}

/// 类型擦除后的控制器实例
pub trait ControllerObject {
    fn has_action(&self, method: &str) -> bool;
    fn test_permissions(&self) -> bool;
    /// action 不存在时返回 `None`
    fn invoke(&mut self, method: &str, params: &Route) -> Option<ActionResult>;
}

struct Bound<C> {
    controller: C,
    table: ActionTable<C>,
}

impl<C: Controller> ControllerObject for Bound<C> {
    fn has_action(&self, method: &str) -> bool {
        self.table.contains(method)
    }

    fn test_permissions(&self) -> bool {
        self.controller.test_permissions()
    }

    fn invoke(&mut self, method: &str, params: &Route) -> Option<ActionResult> {
        let handler = self.table.get(method)?;
        Some(handler(&mut self.controller, params))
    }
}

pub type ControllerFactory = fn(&Container) -> Box<dyn ControllerObject>;

/// 实例化控制器 `C` 并擦除其类型
pub fn instantiate<C: Controller>(container: &Container) -> Box<dyn ControllerObject> {
    Box::new(Bound {
        controller: C::new(container),
        table: C::actions(),
    })
}
