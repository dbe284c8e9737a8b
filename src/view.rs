// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 视图
//!
//! 模块 action 把内容片段与模板变量交给视图，调度器在 action 成功后调用
//! `pre_dispatch` 组装页面，再调用 `dispatch` 取出最终的响应正文。
//!
//! - `Web`：HTML 页面，由提示消息与各模块片段拼接而成。
//! - `Responder`：JSON 对象，内容为模板变量，适用于 Ajax / API 请求。

use serde_json::{Map, Value};

use crate::{
    session::{Flash, Session},
    util::{escape_html, HtmlBuilder},
    validator::{validate, Kind},
};

const HTML_CONTENT_TYPE: &str = "text/html;charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Web,
    Responder,
}

impl ViewKind {
    /// 配置中的 `web` / `responder`，无法识别时使用 `Web`
    pub fn from_config(name: &str) -> Self {
        match name {
            "responder" => ViewKind::Responder,
            _ => ViewKind::Web,
        }
    }
}

/// 组装完成、等待写回客户端的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct View {
    kind: ViewKind,
    status: u16,
    title: String,
    main_template: String,
    tpl_vars: Map<String, Value>,
    module_content: Vec<(String, String)>,
    page: Option<String>,
}

impl View {
    pub fn new(kind: ViewKind) -> Self {
        Self {
            kind,
            status: 200,
            title: String::new(),
            main_template: "default".to_string(),
            tpl_vars: Map::new(),
            module_content: Vec::new(),
            page: None,
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// 模块可以在 action 中切换视图类型
    pub fn set_kind(&mut self, kind: ViewKind) {
        self.kind = kind;
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn set_main_template(&mut self, template: &str) {
        self.main_template = template.to_string();
    }

    pub fn main_template(&self) -> &str {
        &self.main_template
    }

    /// 设置模板变量，键名必须通过 `Keys` 校验，否则忽略并返回 false
    pub fn set_tpl_var(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if !validate(key, Kind::Keys, 100) {
            return false;
        }
        self.tpl_vars.insert(key.to_string(), value.into());
        true
    }

    pub fn tpl_var(&self, key: &str) -> Option<&Value> {
        self.tpl_vars.get(key)
    }

    /// 登记某个模块渲染好的 HTML 片段，同名片段会被替换
    pub fn set_module_content(&mut self, key: &str, html: &str) {
        match self.module_content.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = html.to_string(),
            None => self.module_content.push((key.to_string(), html.to_string())),
        }
    }

    pub fn module_content(&self, key: &str) -> Option<&str> {
        self.module_content
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 组装页面，一次性提示消息会从会话中取出
    pub fn pre_dispatch(&mut self, session: &mut Session) {
        let page = match self.kind {
            ViewKind::Web => {
                let mut body = format!(r#"<div id="{}">"#, escape_html(&self.main_template));
                for (kind, class) in [
                    (Flash::Error, "error"),
                    (Flash::Warning, "warning"),
                    (Flash::Success, "success"),
                ] {
                    for message in session.take(kind) {
                        body.push_str(&format!(
                            r#"<p class="{}">{}</p>"#,
                            class,
                            escape_html(&message)
                        ));
                    }
                }
                for (_, html) in &self.module_content {
                    body.push_str(html);
                }
                body.push_str("</div>");
                HtmlBuilder::from_body(&self.title, body).build()
            }
            ViewKind::Responder => Value::Object(self.tpl_vars.clone()).to_string(),
        };
        self.page = Some(page);
    }

    /// 取出组装好的页面；未调用 `pre_dispatch` 时正文为空
    pub fn dispatch(&mut self) -> Rendered {
        let content_type = match self.kind {
            ViewKind::Web => HTML_CONTENT_TYPE,
            ViewKind::Responder => JSON_CONTENT_TYPE,
        };
        Rendered {
            status: self.status,
            content_type: content_type.to_string(),
            body: self.page.take().unwrap_or_default(),
        }
    }
}
