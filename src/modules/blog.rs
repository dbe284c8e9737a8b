// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 演示用博客模块
//!
//! 容器中有数据库时从 `{suffix}posts` 表读取文章并缓存查询结果，
//! 否则使用内置的几篇文章。

use log::debug;
use rusqlite::params;

use crate::{
    container::Container,
    controller::{ActionResult, ActionTable, Controller},
    db::Database,
    exception::Exception,
    route::Route,
    util::escape_html,
    validator::{validate, Kind},
};

/// 单篇文章查询结果的缓存有效期（秒）
const POST_CACHE_TTL: u64 = 60;

const POSTS: &[(i64, &str, &str)] = &[
    (1, "Hello bang", "The first post."),
    (2, "Routing", "module/controller/action plus extra pairs."),
    (42, "The answer", "Rendered from the blog module."),
];

/// 建表并写入内置文章，已存在的文章保持不变
pub fn install(db: &Database) -> Result<(), Exception> {
    let table = db.table("posts");
    db.transaction(|tx| {
        tx.execute_batch(&format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL
            )"#,
            table
        ))?;
        let insert = format!(
            r#"INSERT OR IGNORE INTO "{}" (id, title, body) VALUES (?1, ?2, ?3)"#,
            table
        );
        for (id, title, body) in POSTS {
            tx.execute(&insert, params![id, title, body])?;
        }
        Ok(())
    })
}

struct Post {
    id: i64,
    title: String,
    body: String,
}

fn builtin_post(id: i64) -> Option<Post> {
    POSTS
        .iter()
        .find(|(post_id, _, _)| *post_id == id)
        .map(|(id, title, body)| Post {
            id: *id,
            title: title.to_string(),
            body: body.to_string(),
        })
}

fn post_from_row(row: &crate::db::Row) -> Option<Post> {
    Some(Post {
        id: row.get("id")?.as_i64()?,
        title: row.get("title")?.as_str()?.to_string(),
        body: row
            .get("body")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

pub struct PostController {
    container: Container,
}

impl PostController {
    fn index(&mut self, _params: &Route) -> ActionResult {
        // 嵌入调用前不能持有视图锁
        let recent = self
            .container
            .render_module_call("blog", "post", "recent", &Route::new())
            .unwrap_or_default();

        let mut view = self.container.view();
        view.set_title("Blog");
        view.set_module_content("blog", &recent);
        Ok(None)
    }

    fn view(&mut self, params: &Route) -> ActionResult {
        let id = match params.get("id") {
            Some(raw) if validate(raw, Kind::Int, 20) => raw.parse::<i64>().ok(),
            _ => None,
        };
        let id = id.ok_or(Exception::Halt(404))?;
        let post = self.find_post(id)?.ok_or(Exception::Halt(404))?;
        let html = format!(
            "<article><h2>{}</h2><p>{}</p></article>",
            escape_html(&post.title),
            escape_html(&post.body)
        );

        let mut view = self.container.view();
        view.set_title("Blog");
        view.set_tpl_var("id", id);
        view.set_module_content("blog", &html);
        Ok(Some(html))
    }

    fn recent(&mut self, _params: &Route) -> ActionResult {
        let items: String = self
            .list_posts()?
            .iter()
            .map(|post| {
                format!(
                    r#"<li><a href="/blog/post/view/id/{}">{}</a></li>"#,
                    post.id,
                    escape_html(&post.title)
                )
            })
            .collect();
        Ok(Some(format!("<ul>{}</ul>", items)))
    }

    fn find_post(&self, id: i64) -> Result<Option<Post>, Exception> {
        let Some(db) = self.container.db() else {
            return Ok(builtin_post(id));
        };
        let sql = format!(
            r#"SELECT id, title, body FROM "{}" WHERE id = ?1"#,
            db.table("posts")
        );
        let cache_key = format!("blog:post:{}", id);
        let row = db.fetch_one(&sql, &[&id], Some((cache_key.as_str(), POST_CACHE_TTL)))?;
        debug!("读取文章{}", id);
        Ok(row.as_ref().and_then(post_from_row))
    }

    /// 按编号倒序
    fn list_posts(&self) -> Result<Vec<Post>, Exception> {
        let Some(db) = self.container.db() else {
            return Ok(POSTS
                .iter()
                .rev()
                .filter_map(|(id, _, _)| builtin_post(*id))
                .collect());
        };
        let sql = format!(
            r#"SELECT id, title FROM "{}" ORDER BY id DESC"#,
            db.table("posts")
        );
        let rows = db.fetch_all(&sql, &[], None)?;
        Ok(rows.iter().filter_map(post_from_row).collect())
    }
}

impl Controller for PostController {
    fn new(container: &Container) -> Self {
        Self {
            container: container.clone(),
        }
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new()
            .action("index", Self::index)
            .action("view", Self::view)
            .action("recent", Self::recent)
    }
}

/// 只有已登录用户可以访问
pub struct AdminController {
    container: Container,
}

impl AdminController {
    fn index(&mut self, _params: &Route) -> ActionResult {
        let username = self
            .container
            .session()
            .user()
            .get("username")
            .cloned()
            .unwrap_or_default();

        let mut view = self.container.view();
        view.set_title("Admin");
        view.set_module_content(
            "admin",
            &format!("<p>Welcome, {}</p>", escape_html(&username)),
        );
        Ok(None)
    }
}

impl Controller for AdminController {
    fn new(container: &Container) -> Self {
        Self {
            container: container.clone(),
        }
    }

    fn actions() -> ActionTable<Self> {
        ActionTable::new().action("index", Self::index)
    }

    fn test_permissions(&self) -> bool {
        self.container.session().logged_in()
    }
}
