// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 调度端到端测试
//!
//! 在进程内组装 Router -> Dispatcher -> ModuleLoader -> 内置模块的完整链路，
//! 错误日志写入内存存储以便逐条检查。

use std::{
    fs, io,
    sync::{Arc, Mutex},
};

use bang::{
    db::{self, SqliteStore},
    dispatcher::{status_page, DispatchOutcome, Dispatcher, RequestContext},
    error_log::{ErrorLog, ErrorLogEntry, ErrorLogStore, MemoryStore},
    module_loader::{DirectoryCatalog, ModuleCatalog, ModuleLoader, ModuleResult, StaticCatalog},
    modules,
    route::Route,
    router::{RouteOutcome, Router},
    view::{Rendered, ViewKind},
    Database, Exception, Loader, ResultCache,
};

fn demo_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_controller("error", "index")
        .with_controller("blog", "post")
        .with_controller("blog", "admin")
}

fn setup_with(
    catalog: impl ModuleCatalog + 'static,
    kind: ViewKind,
) -> (Dispatcher, Arc<MemoryStore>) {
    let mut loader = Loader::new();
    modules::register_all(&mut loader);
    let store = Arc::new(MemoryStore::new());
    let error_log = ErrorLog::new(Box::new(Arc::clone(&store)), true, true);
    let dispatcher = Dispatcher::new(
        Arc::new(loader),
        Arc::new(catalog),
        Arc::new(error_log),
        kind,
    );
    (dispatcher, store)
}

fn setup() -> (Dispatcher, Arc<MemoryStore>) {
    setup_with(demo_catalog(), ViewKind::Web)
}

/// 错误日志与博客文章都落在同一个内存 SQLite 库中
fn setup_with_db() -> (Dispatcher, Arc<Database>, Arc<Mutex<ResultCache>>) {
    let mut loader = Loader::new();
    modules::register_all(&mut loader);
    let conn = db::open_in_memory("bang_").unwrap();
    let store = SqliteStore::new(Arc::clone(&conn), "bang_");
    let error_log = Arc::new(ErrorLog::new(Box::new(store), true, true));
    let cache = Arc::new(Mutex::new(ResultCache::from_capacity(8)));
    let database = Arc::new(
        Database::new(conn, "bang_", Arc::clone(&error_log)).with_cache(Arc::clone(&cache)),
    );
    modules::blog::install(&database).unwrap();

    let dispatcher = Dispatcher::new(
        Arc::new(loader),
        Arc::new(demo_catalog()),
        error_log,
        ViewKind::Web,
    )
    .with_database(Arc::clone(&database))
    .with_cache(Arc::clone(&cache));
    (dispatcher, database, cache)
}

fn db_entries(database: &Database) -> Vec<ErrorLogEntry> {
    SqliteStore::new(Arc::clone(database.connection()), "bang_")
        .entries()
        .unwrap()
}

/// 每次写入都失败的存储
struct UnavailableStore;

impl ErrorLogStore for UnavailableStore {
    fn insert(&self, _entry: &ErrorLogEntry) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "error log table is gone"))
    }
}

fn render(dispatcher: &Dispatcher, uri: &str) -> Rendered {
    match dispatcher.dispatch(&RequestContext::new(0, uri, Some("127.0.0.1"))) {
        DispatchOutcome::Rendered(page) => page,
        DispatchOutcome::Static => panic!("{} should be a module route", uri),
    }
}

#[test]
fn test_route_with_query_parameter() {
    let outcome = Router::new().get_route("/blog/post/view?id=42");
    let route = outcome.route().unwrap();
    assert_eq!(
        serde_json::to_string(route).unwrap(),
        r#"{"module":"blog","controller":"post","action":"view","id":"42"}"#
    );
}

#[test]
fn test_static_file_never_reaches_module_loader() {
    let (dispatcher, store) = setup();
    assert_eq!(Router::new().get_route("/style.css"), RouteOutcome::Static);
    assert_eq!(
        dispatcher.dispatch(&RequestContext::new(0, "/style.css", None)),
        DispatchOutcome::Static
    );
    assert!(store.entries().is_empty());
}

#[test]
fn test_empty_path_renders_error_page() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/");
    assert_eq!(page.status, 404);
    assert!(page.body.contains("<h1>404</h1>"));
    assert!(page.body.contains("<title>404</title>"));
    assert!(store.entries().is_empty());
}

#[test]
fn test_unknown_module_is_not_found_with_one_entry() {
    let (dispatcher, store) = setup();
    let container = dispatcher.build_container(&RequestContext::new(0, "/", None));
    let result = ModuleLoader::new(&container).execute_module(
        "doesnotexist",
        "index",
        "indexAction",
        &Route::new(),
        false,
    );

    assert_eq!(result, ModuleResult::NotFound(Exception::ModuleNotFound));
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, "App");
    assert!(entries[0].message.contains("doesnotexist"));
    assert!(entries[0].location.contains("ModuleLoader::execute_module"));
}

#[test]
fn test_view_post_through_extra_pairs() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog/post/view/id/42");
    assert_eq!(page.status, 200);
    assert_eq!(page.content_type, "text/html;charset=utf-8");
    assert!(page.body.contains("<h2>The answer</h2>"));
    assert!(store.entries().is_empty());
}

#[test]
fn test_index_embeds_recent_posts() {
    let (dispatcher, _) = setup();
    let page = render(&dispatcher, "/blog/post/index");
    assert_eq!(page.status, 200);
    assert!(page.body.contains(r#"<a href="/blog/post/view/id/42">The answer</a>"#));
}

#[test]
fn test_missing_post_falls_back_to_error_route() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog/post/view?id=7");
    assert_eq!(page.status, 404);
    assert!(page.body.contains("<h1>404</h1>"));
    // 中途放弃的 action 不会把内容带进错误页
    assert!(!page.body.contains("<article>"));
    // 404 中止不是故障
    assert!(store.entries().is_empty());
}

#[test]
fn test_invalid_segments_use_error_route() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog1/post/view");
    assert_eq!(page.status, 404);
    assert!(store.entries().is_empty());
}

#[test]
fn test_missing_action_logs_and_falls_back() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog/post/delete");
    assert_eq!(page.status, 404);

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("deleteAction"));
}

#[test]
fn test_missing_controller_logs_once() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog/comment/index");
    assert_eq!(page.status, 404);

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("commentController"));
}

#[test]
fn test_unregistered_controller_type_fails() {
    // 清单存在但没有登记控制器类型
    let catalog = demo_catalog().with_controller("shop", "cart");
    let (dispatcher, store) = setup_with(catalog, ViewKind::Web);
    let container = dispatcher.build_container(&RequestContext::new(0, "/", None));
    let result =
        ModuleLoader::new(&container).execute_module("shop", "cart", "index", &Route::new(), false);

    assert_eq!(result, ModuleResult::Failed(Exception::ClassNotResolved));
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains(r"Bang\Modules\Shop\cartController"));
}

#[test]
fn test_invalid_parameters_return_error_route() {
    let (dispatcher, store) = setup();
    let container = dispatcher.build_container(&RequestContext::new(0, "/", None));
    let result = ModuleLoader::new(&container).execute_module(
        "blog",
        "post",
        "<script>",
        &Route::new(),
        false,
    );

    assert_eq!(result, ModuleResult::Invalid(Route::error()));
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("&lt;script&gt;"));
}

#[test]
fn test_admin_requires_login() {
    let (dispatcher, store) = setup();
    let page = render(&dispatcher, "/blog/admin/index");
    assert_eq!(page, status_page(403));
    assert!(page.body.contains("Forbidden"));
    assert!(store.entries().is_empty());
}

#[test]
fn test_admin_after_login() {
    let (dispatcher, _) = setup();
    let ctx = RequestContext::new(0, "/blog/admin/index", None);
    let container = dispatcher.build_container(&ctx);
    container.session().set_to_user("id", "7");

    let mut route = Route::from_core("blog", "admin", "index");
    let page = dispatcher.run(ctx.id, &container, &mut route);
    assert_eq!(page.status, 200);
    assert!(page.body.contains("Welcome, Guest"));
}

#[test]
fn test_want_result_returns_output() {
    let (dispatcher, _) = setup();
    let container = dispatcher.build_container(&RequestContext::new(0, "/", None));
    let loader = ModuleLoader::new(&container);

    match loader.execute_module("blog", "post", "recent", &Route::new(), true) {
        ModuleResult::Output(html) => assert!(html.starts_with("<ul>")),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(
        loader.execute_module("blog", "post", "recent", &Route::new(), false),
        ModuleResult::Executed
    );
}

#[test]
fn test_double_failure_renders_500() {
    // 错误模块缺失，错误路由本身也会失败
    let catalog = StaticCatalog::new().with_controller("blog", "post");
    let (dispatcher, store) = setup_with(catalog, ViewKind::Web);
    let page = render(&dispatcher, "/blog/post/delete");
    assert_eq!(page, status_page(500));
    // 主路由缺少 action，错误路由缺少模块
    assert_eq!(store.entries().len(), 2);
}

#[test]
fn test_responder_view_outputs_json() {
    let (dispatcher, _) = setup_with(demo_catalog(), ViewKind::Responder);
    let page = render(&dispatcher, "/blog/post/view/id/42");
    assert_eq!(page.content_type, "application/json");
    let json: serde_json::Value = serde_json::from_str(&page.body).unwrap();
    assert_eq!(json["id"], 42);

    let page = render(&dispatcher, "/nothing/here/atall");
    assert_eq!(page.status, 404);
    let json: serde_json::Value = serde_json::from_str(&page.body).unwrap();
    assert_eq!(json["error"], "Not Found");
}

#[test]
fn test_post_is_cached_between_requests() {
    let (dispatcher, database, cache) = setup_with_db();

    let first = render(&dispatcher, "/blog/post/view/id/1");
    assert!(first.body.contains("<h2>Hello bang</h2>"));
    assert!(cache.lock().unwrap().find("db:blog:post:1").is_some());

    // 缓存有效期内看不到数据库中的修改
    database
        .execute("UPDATE bang_posts SET title = 'Renamed' WHERE id = 1", &[])
        .unwrap();
    let second = render(&dispatcher, "/blog/post/view/id/1");
    assert_eq!(first.body, second.body);
}

#[test]
fn test_posts_are_read_from_database() {
    let (dispatcher, database, _) = setup_with_db();
    database
        .execute(
            "INSERT INTO bang_posts (id, title, body) VALUES (?1, ?2, ?3)",
            &[&7i64, &"Stored", &"Only in the database."],
        )
        .unwrap();

    let page = render(&dispatcher, "/blog/post/view?id=7");
    assert_eq!(page.status, 200);
    assert!(page.body.contains("<h2>Stored</h2>"));

    let index = render(&dispatcher, "/blog/post/index");
    assert!(index.body.contains(r#"<a href="/blog/post/view/id/7">Stored</a>"#));
    assert!(db_entries(&database).is_empty());
}

#[test]
fn test_query_failure_logs_db_entry_and_falls_back() {
    let (dispatcher, database, _) = setup_with_db();
    database.execute("DROP TABLE bang_posts", &[]).unwrap();

    let page = render(&dispatcher, "/blog/post/view/id/1");
    assert_eq!(page.status, 404);
    assert!(page.body.contains("<h1>404</h1>"));

    let entries = db_entries(&database);
    let kinds: Vec<&str> = entries.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec!["Db", "App"]);
    assert!(entries[0].message.contains("bang_posts"));
    assert!(entries[0].location.contains("Database::fetch_one"));
    assert!(entries[1].message.contains(&Exception::QueryFailed.to_string()));
}

#[test]
fn test_accept_json_renders_responder_page() {
    let (dispatcher, _) = setup();
    let ctx = RequestContext::new(0, "/blog/post/view/id/42", None)
        .with_accept(Some("application/json"));
    let page = match dispatcher.dispatch(&ctx) {
        DispatchOutcome::Rendered(page) => page,
        DispatchOutcome::Static => panic!("expected a rendered page"),
    };
    assert_eq!(page.content_type, "application/json");
    let json: serde_json::Value = serde_json::from_str(&page.body).unwrap();
    assert_eq!(json["id"], 42);

    // 回退到错误路由后仍然输出 JSON
    let ctx = RequestContext::new(1, "/nothing/here/atall", None)
        .with_accept(Some("application/json"));
    match dispatcher.dispatch(&ctx) {
        DispatchOutcome::Rendered(page) => {
            assert_eq!(page.status, 404);
            assert_eq!(page.content_type, "application/json");
        }
        DispatchOutcome::Static => panic!("expected a rendered page"),
    }
}

#[test]
fn test_registered_type_outside_namespace_is_not_resolved() {
    let (dispatcher, store) = setup();
    let container = dispatcher.build_container(&RequestContext::new(0, "/", None));
    // 跳过 execute_module，命名空间尚未登记
    let result = ModuleLoader::new(&container).load_module_controller_action(
        r"Bang\Modules\Blog\postController",
        "viewAction",
        &Route::new(),
        false,
    );

    assert_eq!(result, ModuleResult::Failed(Exception::ClassNotResolved));
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("outside every registered namespace"));
}

#[test]
fn test_logging_failure_does_not_break_request() {
    let mut loader = Loader::new();
    modules::register_all(&mut loader);
    let dispatcher = Dispatcher::new(
        Arc::new(loader),
        Arc::new(demo_catalog()),
        Arc::new(ErrorLog::new(Box::new(UnavailableStore), true, true)),
        ViewKind::Web,
    );

    let page = render(&dispatcher, "/nothing/here/atall");
    assert_eq!(page.status, 404);
    assert!(page.body.contains("<h1>404</h1>"));

    // 缺少 action 同样记录失败后回退到错误页
    let page = render(&dispatcher, "/blog/post/delete");
    assert_eq!(page.status, 404);
}

#[test]
fn test_directory_catalog_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    for (module, controller) in [("error", "index"), ("blog", "post")] {
        let controllers = dir.path().join("modules").join(module).join("controllers");
        fs::create_dir_all(&controllers).unwrap();
        fs::write(controllers.join(format!("{}Controller.toml", controller)), "").unwrap();
    }

    let (dispatcher, store) = setup_with(DirectoryCatalog::new(dir.path()), ViewKind::Web);
    assert_eq!(render(&dispatcher, "/blog/post/view?id=42").status, 200);
    // admin 控制器已登记，但清单文件不存在
    assert_eq!(render(&dispatcher, "/blog/admin/index").status, 404);
    assert_eq!(store.entries().len(), 1);
}
