// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # bang 服务端
//!
//! 基于 Tokio 运行时的多线程 HTTP 服务：
//! - 每个连接解析一次请求头，交给调度器执行 module/controller/action
//! - 带扩展名的路径落入静态文件处理，从 `www_root` 读取
//! - 错误日志写入 SQLite 数据库，数据库无法打开时改写 JSON Lines 文件
//! - 后台管理控制台（stdin 指令：`stop` / `status` / `help`）

use bang::{
    config::Config,
    db::{self, Database, SqliteStore},
    dispatcher::{DispatchOutcome, Dispatcher, RequestContext},
    error_log::{ErrorLog, ErrorLogStore, JsonLinesStore},
    exception::Exception,
    loader::Loader,
    module_loader::DirectoryCatalog,
    modules,
    param::HttpRequestMethod,
    request::Request,
    response::Response,
    view::ViewKind,
    ResultCache,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    path::{Component, Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

const READ_BUFFER_SIZE: usize = 4096;

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        process::exit(1);
    }

    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            error!("无法载入配置文件：{}", e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建Tokio运行时：{}", e);
            process::exit(1);
        }
    };
    info!("工作线程数：{}", config.worker_threads());

    runtime.block_on(serve(config));
}

fn build_dispatcher(config: &Config) -> Dispatcher {
    let mut loader = Loader::new();
    modules::register_all(&mut loader);

    let cache = match config.cache_enabled() {
        true => {
            info!("结果缓存已启用，容量{}", config.cache_size());
            Some(Arc::new(Mutex::new(ResultCache::from_capacity(
                config.cache_size(),
            ))))
        }
        false => None,
    };

    let conn = match db::open(config.db_path(), config.db_suffix()) {
        Ok(conn) => {
            info!("数据库已打开：{:?}", config.db_path());
            Some(conn)
        }
        Err(e) => {
            warn!("{}：{:?}，数据库功能不可用", e, config.db_path());
            None
        }
    };

    let store: Box<dyn ErrorLogStore> = match &conn {
        Some(conn) => Box::new(SqliteStore::new(Arc::clone(conn), config.db_suffix())),
        None => {
            let store = JsonLinesStore::new(config.log_dir(), config.db_suffix());
            info!("错误日志将写入{:?}", store.path());
            Box::new(store)
        }
    };
    let error_log = Arc::new(ErrorLog::new(
        store,
        config.app_errorlog(),
        config.db_errorlog(),
    ));

    let catalog = DirectoryCatalog::new(config.app_path());
    info!("应用目录：{:?}", config.app_path());

    let mut dispatcher = Dispatcher::new(
        Arc::new(loader),
        Arc::new(catalog),
        Arc::clone(&error_log),
        ViewKind::from_config(config.view()),
    )
    .with_main_template(config.main_template());

    if let Some(conn) = conn {
        let mut database = Database::new(conn, config.db_suffix(), error_log)
            .with_slowlog(config.db_slowlog())
            .with_max_cache_time(config.db_max_cache_time());
        if let Some(cache) = &cache {
            database = database.with_cache(Arc::clone(cache));
        }
        if let Err(e) = modules::blog::install(&database) {
            warn!("博客模块数据表初始化失败：{}", e);
        }
        dispatcher = dispatcher.with_database(Arc::new(database));
    }

    match cache {
        Some(cache) => dispatcher.with_cache(cache),
        None => dispatcher,
    }
}

async fn serve(config: Config) {
    let dispatcher = Arc::new(build_dispatcher(&config));
    let root = Arc::new(PathBuf::from(config.www_root()));
    info!("www root: {:?}", root);

    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);

    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));
    tokio::spawn(console(Arc::clone(&shutdown), Arc::clone(&active_connection)));

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let dispatcher = Arc::clone(&dispatcher);
        let root = Arc::clone(&root);
        let active_connection = Arc::clone(&active_connection);
        let peer = addr.ip().to_string();
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, &peer, dispatcher, &root).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}

/// 后台管理控制台
async fn console(shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            "status" => {
                println!("== bang 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("================");
            }
            "help" => {
                println!("== bang Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("===============");
            }
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    peer: &str,
    dispatcher: Arc<Dispatcher>,
    root: &Path,
) {
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    if let Err(e) = stream.readable().await {
        error!("[ID{}]等待TCPStream可读时遇到错误: {}", id, e);
        return;
    }
    let len = match stream.try_read(&mut buffer) {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    let start_time = Instant::now();

    let request = match Request::try_from(&buffer[..len], id) {
        Ok(request) => request,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
            let _ = stream.write_all(response.as_bytes()).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = if request.method() == HttpRequestMethod::Options {
        Response::options()
    } else {
        let ctx = RequestContext::new(id, request.path(), request.client_ip(Some(peer)).as_deref())
            .with_accept(request.accept());
        let outcome = tokio::task::spawn_blocking(move || dispatcher.dispatch(&ctx)).await;
        match outcome {
            Ok(DispatchOutcome::Rendered(rendered)) => {
                Response::from_rendered(&rendered, &request, id)
            }
            Ok(DispatchOutcome::Static) => serve_static(&request, root, id).await,
            Err(e) => {
                error!("[ID{}]调度任务异常终止: {}", id, e);
                Response::from_status_code(500, &request, id)
            }
        }
    };

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, {}ms",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
        start_time.elapsed().as_millis()
    );

    if let Err(e) = stream.write_all(&response.as_bytes()).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

async fn serve_static(request: &Request, root: &Path, id: u128) -> Response {
    let path = match static_path(root, request.path_without_query()) {
        Ok(path) => path,
        Err(e) => {
            warn!("[ID{}]请求的路径：{} 非法({})，返回400", id, request.path(), e);
            return Response::from_status_code(400, request, id);
        }
    };
    match tokio::fs::read(&path).await {
        Ok(data) => Response::from_file(&path, data, request, id),
        Err(e) => {
            warn!("[ID{}]{}：{:?}({})，返回404", id, Exception::FileNotFound, path, e);
            Response::from_status_code(404, request, id)
        }
    }
}

/// 把请求路径映射到 `root` 之下，拒绝 `..` 等越界成分
fn static_path(root: &Path, uri_path: &str) -> Result<PathBuf, Exception> {
    let relative = Path::new(uri_path.trim_start_matches('/'));
    let mut full_path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => full_path.push(part),
            Component::CurDir => {}
            _ => return Err(Exception::InvalidPath),
        }
    }
    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path_stays_under_root() {
        let root = Path::new("/srv/www");
        assert_eq!(
            static_path(root, "/css/style.css").unwrap(),
            PathBuf::from("/srv/www/css/style.css")
        );
        assert_eq!(
            static_path(root, "/./style.css").unwrap(),
            PathBuf::from("/srv/www/style.css")
        );
        assert_eq!(
            static_path(root, "/../etc/passwd.txt").unwrap_err(),
            Exception::InvalidPath
        );
        assert_eq!(
            static_path(root, "/css/../../secret.txt").unwrap_err(),
            Exception::InvalidPath
        );
    }
}
