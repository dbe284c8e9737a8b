// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 数据库封装
//!
//! 基于 SQLite 的查询封装，由调度器放入依赖容器供控制器使用：
//! - 参数化查询，结果行以 JSON 对象返回
//! - `fetch_*` 可带缓存键与有效期，命中时不访问数据库
//! - 打开 `slowlog` 后每条 SELECT 的耗时与调用位置写入 `{suffix}slow_query_log`
//! - SQL 失败时写入一条 `Db` 类别的错误日志并返回 `Exception::QueryFailed`
//!
//! 同一个连接也供 `SqliteStore` 写入 `{suffix}error_log` 表。
//! 连接锁在写错误日志之前必须释放，否则会与 `SqliteStore` 互相等待。

use std::{
    fs, io,
    panic::Location,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use bytes::Bytes;
use chrono::Local;
use log::{debug, error, warn};
use rusqlite::{params, types::ValueRef, Connection, ToSql, Transaction};
use serde_json::{Map, Value};

use crate::{
    cache::ResultCache,
    error_log::{ErrorLog, ErrorLogEntry, ErrorLogStore, ErrorType, LOGTIME_FORMAT},
    exception::Exception,
    validator::{validate, Kind},
};

/// `fetch_*` 缓存有效期上限的默认值（秒）
pub const DEFAULT_MAX_CACHE_TIME: u64 = 3600;

const SUFFIX_MAX_LEN: usize = 32;
const CACHE_KEY_PREFIX: &str = "db:";

pub type SharedConnection = Arc<Mutex<Connection>>;

/// 一行查询结果，列名 -> 值
pub type Row = Map<String, Value>;

/// 打开（或创建）数据库文件，并建好错误日志与慢查询日志两张表
pub fn open(path: &Path, suffix: &str) -> Result<SharedConnection, Exception> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("无法创建数据库目录{:?}：{}", parent, e);
                return Err(Exception::DatabaseUnavailable);
            }
        }
    }
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(e) => {
            error!("无法打开数据库{:?}：{}", path, e);
            return Err(Exception::DatabaseUnavailable);
        }
    };
    prepare(conn, suffix)
}

pub fn open_in_memory(suffix: &str) -> Result<SharedConnection, Exception> {
    match Connection::open_in_memory() {
        Ok(conn) => prepare(conn, suffix),
        Err(e) => {
            error!("无法创建内存数据库：{}", e);
            Err(Exception::DatabaseUnavailable)
        }
    }
}

/// 表名前缀会被拼进 SQL，只允许字母数字、`-` 与 `_`
fn valid_suffix(suffix: &str) -> bool {
    suffix.is_empty() || validate(suffix, Kind::Keys, SUFFIX_MAX_LEN)
}

fn prepare(conn: Connection, suffix: &str) -> Result<SharedConnection, Exception> {
    if !valid_suffix(suffix) {
        error!("非法的表名前缀：{}", suffix);
        return Err(Exception::DatabaseUnavailable);
    }
    let schema = format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{0}error_log" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            location TEXT NOT NULL,
            logtime TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS "{0}slow_query_log" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            query TEXT NOT NULL,
            timeused REAL NOT NULL,
            method TEXT NOT NULL,
            file TEXT NOT NULL,
            line INTEGER NOT NULL,
            date TEXT NOT NULL
        );
        "#,
        suffix
    );
    if let Err(e) = conn.execute_batch(&schema) {
        error!("无法创建日志表：{}", e);
        return Err(Exception::DatabaseUnavailable);
    }
    Ok(Arc::new(Mutex::new(conn)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("数据库锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

fn is_select(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .map_or(false, |word| word.eq_ignore_ascii_case("select"))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}

fn query_rows(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Map::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        result.push(map);
    }
    Ok(result)
}

/// 慢查询日志中的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct SlowQuery {
    pub query: String,
    /// 秒
    pub timeused: f64,
    pub method: String,
    pub file: String,
    pub line: u32,
    pub date: String,
}

pub struct Database {
    conn: SharedConnection,
    suffix: String,
    error_log: Arc<ErrorLog>,
    cache: Option<Arc<Mutex<ResultCache>>>,
    slowlog: AtomicBool,
    max_cache_time: u64,
}

impl Database {
    pub fn new(conn: SharedConnection, suffix: &str, error_log: Arc<ErrorLog>) -> Self {
        Self {
            conn,
            suffix: suffix.to_string(),
            error_log,
            cache: None,
            slowlog: AtomicBool::new(false),
            max_cache_time: DEFAULT_MAX_CACHE_TIME,
        }
    }

    pub fn with_cache(mut self, cache: Arc<Mutex<ResultCache>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_slowlog(self, enabled: bool) -> Self {
        self.set_slowlog(enabled);
        self
    }

    /// 超过上限的缓存请求不会被缓存
    pub fn with_max_cache_time(mut self, secs: u64) -> Self {
        self.max_cache_time = secs;
        self
    }

    pub fn set_slowlog(&self, enabled: bool) {
        self.slowlog.store(enabled, Ordering::SeqCst);
    }

    /// 带前缀的表名，`posts` -> `{suffix}posts`
    pub fn table(&self, name: &str) -> String {
        format!("{}{}", self.suffix, name)
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.conn
    }

    /// 执行一条不返回结果行的语句，返回受影响的行数
    #[track_caller]
    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, Exception> {
        let caller = Location::caller();
        let started = Instant::now();
        let result = lock(&self.conn).execute(sql, params);
        match result {
            Ok(count) => {
                self.save_slow_query(sql, started, "execute", caller);
                Ok(count)
            }
            Err(e) => Err(self.fail(sql, e, "execute", caller)),
        }
    }

    /// 取回全部结果行。`cache` 为 `(缓存键, 有效期秒数)`，有效期为 0 或超过上限时不缓存
    #[track_caller]
    pub fn fetch_all(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        cache: Option<(&str, u64)>,
    ) -> Result<Vec<Row>, Exception> {
        self.fetch("fetch_all", sql, params, cache, Location::caller())
    }

    #[track_caller]
    pub fn fetch_one(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        cache: Option<(&str, u64)>,
    ) -> Result<Option<Row>, Exception> {
        let rows = self.fetch("fetch_one", sql, params, cache, Location::caller())?;
        Ok(rows.into_iter().next())
    }

    /// 在一个事务中执行 `f`，`f` 返回错误时回滚
    #[track_caller]
    pub fn transaction<T, F>(&self, f: F) -> Result<T, Exception>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
    {
        let caller = Location::caller();
        let result = {
            let mut conn = lock(&self.conn);
            let result = conn.transaction().and_then(|tx| {
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            });
            result
        };
        result.map_err(|e| self.fail("BEGIN ... COMMIT", e, "transaction", caller))
    }

    pub fn last_insert_id(&self) -> i64 {
        lock(&self.conn).last_insert_rowid()
    }

    /// 当前库中的全部用户表名，可用作表名白名单
    pub fn table_names(&self) -> Result<Vec<String>, Exception> {
        let result = {
            let conn = lock(&self.conn);
            let names = conn
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .and_then(|mut stmt| {
                    let names = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<rusqlite::Result<Vec<String>>>();
                    names
                });
            names
        };
        result.map_err(|e| {
            error!("无法读取表名：{}", e);
            Exception::DatabaseUnavailable
        })
    }

    /// 按写入顺序读回慢查询日志
    pub fn slow_queries(&self) -> Result<Vec<SlowQuery>, Exception> {
        let sql = format!(
            r#"SELECT query, timeused, method, file, line, date FROM "{}" ORDER BY id"#,
            self.table("slow_query_log")
        );
        let result = {
            let conn = lock(&self.conn);
            let queries = conn.prepare(&sql).and_then(|mut stmt| {
                let queries = stmt
                    .query_map([], |row| {
                        Ok(SlowQuery {
                            query: row.get(0)?,
                            timeused: row.get(1)?,
                            method: row.get(2)?,
                            file: row.get(3)?,
                            line: row.get(4)?,
                            date: row.get(5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<SlowQuery>>>();
                queries
            });
            queries
        };
        result.map_err(|e| {
            error!("无法读取慢查询日志：{}", e);
            Exception::DatabaseUnavailable
        })
    }

    fn fetch(
        &self,
        method: &str,
        sql: &str,
        params: &[&dyn ToSql],
        cache: Option<(&str, u64)>,
        caller: &Location<'_>,
    ) -> Result<Vec<Row>, Exception> {
        let cache_slot = cache.and_then(|(key, ttl)| self.cache_slot(key, ttl));
        if let Some((key, _)) = &cache_slot {
            if let Some(rows) = self.cached_rows(key) {
                debug!("查询命中缓存：{}", key);
                return Ok(rows);
            }
        }

        let started = Instant::now();
        let result = query_rows(&lock(&self.conn), sql, params);
        let rows = result.map_err(|e| self.fail(sql, e, method, caller))?;
        self.save_slow_query(sql, started, method, caller);

        if let Some((key, ttl)) = cache_slot {
            self.store_rows(&key, &rows, ttl);
        }
        Ok(rows)
    }

    fn cache_slot(&self, key: &str, ttl: u64) -> Option<(String, u64)> {
        self.cache.as_ref()?;
        if ttl == 0 {
            return None;
        }
        if ttl > self.max_cache_time {
            warn!(
                "查询缓存有效期{}秒超过上限{}秒，本次结果不缓存",
                ttl, self.max_cache_time
            );
            return None;
        }
        Some((format!("{}{}", CACHE_KEY_PREFIX, key), ttl))
    }

    /// 空结果集视为未命中
    fn cached_rows(&self, key: &str) -> Option<Vec<Row>> {
        let cache = self.cache.as_ref()?;
        let bytes = lock(cache).find(key).cloned()?;
        serde_json::from_slice::<Vec<Row>>(&bytes)
            .ok()
            .filter(|rows| !rows.is_empty())
    }

    fn store_rows(&self, key: &str, rows: &[Row], ttl: u64) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match serde_json::to_vec(rows) {
            Ok(json) => lock(cache).push(key, Bytes::from(json), ttl),
            Err(e) => warn!("查询结果无法序列化，跳过缓存：{}", e),
        }
    }

    fn save_slow_query(&self, sql: &str, started: Instant, method: &str, caller: &Location<'_>) {
        if !self.slowlog.load(Ordering::SeqCst) || !is_select(sql) {
            return;
        }
        let timeused = started.elapsed().as_secs_f64();
        let insert = format!(
            r#"INSERT INTO "{}" (query, timeused, method, file, line, date)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            self.table("slow_query_log")
        );
        let date = Local::now().format(LOGTIME_FORMAT).to_string();
        let result = lock(&self.conn).execute(
            &insert,
            params![sql, timeused, method, caller.file(), caller.line(), date],
        );
        if let Err(e) = result {
            warn!("写入慢查询日志失败：{}", e);
        }
    }

    /// 调用前必须已经释放连接锁
    fn fail(&self, sql: &str, e: rusqlite::Error, method: &str, caller: &Location<'_>) -> Exception {
        warn!("{}：{}", Exception::QueryFailed, e);
        self.error_log.record(
            &ErrorType::Db,
            &format!("{} | Query -> {}", e, sql),
            &format!(
                "{} -> Line {} -> Database::{}",
                caller.file(),
                caller.line(),
                method
            ),
        );
        Exception::QueryFailed
    }
}

/// 把错误日志写入 `{suffix}error_log` 表
pub struct SqliteStore {
    conn: SharedConnection,
    table: String,
}

impl SqliteStore {
    pub fn new(conn: SharedConnection, suffix: &str) -> Self {
        Self {
            conn,
            table: format!("{}error_log", suffix),
        }
    }

    pub fn entries(&self) -> io::Result<Vec<ErrorLogEntry>> {
        let sql = format!(
            r#"SELECT type, message, location, logtime FROM "{}" ORDER BY id"#,
            self.table
        );
        let conn = lock(&self.conn);
        let entries = conn.prepare(&sql).and_then(|mut stmt| {
            let entries = stmt
                .query_map([], |row| {
                    Ok(ErrorLogEntry {
                        kind: row.get(0)?,
                        message: row.get(1)?,
                        location: row.get(2)?,
                        logtime: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<ErrorLogEntry>>>();
            entries
        });
        entries.map_err(to_io)
    }
}

impl ErrorLogStore for SqliteStore {
    fn insert(&self, entry: &ErrorLogEntry) -> io::Result<()> {
        let sql = format!(
            r#"INSERT INTO "{}" (type, message, location, logtime) VALUES (?1, ?2, ?3, ?4)"#,
            self.table
        );
        let result = lock(&self.conn).execute(
            &sql,
            params![entry.kind, entry.message, entry.location, entry.logtime],
        );
        result.map(|_| ()).map_err(to_io)
    }
}

fn to_io(e: rusqlite::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database(suffix: &str) -> (Database, Arc<Mutex<ResultCache>>) {
        let conn = open_in_memory(suffix).unwrap();
        let store = SqliteStore::new(Arc::clone(&conn), suffix);
        let error_log = Arc::new(ErrorLog::new(Box::new(store), true, true));
        let cache = Arc::new(Mutex::new(ResultCache::from_capacity(8)));
        let db = Database::new(conn, suffix, error_log).with_cache(Arc::clone(&cache));
        db.execute(
            &format!(
                r#"CREATE TABLE "{}" (id INTEGER PRIMARY KEY, title TEXT NOT NULL)"#,
                db.table("posts")
            ),
            &[],
        )
        .unwrap();
        (db, cache)
    }

    fn error_entries(db: &Database) -> Vec<ErrorLogEntry> {
        SqliteStore::new(Arc::clone(db.connection()), &db.suffix)
            .entries()
            .unwrap()
    }

    #[test]
    fn test_is_select() {
        assert!(is_select("SELECT 1"));
        assert!(is_select("  select\n id FROM posts"));
        assert!(!is_select("INSERT INTO posts VALUES (1)"));
        assert!(!is_select("selection"));
        assert!(!is_select(""));
    }

    #[test]
    fn test_rejects_unsafe_suffix() {
        assert!(valid_suffix(""));
        assert!(valid_suffix("bang_"));
        assert_eq!(
            open_in_memory("x\"; DROP TABLE").unwrap_err(),
            Exception::DatabaseUnavailable
        );
    }

    #[test]
    fn test_execute_and_fetch_rows_as_json() {
        let (db, _) = database("t_");
        let count = db
            .execute(
                r#"INSERT INTO "t_posts" (id, title) VALUES (?1, ?2)"#,
                &[&7i64, &"Seven"],
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.last_insert_id(), 7);

        let row = db
            .fetch_one(r#"SELECT id, title FROM "t_posts" WHERE id = ?1"#, &[&7i64], None)
            .unwrap()
            .unwrap();
        assert_eq!(row["id"], 7);
        assert_eq!(row["title"], "Seven");
        assert!(db
            .fetch_one(r#"SELECT id FROM "t_posts" WHERE id = ?1"#, &[&8i64], None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_cached_fetch_skips_database() {
        let (db, cache) = database("");
        db.execute("INSERT INTO posts (id, title) VALUES (1, 'first')", &[])
            .unwrap();
        let sql = "SELECT title FROM posts ORDER BY id";

        let first = db.fetch_all(sql, &[], Some(("posts:all", 60))).unwrap();
        assert!(cache.lock().unwrap().find("db:posts:all").is_some());

        // 命中缓存时看不到新写入的行
        db.execute("INSERT INTO posts (id, title) VALUES (2, 'second')", &[])
            .unwrap();
        let second = db.fetch_all(sql, &[], Some(("posts:all", 60))).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 1);

        assert_eq!(db.fetch_all(sql, &[], None).unwrap().len(), 2);
    }

    #[test]
    fn test_cache_time_above_limit_is_not_cached() {
        let (db, cache) = database("");
        let db = db.with_max_cache_time(30);
        db.fetch_all("SELECT id FROM posts", &[], Some(("too-long", 31)))
            .unwrap();
        db.fetch_all("SELECT id FROM posts", &[], Some(("no-ttl", 0)))
            .unwrap();
        assert!(cache.lock().unwrap().is_empty());
    }

    #[test]
    fn test_slowlog_records_selects_only() {
        let (db, _) = database("bang_");
        db.execute(r#"INSERT INTO "bang_posts" (id, title) VALUES (1, 'a')"#, &[])
            .unwrap();
        assert!(db.slow_queries().unwrap().is_empty());

        let db = db.with_slowlog(true);
        db.execute(r#"INSERT INTO "bang_posts" (id, title) VALUES (2, 'b')"#, &[])
            .unwrap();
        let select = r#"SELECT title FROM "bang_posts""#;
        db.fetch_all(select, &[], None).unwrap();

        let logged = db.slow_queries().unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].query, select);
        assert_eq!(logged[0].method, "fetch_all");
        assert!(logged[0].file.ends_with("db.rs"));
        assert!(logged[0].line > 0);
        assert!(logged[0].timeused >= 0.0);
        assert_eq!(logged[0].date.len(), 19);
    }

    #[test]
    fn test_bad_sql_writes_db_entry() {
        let (db, _) = database("");
        assert_eq!(
            db.fetch_all("SELECT nope FROM missing_table", &[], None)
                .unwrap_err(),
            Exception::QueryFailed
        );

        let entries = error_entries(&db);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "Db");
        assert!(entries[0].message.contains("missing_table"));
        assert!(entries[0].location.contains("Database::fetch_all"));
    }

    #[test]
    fn test_disabled_db_errorlog_writes_nothing() {
        let conn = open_in_memory("").unwrap();
        let store = SqliteStore::new(Arc::clone(&conn), "");
        let error_log = Arc::new(ErrorLog::new(Box::new(store), true, false));
        let db = Database::new(Arc::clone(&conn), "", error_log);

        assert!(db.execute("DELETE FROM missing_table", &[]).is_err());
        assert!(SqliteStore::new(conn, "").entries().unwrap().is_empty());
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let (db, _) = database("");
        let result = db.transaction(|tx| {
            tx.execute("INSERT INTO posts (id, title) VALUES (1, 'kept?')", [])?;
            tx.execute("INSERT INTO nowhere VALUES (1)", [])?;
            Ok(())
        });
        assert_eq!(result, Err(Exception::QueryFailed));
        assert!(db.fetch_all("SELECT id FROM posts", &[], None).unwrap().is_empty());
        assert_eq!(error_entries(&db).len(), 1);
    }

    #[test]
    fn test_table_names_lists_log_tables() {
        let (db, _) = database("bang_");
        assert_eq!(
            db.table_names().unwrap(),
            vec!["bang_error_log", "bang_posts", "bang_slow_query_log"]
        );
    }

    #[test]
    fn test_store_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("bang.sqlite");
        let conn = open(&path, "").unwrap();
        assert!(path.exists());

        let store = SqliteStore::new(conn, "");
        store
            .insert(&ErrorLogEntry::new(&ErrorType::App, "m", "l"))
            .unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "App");
    }
}
