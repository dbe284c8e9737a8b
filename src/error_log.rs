// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 诊断错误日志
//!
//! 在检测到故障的那一刻写入一条不可变记录 `{type, message, location, logtime}`。
//! 记录写入后本模块不会修改或删除它。
//!
//! 是否记录由配置中对应类别的开关决定，每次调用时重新读取开关。
//! 存储不可用时返回 `Exception::LoggingFailure`，由调用方决定是否吞掉；
//! `record` 会吞掉该错误并把条目写入进程日志作为本地兜底。

use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use chrono::Local;
use log::{debug, error};
use serde_derive::{Deserialize, Serialize};

use crate::exception::Exception;

/// `logtime` 列的时间格式
pub const LOGTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 错误类别，只用于按配置开关过滤
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    App,
    Db,
    AwsS3,
    Other(String),
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::App => write!(f, "App"),
            ErrorType::Db => write!(f, "Db"),
            ErrorType::AwsS3 => write!(f, "AWS-S3"),
            ErrorType::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for ErrorType {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "app" => ErrorType::App,
            "db" => ErrorType::Db,
            "aws-s3" => ErrorType::AwsS3,
            _ => ErrorType::Other(value.to_string()),
        }
    }
}

/// 一条持久化的错误记录，字段与 `error_log` 表的列一一对应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub location: String,
    pub logtime: String,
}

impl ErrorLogEntry {
    pub fn new(kind: &ErrorType, message: &str, location: &str) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            location: location.to_string(),
            logtime: Local::now().format(LOGTIME_FORMAT).to_string(),
        }
    }
}

/// 错误记录的持久化存储
#[cfg_attr(test, mockall::automock)]
pub trait ErrorLogStore: Send + Sync {
    fn insert(&self, entry: &ErrorLogEntry) -> io::Result<()>;
}

/// 调用方保留存储句柄时使用，例如读回 `MemoryStore` 中的记录
impl<T: ErrorLogStore + ?Sized> ErrorLogStore for Arc<T> {
    fn insert(&self, entry: &ErrorLogEntry) -> io::Result<()> {
        (**self).insert(entry)
    }
}

/// 以 JSON Lines 追加写入文件，每行一条记录
pub struct JsonLinesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesStore {
    /// 在 `dir` 下使用 `{suffix}error_log.jsonl` 作为存储文件
    pub fn new(dir: &Path, suffix: &str) -> Self {
        Self {
            path: dir.join(format!("{}error_log.jsonl", suffix)),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读回全部记录，无法解析的行会被跳过
    pub fn read_all(&self) -> io::Result<Vec<ErrorLogEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

impl ErrorLogStore for JsonLinesStore {
    fn insert(&self, entry: &ErrorLogEntry) -> io::Result<()> {
        let line = serde_json::to_string(entry)?;
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

/// 内存存储，主要用于测试与没有日志目录的嵌入场景
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<ErrorLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorLogStore for MemoryStore {
    fn insert(&self, entry: &ErrorLogEntry) -> io::Result<()> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
        Ok(())
    }
}

pub struct ErrorLog {
    store: Box<dyn ErrorLogStore>,
    app_enabled: AtomicBool,
    db_enabled: AtomicBool,
}

impl ErrorLog {
    pub fn new(store: Box<dyn ErrorLogStore>, app_enabled: bool, db_enabled: bool) -> Self {
        Self {
            store,
            app_enabled: AtomicBool::new(app_enabled),
            db_enabled: AtomicBool::new(db_enabled),
        }
    }

    /// 运行期切换某类别的开关；`App` 与 `Db` 以外的类别始终记录
    pub fn set_enabled(&self, kind: &ErrorType, enabled: bool) {
        match kind {
            ErrorType::App => self.app_enabled.store(enabled, Ordering::SeqCst),
            ErrorType::Db => self.db_enabled.store(enabled, Ordering::SeqCst),
            _ => {}
        }
    }

    pub fn is_enabled(&self, kind: &ErrorType) -> bool {
        match kind {
            ErrorType::App => self.app_enabled.load(Ordering::SeqCst),
            ErrorType::Db => self.db_enabled.load(Ordering::SeqCst),
            _ => true,
        }
    }

    /// 写入一条错误记录。
    ///
    /// * `Ok(false)` - 该类别被配置关闭，未写入
    /// * `Ok(true)` - 已写入存储
    /// * `Err(Exception::LoggingFailure)` - 存储不可用
    pub fn log_error(
        &self,
        kind: &ErrorType,
        message: &str,
        location: &str,
    ) -> Result<bool, Exception> {
        if !self.is_enabled(kind) {
            debug!("错误日志类别{}已关闭，跳过记录", kind);
            return Ok(false);
        }

        let entry = ErrorLogEntry::new(kind, message, location);
        match self.store.insert(&entry) {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("写入错误日志失败: {}", e);
                Err(Exception::LoggingFailure)
            }
        }
    }

    /// 与 `log_error` 相同，但存储失败时把记录转写到进程日志并继续
    pub fn record(&self, kind: &ErrorType, message: &str, location: &str) -> bool {
        match self.log_error(kind, message, location) {
            Ok(written) => written,
            Err(_) => {
                error!(
                    "[error_log兜底] type={} message={} location={}",
                    kind, message, location
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_log(app: bool, db: bool) -> (ErrorLog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let log = ErrorLog::new(Box::new(Arc::clone(&store)), app, db);
        (log, store)
    }

    #[test]
    fn test_log_error_persists_entry() {
        let (log, store) = memory_log(true, true);
        assert_eq!(log.log_error(&ErrorType::App, "boom", "loader"), Ok(true));

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, "App");
        assert_eq!(entries[0].message, "boom");
        assert_eq!(entries[0].location, "loader");
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(entries[0].logtime.len(), 19);
        assert_eq!(&entries[0].logtime[4..5], "-");
        assert_eq!(&entries[0].logtime[10..11], " ");
    }

    #[test]
    fn test_disabled_category_is_noop() {
        let (log, store) = memory_log(false, false);
        assert_eq!(log.log_error(&ErrorType::App, "a", "b"), Ok(false));
        assert_eq!(log.log_error(&ErrorType::Db, "a", "b"), Ok(false));
        assert_eq!(log.log_error(&ErrorType::AwsS3, "a", "b"), Ok(true));
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_switch_is_read_per_call() {
        let (log, store) = memory_log(true, true);
        log.record(&ErrorType::App, "first", "here");
        log.set_enabled(&ErrorType::App, false);
        log.record(&ErrorType::App, "second", "here");
        log.set_enabled(&ErrorType::App, true);
        log.record(&ErrorType::App, "third", "here");

        let messages: Vec<String> = store.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["first", "third"]);
    }

    #[test]
    fn test_store_failure_is_logging_failure() {
        let mut store = MockErrorLogStore::new();
        store
            .expect_insert()
            .times(2)
            .returning(|_| Err(io::Error::new(io::ErrorKind::Other, "disk gone")));
        let log = ErrorLog::new(Box::new(store), true, true);

        assert_eq!(
            log.log_error(&ErrorType::App, "x", "y"),
            Err(Exception::LoggingFailure)
        );
        // record 吞掉错误
        assert!(!log.record(&ErrorType::App, "x", "y"));
    }

    #[test]
    fn test_error_type_parsing() {
        assert_eq!(ErrorType::from("APP"), ErrorType::App);
        assert_eq!(ErrorType::from("db"), ErrorType::Db);
        assert_eq!(ErrorType::from("AWS-S3"), ErrorType::AwsS3);
        assert_eq!(ErrorType::AwsS3.to_string(), "AWS-S3");
        assert_eq!(
            ErrorType::from("Pusher"),
            ErrorType::Other("Pusher".to_string())
        );
    }

    #[test]
    fn test_json_lines_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path(), "bang_");
        assert!(store.path().ends_with("bang_error_log.jsonl"));
        assert!(store.read_all().unwrap().is_empty());

        let entry = ErrorLogEntry::new(&ErrorType::Db, "query failed", "post model");
        store.insert(&entry).unwrap();
        store.insert(&entry).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.lines().next().unwrap().starts_with(r#"{"type":"Db","#));
        assert_eq!(store.read_all().unwrap(), vec![entry.clone(), entry]);
    }
}
