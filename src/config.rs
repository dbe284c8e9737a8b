// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use crate::{db::DEFAULT_MAX_CACHE_TIME, exception::Exception};

const DEFAULT_CACHE_SIZE: usize = 64;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    app: AppConfig,
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    cache: CacheConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// 应用根目录，模块位于其下的 `modules` 目录
    #[serde(default = "default_app_path")]
    path: String,
    /// 静态文件根目录
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_true")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    /// 是否记录 `App` 类别的错误日志
    #[serde(default = "default_true")]
    errorlog: bool,
    /// `web` 或 `responder`
    #[serde(default = "default_view")]
    view: String,
    #[serde(default = "default_main_template")]
    main_template: String,
    /// 错误日志文件所在目录
    #[serde(default = "default_log_dir")]
    log_dir: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    /// 是否记录 `DB` 类别的错误日志
    #[serde(default = "default_true")]
    errorlog: bool,
    /// 错误日志表与慢查询日志表的表名前缀
    #[serde(default)]
    suffix: String,
    /// SQLite 数据库文件
    #[serde(default = "default_db_path")]
    path: String,
    /// 是否把 SELECT 语句写入慢查询日志表
    #[serde(default)]
    slowlog: bool,
    /// 查询结果缓存有效期上限（秒）
    #[serde(default = "default_max_cache_time")]
    max_cache_time: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_cache_size")]
    size: usize,
}

fn default_app_path() -> String {
    "app".to_string()
}

fn default_www_root() -> String {
    "www".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_true() -> bool {
    true
}

fn default_view() -> String {
    "web".to_string()
}

fn default_main_template() -> String {
    "default".to_string()
}

fn default_log_dir() -> String {
    "log".to_string()
}

fn default_db_path() -> String {
    "data/bang.sqlite".to_string()
}

fn default_max_cache_time() -> u64 {
    DEFAULT_MAX_CACHE_TIME
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            path: default_app_path(),
            www_root: default_www_root(),
            port: default_port(),
            local: true,
            worker_threads: 0,
            errorlog: true,
            view: default_view(),
            main_template: default_main_template(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            errorlog: true,
            suffix: String::new(),
            path: default_db_path(),
            slowlog: false,
            max_cache_time: DEFAULT_MAX_CACHE_TIME,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            app: AppConfig::default(),
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// 从 TOML 文件读取配置。文件无法读取时返回错误；内容无法解析时使用默认配置
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => {
                error!("无法打开配置文件{}：{}", filename, e);
                return Err(Exception::ConfigUnreadable);
            }
        };
        let mut str_val = String::new();
        if let Err(e) = file.read_to_string(&mut str_val) {
            error!("读取配置文件{}失败：{}", filename, e);
            return Err(Exception::ConfigUnreadable);
        }
        Ok(Self::from_toml_str(&str_val))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let raw_config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        raw_config.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.app.worker_threads == 0 {
            self.app.worker_threads = num_cpus::get();
        }
        if self.cache.size == 0 {
            warn!(
                "cache.size被设置为0，如需禁用缓存请使用cache.enabled = false，该值将被改为{}。",
                DEFAULT_CACHE_SIZE
            );
            self.cache.size = DEFAULT_CACHE_SIZE;
        }
        self
    }
}

impl Config {
    pub fn app_path(&self) -> &Path {
        Path::new(&self.app.path)
    }

    pub fn www_root(&self) -> &str {
        &self.app.www_root
    }

    pub fn port(&self) -> u16 {
        self.app.port
    }

    pub fn local(&self) -> bool {
        self.app.local
    }

    pub fn worker_threads(&self) -> usize {
        self.app.worker_threads
    }

    pub fn app_errorlog(&self) -> bool {
        self.app.errorlog
    }

    pub fn view(&self) -> &str {
        &self.app.view
    }

    pub fn main_template(&self) -> &str {
        &self.app.main_template
    }

    pub fn log_dir(&self) -> &Path {
        Path::new(&self.app.log_dir)
    }

    pub fn db_errorlog(&self) -> bool {
        self.database.errorlog
    }

    pub fn db_suffix(&self) -> &str {
        &self.database.suffix
    }

    pub fn db_path(&self) -> &Path {
        Path::new(&self.database.path)
    }

    pub fn db_slowlog(&self) -> bool {
        self.database.slowlog
    }

    pub fn db_max_cache_time(&self) -> u64 {
        self.database.max_cache_time
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.enabled
    }

    pub fn cache_size(&self) -> usize {
        self.cache.size
    }
}
