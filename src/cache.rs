// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    expires_at: Option<Instant>,
}

/// 控制器可选使用的结果缓存：容量受限的 LRU，每个条目可带过期时间
pub struct ResultCache {
    cache: LruCache<String, CacheEntry>,
}

impl ResultCache {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => panic!("调用from_capacity时指定的大小是0。如果需要自动设置大小，请在调用处进行处理，而不是传入0"),
        };
        Self {
            cache: LruCache::new(capacity),
        }
    }

    // 放入，ttl_secs 为 0 表示永不过期
    pub fn push(&mut self, key: &str, bytes: Bytes, ttl_secs: u64) {
        self.push_at(key, bytes, ttl_secs, Instant::now());
    }

    // 查询有效缓存
    pub fn find(&mut self, key: &str) -> Option<&Bytes> {
        self.find_at(key, Instant::now())
    }

    pub fn remove(&mut self, key: &str) -> Option<Bytes> {
        self.cache.pop(key).map(|entry| entry.content)
    }

    fn push_at(&mut self, key: &str, bytes: Bytes, ttl_secs: u64, now: Instant) {
        let expires_at = match ttl_secs {
            0 => None,
            secs => Some(now + Duration::from_secs(secs)),
        };
        let entry = CacheEntry {
            content: bytes,
            expires_at,
        };
        self.cache.put(key.to_string(), entry);
    }

    fn find_at(&mut self, key: &str, now: Instant) -> Option<&Bytes> {
        let expired = match self.cache.peek(key) {
            Some(entry) => entry.expires_at.map_or(false, |t| now >= t),
            None => return None,
        };
        if expired {
            self.cache.pop(key);
            return None;
        }
        self.cache.get(key).map(|entry| &entry.content)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    // 测试
    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
