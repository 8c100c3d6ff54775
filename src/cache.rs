//! In-memory bounded cache
//! LRU + 任意の TTL。ディスカバリー結果と解析セッションで共用。

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    // 先頭 = 最も古く使われたキー
    order: VecDeque<K>,
}

pub struct BoundedCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }

        touch(&mut inner.order, key);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// LRU 順を変えずに存在確認
    pub fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .map(|entry| !self.is_expired(entry))
            .unwrap_or(false)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();

        if inner.entries.contains_key(&key) {
            touch(&mut inner.order, &key);
        } else {
            while inner.entries.len() >= self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(key.clone());
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.order.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        self.ttl
            .map(|ttl| entry.inserted_at.elapsed() >= ttl)
            .unwrap_or(false)
    }
}

fn touch<K: Eq + Clone>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}
