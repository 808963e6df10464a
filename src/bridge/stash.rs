//! 固定表
//!
//! 每个仍有宿主包装的引擎对象在这里持有一个 `Persistent` 强引用，防止引擎 GC 回收。
//! 条目只在包装终结之后移除：显式通知，或查找时发现弱引用已失效。

use std::collections::HashMap;

use rquickjs::{Object, Persistent};

use super::reference::HostRef;
use crate::host::WrapperId;

pub(crate) struct StashEntry {
    pub value: Persistent<Object<'static>>,
    pub host: HostRef,
}

impl StashEntry {
    pub fn new(value: Persistent<Object<'static>>, host: HostRef) -> Self {
        Self { value, host }
    }
}

/// 以包装标识为键的固定表；键单调递增，不会复用
#[derive(Default)]
pub(crate) struct IdentityTable {
    entries: HashMap<WrapperId, StashEntry>,
    next_key: u64,
}

impl IdentityTable {
    pub fn next_key(&mut self) -> WrapperId {
        self.next_key += 1;
        WrapperId(self.next_key)
    }

    pub fn intern(&mut self, key: WrapperId, entry: StashEntry) {
        let previous = self.entries.insert(key, entry);
        debug_assert!(previous.is_none(), "stash key {} interned twice", key);
    }

    pub fn lookup(&self, key: WrapperId) -> Option<&StashEntry> {
        self.entries.get(&key)
    }

    /// 重复移除是无操作
    pub fn evict(&mut self, key: WrapperId) -> Option<StashEntry> {
        self.entries.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Vec<StashEntry> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}
