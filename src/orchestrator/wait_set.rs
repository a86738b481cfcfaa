//! 等待集合
//!
//! 扇出开始前登记全部任务，每个任务结束时移除自己的条目。
//! 剩余数量通过 watch 通道广播，协调者在通道上等待归零。

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::models::TaskOutcome;

/// 移除条目失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitSetError {
    #[error("任务 {0} 不在等待集合中")]
    UnknownTask(u32),
    #[error("任务 {0} 已经移除过")]
    AlreadyCompleted(u32),
}

#[derive(Debug, Default)]
struct Inner {
    outstanding: HashSet<u32>,
    outcomes: BTreeMap<u32, TaskOutcome>,
}

/// 未完成任务集合
///
/// - 数量只减不增
/// - 每个条目只能移除一次
/// - 数量归零当且仅当所有任务都已结束
#[derive(Debug)]
pub struct WaitSet {
    inner: Mutex<Inner>,
    remaining: watch::Sender<usize>,
    total: usize,
}

impl WaitSet {
    /// 以给定任务标识创建
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        let outstanding: HashSet<u32> = ids.into_iter().collect();
        let total = outstanding.len();
        let (remaining, _) = watch::channel(total);

        Self {
            inner: Mutex::new(Inner {
                outstanding,
                outcomes: BTreeMap::new(),
            }),
            remaining,
            total,
        }
    }

    /// 登记 `0..count` 共 `count` 个任务
    pub fn with_count(count: u32) -> Self {
        Self::new(0..count)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 当前剩余数量
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// 移除一个条目并记录其结果，返回剩余数量
    pub fn complete(&self, id: u32, outcome: TaskOutcome) -> Result<usize, WaitSetError> {
        let mut inner = self.lock();

        if !inner.outstanding.remove(&id) {
            let err = if inner.outcomes.contains_key(&id) {
                WaitSetError::AlreadyCompleted(id)
            } else {
                WaitSetError::UnknownTask(id)
            };
            error!("❌ 拒绝移除等待条目: {}", err);
            return Err(err);
        }

        inner.outcomes.insert(id, outcome);
        let left = inner.outstanding.len();
        // 持锁发送，保证观察到的数量单调递减
        self.remaining.send_replace(left);
        debug!("任务 {} 已移除，剩余 {}/{}", id, left, self.total);

        Ok(left)
    }

    /// 等待全部条目移除
    pub async fn wait_empty(&self) {
        let mut rx = self.remaining.subscribe();
        // 发送端由 self 持有，等待期间不会关闭
        let _ = rx.wait_for(|left| *left == 0).await;
    }

    /// 仍未完成的任务（升序）
    pub fn outstanding_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.lock().outstanding.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 已登记的结果（按任务标识排序）
    pub fn outcomes(&self) -> BTreeMap<u32, TaskOutcome> {
        self.lock().outcomes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // 锁内没有会 panic 的操作，中毒时沿用内部数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
