//! 挑选扇出协调器 - 编排层
//!
//! ## 职责
//!
//! 为分类作业的每个类别并发启动一个挑选任务，并等待全部结束。
//!
//! ## 流程
//!
//! 1. 启动任何任务之前，以类别数创建 WaitSet
//! 2. 每个类别一个 tokio 任务，任务内部先获取并发许可（Semaphore）
//! 3. 任务委托 `SelectionFlow` 完成提交、入队、后续动作
//! 4. 任务结束时通过完成守卫移除自己的条目
//! 5. 协调者在 WaitSet 上等待归零，受扇出时限约束
//! 6. 超时或取消：通知任务停止，宽限期后中止剩余任务
//! 7. 汇总结果，失败任务写入失败记录文件

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{JobId, SelectionTask, TaskOutcome};
use crate::orchestrator::wait_set::WaitSet;
use crate::services::FailureWriter;
use crate::workflow::{RunCtx, SelectionFlow};

/// 扇出结果汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub total: u32,
    /// (类别索引, 挑选作业)
    pub succeeded: Vec<(u32, JobId)>,
    /// (类别索引, 失败原因)
    pub failed: Vec<(u32, String)>,
}

impl FanOutReport {
    fn from_outcomes(total: u32, outcomes: impl IntoIterator<Item = (u32, TaskOutcome)>) -> Self {
        let mut report = Self {
            total,
            ..Default::default()
        };
        for (class_idx, outcome) in outcomes {
            match outcome {
                TaskOutcome::Succeeded { job } => report.succeeded.push((class_idx, job)),
                TaskOutcome::Failed { reason } => report.failed.push((class_idx, reason)),
            }
        }
        report
    }

    /// 是否全部成功
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.succeeded.len() == self.total as usize
    }
}

/// 完成守卫
///
/// 在任务启动前创建并移入任务。任务正常结束时显式登记结果；
/// 被中止或 panic 时由 Drop 登记为失败，保证条目恰好移除一次。
struct CompletionGuard {
    wait_set: Arc<WaitSet>,
    class_idx: u32,
    done: bool,
}

impl CompletionGuard {
    fn new(wait_set: Arc<WaitSet>, class_idx: u32) -> Self {
        Self {
            wait_set,
            class_idx,
            done: false,
        }
    }

    fn complete(mut self, outcome: TaskOutcome) {
        self.done = true;
        self.record(outcome);
    }

    fn record(&self, outcome: TaskOutcome) {
        match self.wait_set.complete(self.class_idx, outcome) {
            Ok(left) => debug!(
                "类别 {} 已结束，剩余 {}/{}",
                self.class_idx,
                left,
                self.wait_set.total()
            ),
            Err(e) => error!("❌ 类别 {} 登记结果失败: {}", self.class_idx, e),
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let reason = if std::thread::panicking() {
            "任务异常退出"
        } else {
            "任务被中止"
        };
        warn!("⚠️ 类别 {} {}", self.class_idx, reason);
        self.record(TaskOutcome::failed(reason));
    }
}

/// 扇出协调器
pub struct FanOutCoordinator {
    flow: Arc<SelectionFlow>,
    max_parallel: usize,
    deadline: Duration,
    grace: Duration,
    failure_writer: FailureWriter,
}

impl FanOutCoordinator {
    /// 按配置创建
    pub fn new(flow: Arc<SelectionFlow>, config: &Config) -> Self {
        Self::with_limits(
            flow,
            config.max_parallel_selections,
            Duration::from_secs(config.fanout_timeout_secs),
            Duration::from_secs(config.cancel_grace_secs),
            FailureWriter::with_path(&config.failure_log_file),
        )
    }

    pub fn with_limits(
        flow: Arc<SelectionFlow>,
        max_parallel: usize,
        deadline: Duration,
        grace: Duration,
        failure_writer: FailureWriter,
    ) -> Self {
        Self {
            flow,
            max_parallel: max_parallel.max(1),
            deadline,
            grace,
            failure_writer,
        }
    }

    /// 为 `classification` 的每个类别运行挑选任务
    ///
    /// # 返回
    /// - 全部任务结束后的汇总（含失败任务）
    /// - 上层取消时返回 `Cancelled`，此时任务同样已全部收尾
    pub async fn run_fanout(
        &self,
        ctx: &RunCtx,
        classification: &JobId,
        class_count: u32,
    ) -> AppResult<FanOutReport> {
        info!(
            "🚀 开始扇出: 分类作业 {} 共 {} 个类别，最大并发 {}",
            classification, class_count, self.max_parallel
        );

        let wait_set = Arc::new(WaitSet::with_count(class_count));
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let fan_ctx = ctx.child();

        let mut handles = Vec::with_capacity(class_count as usize);
        for class_idx in 0..class_count {
            let guard = CompletionGuard::new(wait_set.clone(), class_idx);
            let flow = self.flow.clone();
            let semaphore = semaphore.clone();
            let task_ctx = fan_ctx.clone();
            let mut task = SelectionTask::new(classification.clone(), class_idx, class_count);

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit,
                    _ = task_ctx.cancel.cancelled() => {
                        guard.complete(task.finish(TaskOutcome::failed("已取消，未获得并发许可")));
                        return;
                    }
                };
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        guard.complete(task.finish(TaskOutcome::failed(e.to_string())));
                        return;
                    }
                };

                let outcome = flow.run(&task_ctx, &mut task).await;
                guard.complete(outcome);
            }));
        }

        let interrupted = tokio::select! {
            waited = timeout(self.deadline, wait_set.wait_empty()) => match waited {
                Ok(()) => None,
                Err(_) => Some(AppError::Timeout {
                    stage: "fanout",
                    secs: self.deadline.as_secs(),
                }),
            },
            _ = ctx.cancel.cancelled() => Some(AppError::Cancelled),
        };

        if let Some(reason) = &interrupted {
            warn!(
                "⚠️ {}，通知剩余 {} 个任务停止: {:?}",
                reason,
                wait_set.remaining(),
                wait_set.outstanding_ids()
            );
            fan_ctx.cancel.cancel();

            if timeout(self.grace, wait_set.wait_empty()).await.is_err() {
                warn!(
                    "⚠️ 宽限期 {} 秒结束，中止剩余 {} 个任务",
                    self.grace.as_secs(),
                    wait_set.remaining()
                );
                for handle in &handles {
                    handle.abort();
                }
            }
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("❌ 挑选任务 panic: {}", e);
                }
            }
        }

        if wait_set.remaining() != 0 {
            error!(
                "❌ 任务全部结束但仍有未移除条目: {:?}",
                wait_set.outstanding_ids()
            );
        }

        let report = FanOutReport::from_outcomes(class_count, wait_set.outcomes());
        self.record_failures(classification, &report).await;

        info!(
            "📊 扇出结束: 成功 {} / 失败 {} / 共 {}",
            report.succeeded.len(),
            report.failed.len(),
            report.total
        );

        match interrupted {
            Some(AppError::Cancelled) => Err(AppError::Cancelled),
            _ => Ok(report),
        }
    }

    async fn record_failures(&self, classification: &JobId, report: &FanOutReport) {
        for (class_idx, reason) in &report.failed {
            if let Err(e) = self
                .failure_writer
                .write(classification, *class_idx, reason)
                .await
            {
                error!("❌ 写入失败记录出错: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_outcomes() {
        let job = JobId::parse("J50").unwrap();
        let report = FanOutReport::from_outcomes(
            3,
            vec![
                (0, TaskOutcome::Succeeded { job: job.clone() }),
                (1, TaskOutcome::failed("enqueue rejected")),
                (2, TaskOutcome::Succeeded { job }),
            ],
        );

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed, vec![(1, "enqueue rejected".to_string())]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_missing_outcome_is_not_success() {
        let report = FanOutReport::from_outcomes(2, Vec::new());
        assert!(!report.is_success());
        assert!(report.failed.is_empty());
        assert_eq!(report.total, 2);
    }

    #[test]
    fn test_guard_drop_marks_failed() {
        let set = Arc::new(WaitSet::with_count(2));

        let guard = CompletionGuard::new(set.clone(), 0);
        guard.complete(TaskOutcome::failed("explicit"));

        let dropped = CompletionGuard::new(set.clone(), 1);
        drop(dropped);

        assert_eq!(set.remaining(), 0);
        let outcomes = set.outcomes();
        assert_eq!(outcomes[&0], TaskOutcome::failed("explicit"));
        assert_eq!(outcomes[&1], TaskOutcome::failed("任务被中止"));
    }
}
