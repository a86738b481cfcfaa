//! 挑选任务

use std::fmt;

use super::job::JobId;

/// 任务结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 挑选作业已提交、入队，且后续动作执行成功
    Succeeded { job: JobId },
    /// 任意一步失败
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

/// 任务状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    /// 作业已创建
    Submitted { job: JobId },
    Done(TaskOutcome),
}

/// 单个类别的挑选任务
#[derive(Debug, Clone)]
pub struct SelectionTask {
    /// 所属分类作业
    pub classification: JobId,
    /// 类别索引（从 0 开始），同时作为任务标识
    pub class_idx: u32,
    /// 类别总数（仅用于日志显示）
    pub total: u32,
    pub status: TaskStatus,
}

impl SelectionTask {
    pub fn new(classification: JobId, class_idx: u32, total: u32) -> Self {
        Self {
            classification,
            class_idx,
            total,
            status: TaskStatus::Pending,
        }
    }

    /// 标记为完成，返回结果
    pub fn finish(&mut self, outcome: TaskOutcome) -> TaskOutcome {
        self.status = TaskStatus::Done(outcome.clone());
        outcome
    }
}

impl fmt::Display for SelectionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[类别 {}/{} 分类作业 {}]",
            self.class_idx + 1,
            self.total,
            self.classification
        )
    }
}
