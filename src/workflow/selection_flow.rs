//! 挑选任务流程 - 流程层
//!
//! 核心职责：定义"一个类别"的完整处理流程
//!
//! 流程顺序：
//! 1. 创建挑选作业（限定类别索引）
//! 2. 作业入队
//! 3. 执行后续动作并等待退出
//!
//! 每一步之前检查取消信号，取消后不再发起新的动作

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{JobService, JobSpec};
use crate::error::AppError;
use crate::models::{JobRef, SelectionTask, TaskOutcome, TaskStatus};
use crate::services::FollowUpAction;
use crate::workflow::run_ctx::RunCtx;

/// 挑选任务流程
///
/// - 只处理单个类别
/// - 不持有 WaitSet，完成状态由调用方登记
/// - 任意一步失败都返回失败结果，不会静默丢弃
pub struct SelectionFlow {
    service: Arc<dyn JobService>,
    action: Arc<dyn FollowUpAction>,
    job_type: String,
}

impl SelectionFlow {
    /// 创建新的挑选流程
    pub fn new(
        service: Arc<dyn JobService>,
        action: Arc<dyn FollowUpAction>,
        job_type: impl Into<String>,
    ) -> Self {
        Self {
            service,
            action,
            job_type: job_type.into(),
        }
    }

    /// 构建挑选作业参数
    pub fn build_spec(&self, ctx: &RunCtx, task: &SelectionTask) -> JobSpec {
        JobSpec::new(&self.job_type, &ctx.project, &ctx.workspace)
            .param("class_idx", task.class_idx)
            .param("particle_count_above", ctx.particle_threshold)
            .input(
                "particles",
                JobRef::output_slot(&task.classification, "particles"),
            )
            .input(
                "templates",
                JobRef::output_slot(&task.classification, "class_averages"),
            )
    }

    pub async fn run(&self, ctx: &RunCtx, task: &mut SelectionTask) -> TaskOutcome {
        if ctx.is_cancelled() {
            warn!("{} ⚠️ 已取消，未提交", task);
            return task.finish(TaskOutcome::failed("已取消，未提交"));
        }

        // ========== 步骤 1: 创建作业 ==========
        info!("{} 📤 正在创建挑选作业...", task);
        let spec = self.build_spec(ctx, task);
        let job = match self.service.create_job(&spec).await {
            Ok(job) => job,
            Err(e) => {
                let err = AppError::submission_failed("make_job", e);
                error!("{} ❌ {}", task, err);
                return task.finish(TaskOutcome::failed(err.to_string()));
            }
        };
        task.status = TaskStatus::Submitted { job: job.clone() };
        info!("{} ✓ 已创建作业 {}", task, job);

        if ctx.is_cancelled() {
            warn!("{} ⚠️ 已取消，作业 {} 未入队", task, job);
            return task.finish(TaskOutcome::failed(format!("已取消，作业 {} 未入队", job)));
        }

        // ========== 步骤 2: 入队 ==========
        if let Err(e) = self.service.enqueue(&ctx.project, &job, &ctx.lane).await {
            let err = AppError::submission_failed("enqueue_job", e);
            error!("{} ❌ 作业 {}: {}", task, job, err);
            return task.finish(TaskOutcome::failed(format!("作业 {}: {}", job, err)));
        }
        info!("{} ✓ 作业 {} 已入队 ({})", task, job, ctx.lane);

        if ctx.is_cancelled() {
            warn!("{} ⚠️ 已取消，作业 {} 的后续动作未执行", task, job);
            return task.finish(TaskOutcome::failed(format!(
                "已取消，作业 {} 的后续动作未执行",
                job
            )));
        }

        // ========== 步骤 3: 后续动作 ==========
        if let Err(e) = self.action.trigger(&job).await {
            error!("{} ❌ 作业 {} 后续动作失败: {}", task, job, e);
            return task.finish(TaskOutcome::failed(format!("作业 {}: {}", job, e)));
        }

        info!("{} ✅ 作业 {} 处理完成", task, job);
        task.finish(TaskOutcome::Succeeded { job })
    }
}
