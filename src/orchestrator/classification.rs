//! 分类作业调度 - 编排层
//!
//! 提交 2D 分类作业、入队，并等待其完成

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use crate::clients::{JobService, JobSpec};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{JobHandle, JobRef};
use crate::services::StatePoller;
use crate::workflow::RunCtx;

/// 上游作业提供粒子的输出组
const PARTICLE_OUTPUT: &str = "particles_selected";

/// 分类作业调度器
pub struct ClassificationDispatcher {
    service: Arc<dyn JobService>,
    poller: Arc<StatePoller>,
    job_type: String,
    interval: Duration,
    deadline: Duration,
}

impl ClassificationDispatcher {
    pub fn new(service: Arc<dyn JobService>, poller: Arc<StatePoller>, config: &Config) -> Self {
        Self {
            service,
            poller,
            job_type: config.classification_job_type.clone(),
            interval: config.classification_heartbeat(),
            deadline: Duration::from_secs(config.classification_timeout_secs),
        }
    }

    /// 构建分类作业参数
    pub fn build_spec(&self, ctx: &RunCtx, parent: &JobRef, class_count: u32) -> JobSpec {
        JobSpec::new(&self.job_type, &ctx.project, &ctx.workspace)
            .param("compute_use_ssd", "False")
            .param("class2D_K", class_count)
            .input(
                "particles",
                JobRef::output_slot(&parent.job, PARTICLE_OUTPUT),
            )
    }

    /// 提交分类作业并等待完成
    ///
    /// 只有作业状态为 `completed` 才返回
    pub async fn submit_classification(
        &self,
        ctx: &RunCtx,
        parent: &JobRef,
        class_count: u32,
    ) -> AppResult<JobHandle> {
        timeout(self.deadline, self.submit_and_wait(ctx, parent, class_count))
            .await
            .map_err(|_| AppError::Timeout {
                stage: "classification",
                secs: self.deadline.as_secs(),
            })?
    }

    async fn submit_and_wait(
        &self,
        ctx: &RunCtx,
        parent: &JobRef,
        class_count: u32,
    ) -> AppResult<JobHandle> {
        let spec = self.build_spec(ctx, parent, class_count);
        info!(
            "{} 📤 提交分类作业: 上游 {} | 类别数 {}",
            ctx, parent.job, class_count
        );

        let job = self
            .service
            .create_job(&spec)
            .await
            .map_err(|e| AppError::submission_failed("make_job", e))?;
        info!("{} ✓ 已创建分类作业 {}", ctx, job);

        self.service
            .enqueue(&ctx.project, &job, &ctx.lane)
            .await
            .map_err(|e| AppError::submission_failed("enqueue_job", e))?;
        info!("{} ✓ 分类作业 {} 已入队 ({})", ctx, job, ctx.lane);

        self.poller
            .wait_until_complete(&ctx.project, &job, self.interval, &ctx.cancel)
            .await
    }
}
