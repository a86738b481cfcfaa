//! 状态轮询服务 - 业务能力层
//!
//! 只负责"等待一个作业结束"能力，不关心流程
//!
//! ## 状态分类
//! - `completed`：返回
//! - `failed` / `killed`：立即报错，不再查询
//! - 其他合法状态：间隔 `interval` 后再次查询
//! - 空响应 / 截断响应 / 传输故障：按指数退避重试，超过上限后报错

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clients::JobService;
use crate::config::Config;
use crate::error::{AppError, AppResult, JobError};
use crate::models::{JobHandle, JobId};

/// 瞬时错误重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 连续异常响应的最大重试次数
    pub max_transient_retries: u32,
    /// 退避倍数上限
    pub backoff_cap: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_retries: 30,
            backoff_cap: 8,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_transient_retries: config.max_transient_retries,
            backoff_cap: config.backoff_cap,
        }
    }

    /// 第 `attempt` 次连续异常后的等待时间：interval × min(2^(attempt-1), cap)
    pub fn backoff(&self, interval: Duration, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 2u32.saturating_pow(exponent).min(self.backoff_cap.max(1));
        interval.saturating_mul(factor)
    }
}

/// 睡眠，期间可被取消
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> AppResult<()> {
    tokio::select! {
        _ = sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(AppError::Cancelled),
    }
}

/// 状态轮询服务
///
/// 职责：
/// - 反复查询单个作业状态直到结束
/// - 区分"响应异常，重试"和"作业失败，停止"
/// - 每次重试之间必定睡眠
pub struct StatePoller {
    service: Arc<dyn JobService>,
    policy: RetryPolicy,
}

impl StatePoller {
    /// 创建新的轮询服务
    pub fn new(service: Arc<dyn JobService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    /// 等待作业完成
    ///
    /// # 参数
    /// - `project`: 项目 ID
    /// - `job`: 作业 ID
    /// - `interval`: 两次查询之间的间隔
    /// - `cancel`: 取消令牌
    ///
    /// # 返回
    /// 作业进入 `completed` 时返回句柄
    pub async fn wait_until_complete(
        &self,
        project: &str,
        job: &JobId,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<JobHandle> {
        let mut transient_failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            match self.service.get_status(project, job).await {
                Ok(status) if status.is_success() => {
                    info!("✓ 作业 {} 已完成", job);
                    return Ok(JobHandle::new(project, job.clone(), status));
                }
                Ok(status) if status.is_fatal() => {
                    error!("❌ 作业 {} 状态为 {}，停止等待", job, status);
                    return Err(JobError::FatalJobStatus {
                        job: job.clone(),
                        status,
                    }
                    .into());
                }
                Ok(status) => {
                    transient_failures = 0;
                    info!(
                        "⏳ 作业 {} 状态: {}，{} 秒后再次查询",
                        job,
                        status,
                        interval.as_secs_f64()
                    );
                    sleep_or_cancel(interval, cancel).await?;
                }
                Err(e) if e.is_transient() => {
                    transient_failures += 1;
                    if transient_failures > self.policy.max_transient_retries {
                        error!(
                            "❌ 作业 {} 状态查询连续失败 {} 次，放弃",
                            job, transient_failures
                        );
                        return Err(JobError::TransientQueryError {
                            job: job.clone(),
                            attempts: transient_failures,
                            last: e.to_string(),
                        }
                        .into());
                    }

                    let delay = self.policy.backoff(interval, transient_failures);
                    warn!(
                        "⚠️ 作业 {} 状态查询异常 (尝试 {}/{}): {}，等待 {} 秒后重试",
                        job,
                        transient_failures,
                        self.policy.max_transient_retries,
                        e,
                        delay.as_secs_f64()
                    );
                    sleep_or_cancel(delay, cancel).await?;
                }
                Err(e) => {
                    debug!("作业 {} 状态查询被拒绝: {}", job, e);
                    return Err(AppError::Service(e));
                }
            }
        }
    }
}
