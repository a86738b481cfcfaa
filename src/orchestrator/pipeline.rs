//! 流水线主程序 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责按顺序驱动各个阶段。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志头、选择作业服务后端、创建后续动作
//! 2. **输入校验**：作业 ID 不合法时不做任何工作
//! 3. **child 模式**：等待上游作业 → 读取粒子数 → 推导类别数 → 2D 分类 → 扇出
//! 4. **直接模式**：输入即分类作业，类别数取 `--k`
//! 5. **时限控制**：整体时限到期时取消所有阶段
//! 6. **全局统计**：汇总扇出结果

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::{CliJobService, JobService, MetadataSource, ProjectDirMetadata, RpcJobService};
use crate::config::{Config, ServiceBackend};
use crate::error::{AppError, AppResult};
use crate::infrastructure::CommandExecutor;
use crate::models::{JobId, JobRef};
use crate::orchestrator::classification::ClassificationDispatcher;
use crate::orchestrator::fanout::{FanOutCoordinator, FanOutReport};
use crate::services::{
    class_count, particle_count, FollowUpAction, NoopAction, RetryPolicy, ScriptAction,
    StatePoller,
};
use crate::utils::logging;
use crate::workflow::{RunCtx, SelectionFlow};

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: String,
    pub classification: JobId,
    pub class_count: u32,
    pub report: FanOutReport,
}

impl RunSummary {
    /// 进程退出码：全部成功为 0，存在失败任务为 3
    pub fn exit_code(&self) -> u8 {
        if self.report.is_success() {
            0
        } else {
            3
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    metadata: Arc<dyn MetadataSource>,
    poller: Arc<StatePoller>,
    classifier: ClassificationDispatcher,
    fanout: FanOutCoordinator,
    cancel: CancellationToken,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config);

        let service: Arc<dyn JobService> = match config.service_backend {
            ServiceBackend::Cli => Arc::new(CliJobService::new(
                CommandExecutor::new(),
                &config.service_program,
            )),
            ServiceBackend::Rpc => Arc::new(RpcJobService::new(
                &config.rpc_host,
                config.rpc_port,
                Duration::from_secs(config.rpc_request_timeout_secs),
            )?),
        };

        let metadata: Arc<dyn MetadataSource> =
            Arc::new(ProjectDirMetadata::new(config.project_path.clone()));

        let action: Arc<dyn FollowUpAction> = match &config.action_program {
            Some(program) => Arc::new(ScriptAction::new(
                CommandExecutor::new(),
                program,
                config.action_args.clone(),
            )),
            None => Arc::new(NoopAction),
        };

        Ok(Self::with_components(config, service, metadata, action))
    }

    /// 使用指定组件创建应用
    pub fn with_components(
        config: Config,
        service: Arc<dyn JobService>,
        metadata: Arc<dyn MetadataSource>,
        action: Arc<dyn FollowUpAction>,
    ) -> Self {
        let poller = Arc::new(StatePoller::new(
            service.clone(),
            RetryPolicy::from_config(&config),
        ));
        let classifier = ClassificationDispatcher::new(service.clone(), poller.clone(), &config);
        let flow = Arc::new(SelectionFlow::new(
            service,
            action,
            &config.selection_job_type,
        ));
        let fanout = FanOutCoordinator::new(flow, &config);

        Self {
            config,
            metadata,
            poller,
            classifier,
            fanout,
            cancel: CancellationToken::new(),
        }
    }

    /// 取消令牌，取消后各阶段尽快停止
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<RunSummary> {
        // 先校验输入，不合法时不做任何工作
        let parent = JobRef::parse(self.config.input.as_deref().unwrap_or(""))?;

        let run_cancel = self.cancel.child_token();
        let ctx = RunCtx::from_config(&self.config, run_cancel.clone());

        let deadline = Duration::from_secs(self.config.run_timeout_secs);
        let expired = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let expired = expired.clone();
            tokio::spawn(async move {
                sleep(deadline).await;
                warn!("⚠️ 整体运行时限 {} 秒已到，取消所有阶段", deadline.as_secs());
                // 先标记再取消，阶段观察到取消时标记一定可见
                expired.store(true, Ordering::SeqCst);
                run_cancel.cancel();
            })
        };

        let result = self.run_stages(&ctx, &parent).await;
        watchdog.abort();

        match result {
            Err(AppError::Cancelled) if expired.load(Ordering::SeqCst) => Err(AppError::Timeout {
                stage: "run",
                secs: deadline.as_secs(),
            }),
            other => other,
        }
    }

    async fn run_stages(&self, ctx: &RunCtx, parent: &JobRef) -> AppResult<RunSummary> {
        let (classification, classes) = if self.config.is_child_mode() {
            self.prepare_classification(ctx, parent).await?
        } else {
            info!(
                "{} 直接模式: {} 作为分类作业，类别数 {}",
                ctx, parent.job, self.config.class_count_hint
            );
            (parent.job.clone(), self.config.class_count_hint)
        };

        logging::log_stage(4, "挑选扇出");
        let report = self.fanout.run_fanout(ctx, &classification, classes).await?;

        logging::print_final_stats(
            report.succeeded.len(),
            report.failed.len(),
            report.total as usize,
            &self.config.output_log_file,
        );
        if !report.failed.is_empty() {
            warn!(
                "⚠️ {} 个挑选任务失败，详见 {}",
                report.failed.len(),
                self.config.failure_log_file
            );
        }

        Ok(RunSummary {
            mode: self.config.mode.clone(),
            classification,
            class_count: classes,
            report,
        })
    }

    /// child 模式：等待上游 → 推导类别数 → 提交分类
    async fn prepare_classification(
        &self,
        ctx: &RunCtx,
        parent: &JobRef,
    ) -> AppResult<(JobId, u32)> {
        // ========== 阶段 1: 等待上游作业 ==========
        logging::log_stage(1, "等待上游作业完成");
        let input_deadline = Duration::from_secs(self.config.input_timeout_secs);
        timeout(
            input_deadline,
            self.poller.wait_until_complete(
                &ctx.project,
                &parent.job,
                self.config.heartbeat(),
                &ctx.cancel,
            ),
        )
        .await
        .map_err(|_| AppError::Timeout {
            stage: "input",
            secs: input_deadline.as_secs(),
        })??;

        // ========== 阶段 2: 推导类别数 ==========
        logging::log_stage(2, "推导类别数");
        let metadata = self.metadata.fetch(&parent.job).await?;
        let particles = particle_count(&metadata);
        let classes = class_count(particles, ctx.particle_threshold)?;
        info!(
            "{} 粒子数 {} | 阈值 {} | 类别数 {}",
            ctx, particles, ctx.particle_threshold, classes
        );

        // ========== 阶段 3: 2D 分类 ==========
        logging::log_stage(3, "2D 分类");
        let handle = self
            .classifier
            .submit_classification(ctx, parent, classes)
            .await?;
        let classification = JobRef::parse(handle.job.as_str())?.job;
        info!("{} ✓ 分类作业 {} 已完成", ctx, classification);

        Ok((classification, classes))
    }
}
