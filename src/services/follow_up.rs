//! 后续动作 - 业务能力层
//!
//! 每个挑选作业入队后执行一个外部程序，并等待其退出

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ActionError;
use crate::infrastructure::CommandExecutor;
use crate::models::JobId;

/// 后续动作
#[async_trait]
pub trait FollowUpAction: Send + Sync {
    /// 以新作业 ID 为参数执行，成功退出才返回 Ok
    async fn trigger(&self, job: &JobId) -> Result<(), ActionError>;
}

/// 执行外部脚本：`<program> <args...> <作业ID>`
pub struct ScriptAction {
    executor: CommandExecutor,
    program: String,
    args: Vec<String>,
}

impl ScriptAction {
    /// 创建脚本动作，`~/` 前缀按 `$HOME` 展开
    pub fn new(executor: CommandExecutor, program: impl Into<String>, args: Vec<String>) -> Self {
        let home = std::env::var("HOME").ok();
        Self {
            executor,
            program: expand_home(&program.into(), home.as_deref()),
            args: args
                .iter()
                .map(|arg| expand_home(arg, home.as_deref()))
                .collect(),
        }
    }

    /// 针对某个作业的完整参数列表
    pub fn command_args(&self, job: &JobId) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(job.as_str().to_string());
        args
    }
}

#[async_trait]
impl FollowUpAction for ScriptAction {
    async fn trigger(&self, job: &JobId) -> Result<(), ActionError> {
        let args = self.command_args(job);
        info!("▶️ 执行后续动作: {} {}", self.program, args.join(" "));

        let output = self
            .executor
            .run(&self.program, &args)
            .await
            .map_err(|e| ActionError::SpawnFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(ActionError::NonZeroExit {
                program: self.program.clone(),
                code: output.code,
            });
        }

        debug!("后续动作完成: 作业 {}", job);
        Ok(())
    }
}

/// 不执行任何动作
#[derive(Debug, Default)]
pub struct NoopAction;

#[async_trait]
impl FollowUpAction for NoopAction {
    async fn trigger(&self, job: &JobId) -> Result<(), ActionError> {
        debug!("未配置后续动作，跳过作业 {}", job);
        Ok(())
    }
}

fn expand_home(value: &str, home: Option<&str>) -> String {
    match (value.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => value.to_string(),
    }
}
