//! 运行上下文
//!
//! 封装"这次运行属于哪个项目/工作区"以及取消信号，显式传给每个操作

use std::fmt::Display;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// 运行上下文
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 项目 ID
    pub project: String,

    /// 工作区 ID
    pub workspace: String,

    /// 入队通道
    pub lane: String,

    /// 粒子数阈值（同时作为挑选作业参数）
    pub particle_threshold: u64,

    /// 取消令牌
    pub cancel: CancellationToken,
}

impl RunCtx {
    /// 从配置创建上下文
    pub fn from_config(config: &Config, cancel: CancellationToken) -> Self {
        Self {
            project: config.project_id.clone(),
            workspace: config.workspace_id.clone(),
            lane: config.lane.clone(),
            particle_threshold: config.particle_threshold,
            cancel,
        }
    }

    /// 派生子上下文，取消子令牌不影响父令牌
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[项目 {} 工作区 {}]", self.project, self.workspace)
    }
}
