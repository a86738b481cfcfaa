//! # Deep2D Pipeline
//!
//! 等待上游作业完成后提交 2D 分类，并为每个类别并行提交挑选作业
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 启动外部进程，只暴露能力
//! - `CommandExecutor` - 执行命令并收集输出
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 作业服务与元数据来源，所有文本解析都在这里完成
//! - `JobService` - 状态查询 / 创建作业 / 入队（CLI 或 JSON-RPC）
//! - `MetadataSource` - 读取 job.json
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `StatePoller` - 等待作业完成，带退避重试
//! - `parameter_resolver` - 粒子数与类别数
//! - `FollowUpAction` - 挑选作业的后续动作
//! - `FailureWriter` - 写失败记录
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一个类别"的完整处理流程
//! - `RunCtx` - 上下文封装（项目 + 工作区 + 取消令牌）
//! - `SelectionFlow` - 流程编排（create → enqueue → action）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/pipeline` - 阶段调度与整体时限
//! - `orchestrator/fanout` - 并发扇出与 WaitSet
//!
//! ## 模块结构

pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use cli::Cli;
pub use clients::{JobService, JobSpec, MetadataSource};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{JobId, JobRef, JobStatus};
pub use orchestrator::{App, FanOutReport, RunSummary};
pub use workflow::{RunCtx, SelectionFlow};
