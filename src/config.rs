use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 作业服务传输方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceBackend {
    /// 通过 `<program> cli '<表达式>'` 调用
    Cli,
    /// 通过 JSON-RPC 命令端口调用
    Rpc,
}

impl std::str::FromStr for ServiceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cli" => Ok(ServiceBackend::Cli),
            "rpc" => Ok(ServiceBackend::Rpc),
            other => Err(format!("未知的服务后端: {}", other)),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 运行参数 ---
    /// 输入作业引用（child 模式为上游作业，其他模式为分类作业）
    pub input: Option<String>,
    pub project_id: String,
    pub workspace_id: String,
    /// 运行模式：`child` 或其他（直接扇出）
    pub mode: String,
    /// 直接模式下的类别数
    pub class_count_hint: u32,
    /// 粒子数阈值
    pub particle_threshold: u64,
    /// 基础轮询间隔（秒）
    pub heartbeat_secs: u64,
    /// 保留参数，不参与计算
    pub depth: u32,
    /// 项目目录，用于读取 job.json
    pub project_path: PathBuf,

    // --- 作业服务 ---
    pub service_backend: ServiceBackend,
    pub service_program: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_request_timeout_secs: u64,
    pub lane: String,
    pub classification_job_type: String,
    pub selection_job_type: String,

    // --- 轮询 ---
    /// 分类阶段轮询间隔 = heartbeat × 该倍数
    pub classification_heartbeat_factor: u32,
    /// 连续异常响应的最大重试次数
    pub max_transient_retries: u32,
    /// 退避倍数上限
    pub backoff_cap: u32,

    // --- 扇出 ---
    /// 同时运行的挑选任务数上限
    pub max_parallel_selections: usize,
    /// 每个挑选作业创建后执行的程序，None 表示不执行
    pub action_program: Option<String>,
    pub action_args: Vec<String>,

    // --- 时限（秒） ---
    pub input_timeout_secs: u64,
    pub classification_timeout_secs: u64,
    pub fanout_timeout_secs: u64,
    pub run_timeout_secs: u64,
    /// 扇出超时后等待任务自行收尾的时间
    pub cancel_grace_secs: u64,

    // --- 日志 ---
    pub verbose_logging: bool,
    pub output_log_file: String,
    pub failure_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            project_id: "P1".to_string(),
            workspace_id: "W2".to_string(),
            mode: "child".to_string(),
            class_count_hint: 5,
            particle_threshold: 100_000,
            heartbeat_secs: 10,
            depth: 2,
            project_path: PathBuf::from("/data/20201123_Congye_P3L/P1/"),
            service_backend: ServiceBackend::Cli,
            service_program: "cryosparcm".to_string(),
            rpc_host: "syg2".to_string(),
            rpc_port: 39002,
            rpc_request_timeout_secs: 60,
            lane: "default".to_string(),
            classification_job_type: "class_2D".to_string(),
            selection_job_type: "single_select".to_string(),
            classification_heartbeat_factor: 6,
            max_transient_retries: 30,
            backoff_cap: 8,
            max_parallel_selections: 8,
            action_program: Some("sh".to_string()),
            action_args: vec!["~/bin/run.sh".to_string()],
            input_timeout_secs: 24 * 3600,
            classification_timeout_secs: 24 * 3600,
            fanout_timeout_secs: 6 * 3600,
            run_timeout_secs: 48 * 3600,
            cancel_grace_secs: 30,
            verbose_logging: false,
            output_log_file: "deep2d_run.txt".to_string(),
            failure_log_file: "failed_selections.txt".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// 从 TOML 文件加载，缺省字段取默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(config)
    }

    /// 用环境变量覆盖当前配置
    pub fn with_env(self) -> Self {
        let base = self;
        Self {
            input: std::env::var("DEEP2D_INPUT").ok().or(base.input),
            project_id: std::env::var("DEEP2D_PID").unwrap_or(base.project_id),
            workspace_id: std::env::var("DEEP2D_WID").unwrap_or(base.workspace_id),
            mode: std::env::var("DEEP2D_MODE").unwrap_or(base.mode),
            class_count_hint: env_parse("DEEP2D_K").unwrap_or(base.class_count_hint),
            particle_threshold: env_parse("DEEP2D_NUM_THRE").unwrap_or(base.particle_threshold),
            heartbeat_secs: env_parse("DEEP2D_HEARTBEAT").unwrap_or(base.heartbeat_secs),
            depth: env_parse("DEEP2D_DEPTH").unwrap_or(base.depth),
            project_path: std::env::var("DEEP2D_PROJECT_PATH").map(PathBuf::from).unwrap_or(base.project_path),
            service_backend: env_parse("DEEP2D_SERVICE_BACKEND").unwrap_or(base.service_backend),
            service_program: std::env::var("DEEP2D_SERVICE_PROGRAM").unwrap_or(base.service_program),
            rpc_host: std::env::var("DEEP2D_RPC_HOST").unwrap_or(base.rpc_host),
            rpc_port: env_parse("DEEP2D_RPC_PORT").unwrap_or(base.rpc_port),
            rpc_request_timeout_secs: env_parse("DEEP2D_RPC_REQUEST_TIMEOUT_SECS").unwrap_or(base.rpc_request_timeout_secs),
            lane: std::env::var("DEEP2D_LANE").unwrap_or(base.lane),
            classification_job_type: std::env::var("DEEP2D_CLASSIFICATION_JOB_TYPE").unwrap_or(base.classification_job_type),
            selection_job_type: std::env::var("DEEP2D_SELECTION_JOB_TYPE").unwrap_or(base.selection_job_type),
            classification_heartbeat_factor: env_parse("DEEP2D_CLASSIFICATION_HEARTBEAT_FACTOR").unwrap_or(base.classification_heartbeat_factor),
            max_transient_retries: env_parse("DEEP2D_MAX_TRANSIENT_RETRIES").unwrap_or(base.max_transient_retries),
            backoff_cap: env_parse("DEEP2D_BACKOFF_CAP").unwrap_or(base.backoff_cap),
            max_parallel_selections: env_parse("DEEP2D_MAX_PARALLEL_SELECTIONS").unwrap_or(base.max_parallel_selections),
            action_program: std::env::var("DEEP2D_ACTION_PROGRAM").ok().or(base.action_program),
            action_args: std::env::var("DEEP2D_ACTION_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or(base.action_args),
            input_timeout_secs: env_parse("DEEP2D_INPUT_TIMEOUT_SECS").unwrap_or(base.input_timeout_secs),
            classification_timeout_secs: env_parse("DEEP2D_CLASSIFICATION_TIMEOUT_SECS").unwrap_or(base.classification_timeout_secs),
            fanout_timeout_secs: env_parse("DEEP2D_FANOUT_TIMEOUT_SECS").unwrap_or(base.fanout_timeout_secs),
            run_timeout_secs: env_parse("DEEP2D_RUN_TIMEOUT_SECS").unwrap_or(base.run_timeout_secs),
            cancel_grace_secs: env_parse("DEEP2D_CANCEL_GRACE_SECS").unwrap_or(base.cancel_grace_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(base.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(base.output_log_file),
            failure_log_file: std::env::var("FAILURE_LOG_FILE").unwrap_or(base.failure_log_file),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> AppResult<()> {
        let positive: [(&'static str, u64); 9] = [
            ("particle_threshold", self.particle_threshold),
            ("heartbeat_secs", self.heartbeat_secs),
            ("classification_heartbeat_factor", self.classification_heartbeat_factor as u64),
            ("backoff_cap", self.backoff_cap as u64),
            ("max_parallel_selections", self.max_parallel_selections as u64),
            ("input_timeout_secs", self.input_timeout_secs),
            ("classification_timeout_secs", self.classification_timeout_secs),
            ("fanout_timeout_secs", self.fanout_timeout_secs),
            ("run_timeout_secs", self.run_timeout_secs),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "必须大于 0".to_string(),
                }
                .into());
            }
        }

        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "project_id",
                reason: "不能为空".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn is_child_mode(&self) -> bool {
        self.mode == "child"
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// 分类阶段的轮询间隔
    pub fn classification_heartbeat(&self) -> Duration {
        self.heartbeat()
            .saturating_mul(self.classification_heartbeat_factor)
    }
}
