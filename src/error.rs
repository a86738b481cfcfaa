use thiserror::Error;

use crate::models::{JobId, JobStatus};

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 作业流程错误
    #[error("作业错误: {0}")]
    Job(#[from] JobError),
    /// 作业服务调用错误
    #[error("作业服务错误: {0}")]
    Service(#[from] ServiceError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 元数据读取或解析失败
    #[error("元数据错误 ({path}): {reason}")]
    Metadata { path: String, reason: String },
    /// 阶段超时
    #[error("阶段 {stage} 超时 (限时 {secs} 秒)")]
    Timeout { stage: &'static str, secs: u64 },
    /// 运行被取消
    #[error("运行已取消")]
    Cancelled,
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 作业流程错误
#[derive(Debug, Error)]
pub enum JobError {
    /// 作业 ID 格式不合法
    #[error("作业 ID 格式错误: {input:?}")]
    InvalidJobIdFormat { input: String },
    /// 粒子数不足，不提交任何作业
    #[error("粒子数不足: {particles} <= 阈值 {threshold}")]
    InsufficientParticles { particles: u64, threshold: u64 },
    /// 作业进入失败状态（failed / killed）
    #[error("作业 {job} 进入致命状态: {status}")]
    FatalJobStatus { job: JobId, status: JobStatus },
    /// 状态查询连续返回异常响应，超过重试上限
    #[error("作业 {job} 状态查询连续失败 {attempts} 次，最后一次: {last}")]
    TransientQueryError {
        job: JobId,
        attempts: u32,
        last: String,
    },
    /// 服务拒绝了创建或入队请求
    #[error("提交失败 ({op}): {reason}")]
    SubmissionFailure { op: &'static str, reason: String },
}

/// 作业服务客户端错误
///
/// 由适配器在唯一的文本解析边界产生
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// 响应为空或被截断
    #[error("响应格式错误: {reply:?}")]
    Malformed { reply: String },
    /// 传输层故障（进程无法启动、HTTP 请求失败等）
    #[error("传输失败 ({op}): {reason}")]
    Transport { op: &'static str, reason: String },
    /// 服务明确拒绝了请求
    #[error("服务拒绝了 {op}: {reason}")]
    Rejected { op: &'static str, reason: String },
}

impl ServiceError {
    /// 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Malformed { .. } | ServiceError::Transport { .. }
        )
    }
}

/// 后续动作（外部可执行程序）错误
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// 进程启动失败
    #[error("无法启动 {program}: {reason}")]
    SpawnFailed { program: String, reason: String },
    /// 进程以非零状态退出
    #[error("{program} 退出码非零: {code:?}")]
    NonZeroExit { program: String, code: Option<i32> },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    Invalid { key: &'static str, reason: String },
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建提交失败错误
    pub fn submission_failed(op: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Job(JobError::SubmissionFailure {
            op,
            reason: err.to_string(),
        })
    }

    /// 创建文件错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// 进程退出码
    ///
    /// - 1: 作业 ID 非法或粒子数不足
    /// - 2: 其他致命错误
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Job(JobError::InvalidJobIdFormat { .. })
            | AppError::Job(JobError::InsufficientParticles { .. }) => 1,
            _ => 2,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let invalid = AppError::Job(JobError::InvalidJobIdFormat {
            input: "P1".to_string(),
        });
        let too_few = AppError::Job(JobError::InsufficientParticles {
            particles: 10,
            threshold: 100,
        });
        let timeout = AppError::Timeout {
            stage: "classification",
            secs: 60,
        };

        assert_eq!(invalid.exit_code(), 1);
        assert_eq!(too_few.exit_code(), 1);
        assert_eq!(timeout.exit_code(), 2);
        assert_eq!(AppError::Cancelled.exit_code(), 2);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ServiceError::Malformed {
            reply: "ok".to_string()
        }
        .is_transient());
        assert!(ServiceError::Transport {
            op: "get_job_status",
            reason: "connection reset".to_string()
        }
        .is_transient());
        assert!(!ServiceError::Rejected {
            op: "make_job",
            reason: "unknown job type".to_string()
        }
        .is_transient());
    }
}
