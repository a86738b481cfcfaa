//! 作业服务接口
//!
//! 能力集合：查询状态、创建作业、作业入队。
//! 所有文本解析都在本模块的解析函数中完成，适配器只负责传输。

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::ServiceError;
use crate::models::{JobId, JobStatus};

/// 作业创建参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_type: String,
    pub project: String,
    pub workspace: String,
    pub params: BTreeMap<String, String>,
    pub inputs: BTreeMap<String, String>,
}

impl JobSpec {
    pub fn new(
        job_type: impl Into<String>,
        project: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            project: project.into(),
            workspace: workspace.into(),
            params: BTreeMap::new(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn input(mut self, slot: impl Into<String>, source: impl Into<String>) -> Self {
        self.inputs.insert(slot.into(), source.into());
        self
    }
}

/// 作业服务客户端
#[async_trait]
pub trait JobService: Send + Sync {
    /// 查询作业状态
    async fn get_status(&self, project: &str, job: &JobId) -> Result<JobStatus, ServiceError>;

    /// 创建作业，返回新作业 ID
    async fn create_job(&self, spec: &JobSpec) -> Result<JobId, ServiceError>;

    /// 作业入队
    async fn enqueue(&self, project: &str, job: &JobId, lane: &str) -> Result<(), ServiceError>;
}

/// 短于此长度的状态响应视为被截断
const MIN_STATUS_LEN: usize = 4;

fn created_job_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^J\d+$").expect("静态正则"))
}

/// 去掉 Python repr 留下的引号
fn strip_quotes(line: &str) -> &str {
    line.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// 服务端异常输出（Python 回溯等）
pub fn looks_like_error(reply: &str) -> bool {
    reply.contains("Traceback") || reply.contains("Error") || reply.contains("Exception")
}

/// 解析状态响应的第一行
///
/// 空响应、截断响应、异常输出都视为格式错误（可重试）
pub fn parse_status_reply(reply: &str) -> Result<JobStatus, ServiceError> {
    let line = strip_quotes(reply.lines().next().unwrap_or(""));

    if line.chars().count() < MIN_STATUS_LEN || looks_like_error(line) {
        return Err(ServiceError::Malformed {
            reply: line.to_string(),
        });
    }

    Ok(JobStatus::from_reply(line))
}

/// 解析创建作业的响应，必须是 `J<数字>`
pub fn parse_created_job(reply: &str) -> Result<JobId, ServiceError> {
    let line = strip_quotes(reply.lines().next().unwrap_or(""));

    if !created_job_regex().is_match(line) {
        return Err(ServiceError::Rejected {
            op: "make_job",
            reason: format!("返回的作业 ID 不合法: {:?}", line),
        });
    }

    JobId::parse(line).map_err(|e| ServiceError::Rejected {
        op: "make_job",
        reason: e.to_string(),
    })
}
