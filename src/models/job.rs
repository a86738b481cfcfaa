//! 作业标识与状态

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::JobError;

/// 作业 ID 中的标记字符
const JOB_MARKER: char = 'J';

/// 作业 ID（如 `J10`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// 解析作业 ID
    ///
    /// 合法的 ID 恰好包含一个 `J` 标记，且标记后至少还有一个字符
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let trimmed = raw.trim();
        let markers = trimmed.matches(JOB_MARKER).count();
        let has_whitespace = trimmed.chars().any(char::is_whitespace);

        if markers != 1 || trimmed.len() < 2 || has_whitespace || trimmed.contains('.') {
            return Err(JobError::InvalidJobIdFormat {
                input: raw.to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 作业引用：`<作业ID>[.<输出组>]`，如 `J10.particles_selected`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub job: JobId,
    pub output: Option<String>,
}

impl JobRef {
    /// 解析命令行传入的作业引用
    ///
    /// 整个字符串必须恰好包含一个 `J` 标记
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let trimmed = raw.trim();
        if trimmed.matches(JOB_MARKER).count() != 1 {
            return Err(JobError::InvalidJobIdFormat {
                input: raw.to_string(),
            });
        }

        let (job_part, output) = match trimmed.split_once('.') {
            Some((job, output)) if !output.is_empty() => (job, Some(output.to_string())),
            Some((job, _)) => (job, None),
            None => (trimmed, None),
        };

        let job = JobId::parse(job_part).map_err(|_| JobError::InvalidJobIdFormat {
            input: raw.to_string(),
        })?;

        Ok(Self { job, output })
    }

    /// 该作业某个输出组的引用字符串
    pub fn output_slot(job: &JobId, slot: &str) -> String {
        format!("{}.{}", job, slot)
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(output) => write!(f, "{}.{}", self.job, output),
            None => write!(f, "{}", self.job),
        }
    }
}

/// 作业状态
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Building,
    Queued,
    Launched,
    Started,
    Running,
    Waiting,
    Completed,
    Failed,
    Killed,
    /// 格式正确但无法识别的状态，保留原文
    Unknown(String),
}

impl JobStatus {
    /// 从服务返回的文本解析状态
    pub fn from_reply(reply: &str) -> Self {
        let normalized = reply.trim().trim_matches(|c| c == '"' || c == '\'');
        match normalized.to_ascii_lowercase().as_str() {
            "building" => JobStatus::Building,
            "queued" => JobStatus::Queued,
            "launched" => JobStatus::Launched,
            "started" => JobStatus::Started,
            "running" => JobStatus::Running,
            "waiting" => JobStatus::Waiting,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "killed" => JobStatus::Killed,
            _ => JobStatus::Unknown(normalized.to_string()),
        }
    }

    /// 获取状态名称
    pub fn name(&self) -> &str {
        match self {
            JobStatus::Building => "building",
            JobStatus::Queued => "queued",
            JobStatus::Launched => "launched",
            JobStatus::Started => "started",
            JobStatus::Running => "running",
            JobStatus::Waiting => "waiting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Killed => "killed",
            JobStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// failed / killed 不再重试
    pub fn is_fatal(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Killed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 作业句柄：(项目, 作业, 最近一次观察到的状态)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub project: String,
    pub job: JobId,
    pub status: JobStatus,
}

impl JobHandle {
    pub fn new(project: impl Into<String>, job: JobId, status: JobStatus) -> Self {
        Self {
            project: project.into(),
            job,
            status,
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.project, self.job, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_accepts_single_marker() {
        assert_eq!(JobId::parse("J10").unwrap().as_str(), "J10");
        assert_eq!(JobId::parse(" J7 ").unwrap().as_str(), "J7");
    }

    #[test]
    fn test_job_id_rejects_bad_shapes() {
        assert!(JobId::parse("").is_err());
        assert!(JobId::parse("J").is_err());
        assert!(JobId::parse("10").is_err());
        assert!(JobId::parse("J1J2").is_err());
        assert!(JobId::parse("Error Job").is_err());
    }

    #[test]
    fn test_job_ref_with_output_group() {
        let job_ref = JobRef::parse("J10.particles_selected").unwrap();
        assert_eq!(job_ref.job.as_str(), "J10");
        assert_eq!(job_ref.output.as_deref(), Some("particles_selected"));
        assert_eq!(job_ref.to_string(), "J10.particles_selected");
    }

    #[test]
    fn test_job_ref_rejects_multiple_markers() {
        assert!(JobRef::parse("J10.J11").is_err());
        assert!(JobRef::parse("P1").is_err());
    }

    #[test]
    fn test_status_from_reply() {
        assert_eq!(JobStatus::from_reply("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from_reply(" Queued \n"), JobStatus::Queued);
        assert_eq!(JobStatus::from_reply("\"killed\""), JobStatus::Killed);
        assert_eq!(
            JobStatus::from_reply("paused"),
            JobStatus::Unknown("paused".to_string())
        );
    }

    #[test]
    fn test_status_classes() {
        assert!(JobStatus::Completed.is_success());
        assert!(!JobStatus::Completed.is_fatal());
        assert!(JobStatus::Killed.is_fatal());
        assert!(JobStatus::Failed.is_fatal());
        assert!(!JobStatus::Running.is_fatal());
        assert!(!JobStatus::Unknown("paused".into()).is_success());
        assert!(!JobStatus::Unknown("paused".into()).is_fatal());
    }
}
