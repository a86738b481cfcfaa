/// 命令行作业服务客户端
///
/// 通过 `<program> cli '<表达式>'` 调用作业服务，输出第一行为有效载荷
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::clients::job_service::{
    looks_like_error, parse_created_job, parse_status_reply, JobService, JobSpec,
};
use crate::error::ServiceError;
use crate::infrastructure::{CommandExecutor, CommandOutput};
use crate::models::{JobId, JobStatus};
use crate::utils::logging::truncate_text;

/// 命令行作业服务客户端
pub struct CliJobService {
    executor: CommandExecutor,
    program: String,
}

impl CliJobService {
    /// 创建新的命令行客户端
    ///
    /// # 参数
    /// - `executor`: 命令执行器
    /// - `program`: 服务命令行程序（如 `cryosparcm`）
    pub fn new(executor: CommandExecutor, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    /// 执行一条 cli 表达式
    async fn call(&self, op: &'static str, expr: String) -> Result<CommandOutput, ServiceError> {
        debug!("调用作业服务: {}", expr);

        self.executor
            .run(&self.program, &["cli".to_string(), expr])
            .await
            .map_err(|e| ServiceError::Transport {
                op,
                reason: e.to_string(),
            })
    }

    /// 构建 get_job_status 表达式
    pub fn status_expr(project: &str, job: &JobId) -> String {
        format!("get_job_status({},{})", py_str(project), py_str(job.as_str()))
    }

    /// 构建 make_job 表达式
    pub fn make_job_expr(spec: &JobSpec) -> String {
        format!(
            "make_job({},{},{},\"\",None,None,{},{})",
            py_str(&spec.job_type),
            py_str(&spec.project),
            py_str(&spec.workspace),
            py_dict(&spec.params),
            py_dict(&spec.inputs)
        )
    }

    /// 构建 enqueue_job 表达式
    pub fn enqueue_expr(project: &str, job: &JobId, lane: &str) -> String {
        format!(
            "enqueue_job({},{},{})",
            py_str(project),
            py_str(job.as_str()),
            py_str(lane)
        )
    }
}

#[async_trait]
impl JobService for CliJobService {
    async fn get_status(&self, project: &str, job: &JobId) -> Result<JobStatus, ServiceError> {
        let output = self
            .call("get_job_status", Self::status_expr(project, job))
            .await?;

        // 退出码非零时同样按响应内容判断，截断的输出会落入 Malformed
        parse_status_reply(&output.stdout)
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<JobId, ServiceError> {
        let output = self.call("make_job", Self::make_job_expr(spec)).await?;

        if !output.success() {
            return Err(rejected("make_job", &output));
        }

        parse_created_job(&output.stdout)
    }

    async fn enqueue(&self, project: &str, job: &JobId, lane: &str) -> Result<(), ServiceError> {
        let output = self
            .call("enqueue_job", Self::enqueue_expr(project, job, lane))
            .await?;

        if !output.success() || looks_like_error(&output.stdout) {
            return Err(rejected("enqueue_job", &output));
        }

        debug!("作业 {} 已入队 ({}): {}", job, lane, output.first_line());
        Ok(())
    }
}

fn rejected(op: &'static str, output: &CommandOutput) -> ServiceError {
    let detail = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    warn!("{} 被拒绝 (退出码 {:?}): {}", op, output.code, truncate_text(detail, 200));

    ServiceError::Rejected {
        op,
        reason: format!("退出码 {:?}: {}", output.code, truncate_text(detail, 200)),
    }
}

/// Python 字符串字面量
fn py_str(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Python 字典字面量（键值均为字符串）
fn py_dict(map: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}:{}", py_str(k), py_str(v)))
        .collect();
    format!("{{{}}}", entries.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_expr() {
        let job = JobId::parse("J10").unwrap();
        assert_eq!(
            CliJobService::status_expr("P1", &job),
            r#"get_job_status("P1","J10")"#
        );
    }

    #[test]
    fn test_make_job_expr() {
        let spec = JobSpec::new("class_2D", "P1", "W2")
            .param("compute_use_ssd", "False")
            .param("class2D_K", 20)
            .input("particles", "J10.particles_selected");

        assert_eq!(
            CliJobService::make_job_expr(&spec),
            r#"make_job("class_2D","P1","W2","",None,None,{"class2D_K":"20","compute_use_ssd":"False"},{"particles":"J10.particles_selected"})"#
        );
    }

    #[test]
    fn test_enqueue_expr() {
        let job = JobId::parse("J12").unwrap();
        assert_eq!(
            CliJobService::enqueue_expr("P1", &job, "default"),
            r#"enqueue_job("P1","J12","default")"#
        );
    }

    #[test]
    fn test_py_str_escapes_quotes() {
        assert_eq!(py_str(r#"a"b"#), r#""a\"b""#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_service_against_fake_program() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let script = dir.path().join("fake-cli");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$2\" in\n  get_job_status*) echo completed ;;\n  make_job*) echo J21 ;;\n  enqueue_job*) echo launched ;;\nesac\n",
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let service = CliJobService::new(CommandExecutor::new(), script.display().to_string());
        let job = JobId::parse("J10").unwrap();

        assert_eq!(
            service.get_status("P1", &job).await.unwrap(),
            JobStatus::Completed
        );
        let created = service
            .create_job(&JobSpec::new("single_select", "P1", "W2"))
            .await
            .unwrap();
        assert_eq!(created.as_str(), "J21");
        assert!(service.enqueue("P1", &created, "default").await.is_ok());
    }

    #[tokio::test]
    async fn test_cli_service_missing_program_is_transport_error() {
        let service = CliJobService::new(CommandExecutor::new(), "definitely-not-cryosparcm");
        let job = JobId::parse("J10").unwrap();
        let err = service.get_status("P1", &job).await.unwrap_err();
        assert!(err.is_transient());
    }
}
