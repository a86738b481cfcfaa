use crate::error::{AppError, AppResult};
use crate::models::job::JobId;
use crate::models::metadata::JobMetadata;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 作业元数据文件路径：`<项目目录>/<作业ID>/job.json`
pub fn job_json_path(project_path: &Path, job: &JobId) -> PathBuf {
    project_path.join(job.as_str()).join("job.json")
}

/// 从 job.json 加载作业元数据
pub async fn load_job_metadata(path: &Path) -> AppResult<JobMetadata> {
    if !path.exists() {
        return Err(AppError::Metadata {
            path: path.display().to_string(),
            reason: "文件不存在".to_string(),
        });
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(path.display().to_string(), e))?;

    let metadata: JobMetadata =
        serde_json::from_str(&content).map_err(|e| AppError::Metadata {
            path: path.display().to_string(),
            reason: format!("无法解析 JSON: {}", e),
        })?;

    tracing::debug!(
        "已加载元数据: {} (输出结果 {} 组)",
        path.display(),
        metadata.output_results.len()
    );

    Ok(metadata)
}
