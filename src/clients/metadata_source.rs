/// 作业元数据来源
use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::AppResult;
use crate::models::loaders::job_json_path;
use crate::models::{load_job_metadata, JobId, JobMetadata};

/// 元数据来源
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// 获取已完成作业的结果元数据
    async fn fetch(&self, job: &JobId) -> AppResult<JobMetadata>;
}

/// 从项目目录读取 `<项目目录>/<作业ID>/job.json`
pub struct ProjectDirMetadata {
    project_path: PathBuf,
}

impl ProjectDirMetadata {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for ProjectDirMetadata {
    async fn fetch(&self, job: &JobId) -> AppResult<JobMetadata> {
        let path = job_json_path(&self.project_path, job);
        tracing::info!("📁 读取作业 {} 元数据: {}", job, path.display());
        load_job_metadata(&path).await
    }
}
