//! 失败记录服务 - 业务能力层
//!
//! 只负责"写失败记录文件"能力，不关心流程

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::JobId;

/// 失败记录服务
///
/// 职责：
/// - 将失败的挑选任务追加写入文件
/// - 只处理单个任务
/// - 不关心流程顺序
pub struct FailureWriter {
    path: String,
}

impl FailureWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// 写入一条失败记录
    ///
    /// # 参数
    /// - `classification`: 分类作业
    /// - `class_idx`: 类别索引
    /// - `reason`: 失败原因
    pub async fn write(&self, classification: &JobId, class_idx: u32, reason: &str) -> AppResult<()> {
        debug!(
            "写入失败记录: 分类作业 {} | 类别 {} | 原因: {}",
            classification, class_idx, reason
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::io(&self.path, e))?;

        let line = format!(
            "{} | 分类作业 {} | 类别 {} | 原因: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            classification,
            class_idx,
            reason
        );

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::io(&self.path, e))?;
        // tokio 的文件写入在后台线程完成，返回前必须 flush
        file.flush()
            .await
            .map_err(|e| AppError::io(&self.path, e))?;

        Ok(())
    }
}

impl Default for FailureWriter {
    fn default() -> Self {
        Self::with_path("failed_selections.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_appends() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("failed.txt");
        let writer = FailureWriter::with_path(path.display().to_string());
        let job = JobId::parse("J12").unwrap();

        for class_idx in 0..20u32 {
            writer
                .write(&job, class_idx, &format!("exit code {}", class_idx))
                .await
                .unwrap();

            // write 返回后内容必须已经落盘
            let content = std::fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines.len(), class_idx as usize + 1);
            assert!(lines[class_idx as usize].contains(&format!("类别 {}", class_idx)));
        }
    }
}
