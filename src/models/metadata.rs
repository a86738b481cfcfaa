use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 已完成作业的结果元数据（job.json）
///
/// 只保留编排需要的字段，其余字段忽略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output_results: Vec<OutputResult>,
}

/// 单个输出结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputResult {
    #[serde(default)]
    pub name: Option<String>,
    /// 条目数，服务端可能写成数字或字符串，保留原始 JSON
    #[serde(default)]
    pub num_items: Vec<JsonValue>,
}
