/// JSON-RPC 作业服务客户端
///
/// 直接调用作业服务的命令端口（`http://<host>:<port>/api`），不经过命令行
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::clients::job_service::{parse_created_job, parse_status_reply, JobService, JobSpec};
use crate::error::ServiceError;
use crate::models::{JobId, JobStatus};

/// JSON-RPC 响应
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// JSON-RPC 作业服务客户端
pub struct RpcJobService {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl RpcJobService {
    /// 创建新的 RPC 客户端
    pub fn new(host: &str, port: u16, request_timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Transport {
                op: "connect",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("http://{}:{}/api", host, port),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 构建请求体
    fn request_body(&self, method: &str, params: Vec<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// 发送一次调用，返回 result 字段
    async fn call(&self, op: &'static str, params: Vec<Value>) -> Result<Value, ServiceError> {
        let body = self.request_body(op, params);
        debug!("RPC 请求 {}: {}", self.endpoint, body);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                op,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Transport {
                op,
                reason: format!("HTTP {}", response.status()),
            });
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| ServiceError::Malformed {
            reply: e.to_string(),
        })?;

        interpret_response(op, parsed)
    }
}

fn interpret_response(op: &'static str, response: RpcResponse) -> Result<Value, ServiceError> {
    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ServiceError::Rejected {
            op,
            reason: message,
        });
    }

    response.result.ok_or_else(|| ServiceError::Malformed {
        reply: "响应缺少 result 字段".to_string(),
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl JobService for RpcJobService {
    async fn get_status(&self, project: &str, job: &JobId) -> Result<JobStatus, ServiceError> {
        let result = self
            .call("get_job_status", vec![json!(project), json!(job.as_str())])
            .await?;
        parse_status_reply(&value_text(&result))
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<JobId, ServiceError> {
        let params = vec![
            json!(spec.job_type),
            json!(spec.project),
            json!(spec.workspace),
            json!(""),
            Value::Null,
            Value::Null,
            json!(spec.params),
            json!(spec.inputs),
        ];

        let result = self.call("make_job", params).await.map_err(|e| match e {
            ServiceError::Transport { reason, .. } | ServiceError::Malformed { reply: reason } => {
                ServiceError::Rejected {
                    op: "make_job",
                    reason,
                }
            }
            other => other,
        })?;

        parse_created_job(&value_text(&result))
    }

    async fn enqueue(&self, project: &str, job: &JobId, lane: &str) -> Result<(), ServiceError> {
        let result = self
            .call(
                "enqueue_job",
                vec![json!(project), json!(job.as_str()), json!(lane)],
            )
            .await?;
        debug!("作业 {} 已入队 ({}): {}", job, lane, value_text(&result));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> RpcJobService {
        RpcJobService::new("localhost", 39002, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(create_test_service().endpoint(), "http://localhost:39002/api");
    }

    #[test]
    fn test_request_body_ids_increase() {
        let service = create_test_service();
        let first = service.request_body("get_job_status", vec![json!("P1"), json!("J10")]);
        let second = service.request_body("get_job_status", vec![json!("P1"), json!("J10")]);
        assert_eq!(first["jsonrpc"], "2.0");
        assert_eq!(first["params"], json!(["P1", "J10"]));
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
    }

    #[test]
    fn test_interpret_error_response() {
        let response: RpcResponse = serde_json::from_value(json!({
            "id": 1,
            "error": {"code": -32000, "message": "project P9 does not exist"}
        }))
        .unwrap();
        let err = interpret_response("make_job", response).unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { .. }));
    }

    #[test]
    fn test_interpret_missing_result() {
        let response: RpcResponse = serde_json::from_value(json!({"id": 1})).unwrap();
        let err = interpret_response("get_job_status", response).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_interpret_result() {
        let response: RpcResponse =
            serde_json::from_value(json!({"id": 1, "result": "completed", "error": null})).unwrap();
        let value = interpret_response("get_job_status", response).unwrap();
        assert_eq!(parse_status_reply(&value_text(&value)).unwrap(), JobStatus::Completed);
    }
}
