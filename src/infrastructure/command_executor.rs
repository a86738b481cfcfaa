//! 命令执行器 - 基础设施层
//!
//! 持有外部进程的启动方式，只暴露"执行命令"的能力

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// 命令执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// 退出码（被信号终止时为 None）
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// 标准输出的第一行（去掉首尾空白）
    pub fn first_line(&self) -> &str {
        self.stdout.lines().next().unwrap_or("").trim()
    }
}

/// 命令执行器
///
/// 职责：
/// - 启动子进程并收集输出
/// - 被丢弃的调用会终止子进程
/// - 不认识作业 / 状态
/// - 不解析输出内容
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    /// 执行命令并等待结束
    ///
    /// # 参数
    /// - `program`: 可执行程序
    /// - `args`: 参数列表（不经过 shell）
    pub async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        debug!("执行命令: {} {:?}", program, args);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = cmd.output().await?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("命令结束: {} 退出码 {:?}", program, result.code);

        Ok(result)
    }
}
