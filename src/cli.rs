//! 命令行参数

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::AppResult;

/// 等待上游作业完成后提交 2D 分类，并为每个类别并行提交挑选作业
#[derive(Parser, Debug, Default)]
#[command(name = "deep2d")]
#[command(version)]
pub struct Cli {
    /// 输入作业（child 模式为上游作业，否则为分类作业）
    #[arg(long)]
    pub input: Option<String>,

    /// 项目 ID
    #[arg(long)]
    pub pid: Option<String>,

    /// 工作区 ID
    #[arg(long)]
    pub wid: Option<String>,

    /// 运行模式：child 或其他（直接扇出）
    #[arg(long)]
    pub mode: Option<String>,

    /// 直接模式下的类别数
    #[arg(long)]
    pub k: Option<u32>,

    /// 粒子数阈值
    #[arg(long = "num_thre", alias = "num-thre")]
    pub num_thre: Option<u64>,

    /// 轮询间隔（秒）
    #[arg(long)]
    pub heartbeat: Option<u64>,

    /// 保留参数
    #[arg(long)]
    pub depth: Option<u32>,

    /// 项目目录
    #[arg(long = "project_path", alias = "project-path")]
    pub project_path: Option<PathBuf>,

    /// 同时运行的挑选任务数上限
    #[arg(long = "max-parallel")]
    pub max_parallel: Option<usize>,

    /// TOML 配置文件
    #[arg(long, env = "DEEP2D_CONFIG")]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 合并配置：默认值 < TOML 文件 < 环境变量 < 命令行
    pub fn into_config(self) -> AppResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?.with_env(),
            None => Config::from_env(),
        };

        self.apply(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// 将命令行参数覆盖到配置上
    pub fn apply(self, config: &mut Config) {
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(pid) = self.pid {
            config.project_id = pid;
        }
        if let Some(wid) = self.wid {
            config.workspace_id = wid;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(k) = self.k {
            config.class_count_hint = k;
        }
        if let Some(num_thre) = self.num_thre {
            config.particle_threshold = num_thre;
        }
        if let Some(heartbeat) = self.heartbeat {
            config.heartbeat_secs = heartbeat;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(project_path) = self.project_path {
            config.project_path = project_path;
        }
        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel_selections = max_parallel;
        }
        if self.verbose {
            config.verbose_logging = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_driver_flags() {
        let cli = Cli::parse_from([
            "deep2d",
            "--input",
            "J10",
            "--pid",
            "P3",
            "--wid",
            "W1",
            "--mode",
            "child",
            "--k",
            "7",
            "--num_thre",
            "1000",
            "--heartbeat",
            "5",
            "--project_path",
            "/data/P3",
        ]);

        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.input.as_deref(), Some("J10"));
        assert_eq!(config.project_id, "P3");
        assert_eq!(config.workspace_id, "W1");
        assert_eq!(config.class_count_hint, 7);
        assert_eq!(config.particle_threshold, 1000);
        assert_eq!(config.heartbeat_secs, 5);
        assert_eq!(config.project_path, PathBuf::from("/data/P3"));
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let cli = Cli::parse_from(["deep2d", "--input", "J12", "--mode", "direct"]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.mode, "direct");
        assert!(!config.is_child_mode());
        assert_eq!(config.project_id, "P1");
        assert_eq!(config.particle_threshold, 100_000);
    }

    #[test]
    fn test_into_config_without_file() {
        let cli = Cli::parse_from(["deep2d", "--input", "J10", "--max-parallel", "3"]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.input.as_deref(), Some("J10"));
        assert_eq!(config.max_parallel_selections, 3);
        assert_eq!(config.lane, "default");
    }

    #[test]
    fn test_into_config_cli_overrides_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "project_id = \"P7\"\nheartbeat_secs = 30\n").unwrap();

        let cli = Cli::parse_from([
            "deep2d",
            "--config",
            path.to_str().unwrap(),
            "--heartbeat",
            "5",
        ]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.project_id, "P7");
        assert_eq!(config.heartbeat_secs, 5);
    }

    #[test]
    fn test_kebab_case_aliases() {
        let cli = Cli::parse_from(["deep2d", "--num-thre", "500", "--project-path", "/tmp/p"]);
        assert_eq!(cli.num_thre, Some(500));
        assert_eq!(cli.project_path, Some(PathBuf::from("/tmp/p")));
    }
}
