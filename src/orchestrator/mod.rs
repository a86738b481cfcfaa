//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责阶段调度和并发控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `pipeline` - 流水线主程序
//! - 管理应用生命周期（初始化、运行）
//! - 校验输入、串行驱动各阶段
//! - 整体时限与取消
//! - 输出全局统计信息
//!
//! ### `classification` - 分类作业调度
//! - 提交、入队 2D 分类作业并等待完成
//!
//! ### `fanout` - 挑选扇出协调器
//! - 为每个类别启动一个挑选任务（Semaphore 限制并发）
//! - 通过 WaitSet 等待全部任务结束
//! - 汇总结果、写失败记录
//!
//! ### `wait_set` - 等待集合
//! - 互斥锁保护的未完成任务集合，watch 通道广播剩余数量
//!
//! ## 层次关系
//!
//! ```text
//! pipeline (一次运行)
//!     ↓
//! classification / fanout (单个阶段)
//!     ↓
//! workflow::SelectionFlow (处理单个类别)
//!     ↓
//! services (能力层：poller / resolver / follow_up / failure)
//!     ↓
//! clients / infrastructure (作业服务、外部进程)
//! ```

pub mod classification;
pub mod fanout;
pub mod pipeline;
pub mod wait_set;

// 重新导出主要类型
pub use classification::ClassificationDispatcher;
pub use fanout::{FanOutCoordinator, FanOutReport};
pub use pipeline::{App, RunSummary};
pub use wait_set::{WaitSet, WaitSetError};
