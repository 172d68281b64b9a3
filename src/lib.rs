//! # Test Catalog
//!
//! 试卷组装与完整性引擎：维护试卷的分区与题目引用，保证序号、分值与去重规则始终成立。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 试卷文档存储，按版本号 compare-and-swap 写入
//!
//! ### ② 外部协作方（Clients）
//! - `clients/` - 题库、学科分类、依赖方注册表的 trait 与 HTTP / 内存实现
//!
//! ### ③ 业务能力层（Services）
//! - `sequencer` - 分区内序号维护
//! - `marking` - 分值解析
//! - `bulk_assembler` - 按条件选题
//! - `validator` - 完整性检查
//! - `projection` - 预览、解析、答案表与统计视图
//!
//! ### ④ 流程层（Workflow）
//! - `CallerCtx` - 调用上下文（调用方、请求 ID、版本前置条件）
//! - `TestCatalog` - 全部对外操作
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/` - 按 TOML 蓝图批量组卷

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{CatalogError, CatalogResult, DependencyError, NotFoundError, ValidationError};
pub use infrastructure::{InMemoryStructureStore, StructureStore};
pub use models::{Test, TestBlueprint};
pub use orchestrator::App;
pub use workflow::{CallerCtx, TestCatalog};
