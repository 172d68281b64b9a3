//! 编排层（Orchestration Layer）
//!
//! 批量组卷与流程调度，只做调度和统计，不做具体业务判断。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量蓝图处理器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描并加载蓝图目录（Vec<TestBlueprint>）
//! - 控制并发数量（Semaphore），分批处理
//! - 输出全局统计信息
//!
//! ### `blueprint_processor` - 单个蓝图处理器
//! - 建立草稿试卷
//! - 加入固定题目、执行补题规则
//! - 完整性检查，按需发布
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<TestBlueprint>)
//!     ↓
//! blueprint_processor (处理单个 TestBlueprint)
//!     ↓
//! workflow::TestCatalog (加载 → 变换 → compare-and-swap)
//!     ↓
//! services (能力层：sequencer / marking / bulk_assembler / validator / projection)
//!     ↓
//! clients + infrastructure (题库、分类、结构存储)
//! ```

pub mod batch_processor;
pub mod blueprint_processor;

pub use batch_processor::{App, ProcessingStats};
pub use blueprint_processor::{process_blueprint, FillStats};
