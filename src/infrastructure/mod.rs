//! 基础设施层
//!
//! 持有共享资源（试卷文档存储），只暴露读写能力，不包含业务规则。

pub mod structure_store;

pub use structure_store::{InMemoryStructureStore, StructureStore};
