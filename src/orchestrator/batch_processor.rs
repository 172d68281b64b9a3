//! 批量蓝图处理器 - 编排层
//!
//! 应用入口：初始化外部协作方，扫描蓝图目录，分批并发组卷并汇总统计。
//! 每批最多 `max_concurrent_blueprints` 个蓝图，本批全部完成后再开始下一批。

use crate::clients::{HttpClient, HttpQuestionStore, HttpTaxonomyStore, NoDependents};
use crate::config::Config;
use crate::infrastructure::InMemoryStructureStore;
use crate::models::TestBlueprint;
use crate::orchestrator::blueprint_processor;
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_blueprints_loaded, log_startup,
    print_final_stats,
};
use crate::workflow::TestCatalog;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    catalog: Arc<TestCatalog>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(config.max_concurrent_blueprints, config.strict_taxonomy_check);

        let client = HttpClient::new(&config)?;
        let catalog = TestCatalog::new(
            Arc::new(InMemoryStructureStore::new()),
            Arc::new(HttpQuestionStore::new(client.clone())),
            Arc::new(HttpTaxonomyStore::new(client)),
            Arc::new(NoDependents),
            &config,
        );

        Ok(Self::with_catalog(config, Arc::new(catalog)))
    }

    /// 使用已构建的目录（测试或嵌入场景）
    pub fn with_catalog(config: Config, catalog: Arc<TestCatalog>) -> Self {
        Self { config, catalog }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        let blueprints = self.load_blueprints().await?;

        if blueprints.is_empty() {
            warn!("⚠️ 没有找到待处理的蓝图文件，程序结束");
            return Ok(ProcessingStats::default());
        }

        log_blueprints_loaded(blueprints.len(), self.batch_size());

        let stats = self.process_all(blueprints).await?;
        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );
        Ok(stats)
    }

    async fn load_blueprints(&self) -> Result<Vec<TestBlueprint>> {
        info!("\n📁 正在扫描蓝图目录...");
        crate::models::load_all_blueprints(&self.config.blueprint_folder).await
    }

    fn batch_size(&self) -> usize {
        self.config.max_concurrent_blueprints.max(1)
    }

    async fn process_all(&self, blueprints: Vec<TestBlueprint>) -> Result<ProcessingStats> {
        let batch_size = self.batch_size();
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = blueprints.len();
        let total_batches = (total + batch_size - 1) / batch_size;
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        for batch_start in (0..total).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total);
            let batch_num = batch_start / batch_size + 1;

            log_batch_start(batch_num, total_batches, batch_start + 1, batch_end, total);

            let result = self
                .process_batch(&blueprints[batch_start..batch_end], batch_start, semaphore.clone())
                .await?;

            stats.success += result.success;
            stats.failed += result.failed;
            log_batch_complete(batch_num, result.success, result.success + result.failed);
        }

        Ok(stats)
    }

    async fn process_batch(
        &self,
        batch: &[TestBlueprint],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut handles = Vec::with_capacity(batch.len());

        for (idx, blueprint) in batch.iter().enumerate() {
            let index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let catalog = self.catalog.clone();
            let blueprint = blueprint.clone();
            let log_file = self.config.output_log_file.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match blueprint_processor::process_blueprint(&catalog, blueprint, index, &log_file)
                    .await
                {
                    Ok(done) => done,
                    Err(e) => {
                        error!("[蓝图 {}] ❌ 处理过程中发生错误: {:#}", index, e);
                        false
                    }
                }
            });
            handles.push((index, handle));
        }

        let (indices, tasks): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        let mut result = BatchResult::default();
        for (index, joined) in indices.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(true) => result.success += 1,
                Ok(false) => result.failed += 1,
                Err(e) => {
                    error!("[蓝图 {}] 任务执行失败: {}", index, e);
                    result.failed += 1;
                }
            }
        }
        Ok(result)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}
