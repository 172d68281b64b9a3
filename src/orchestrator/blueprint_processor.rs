//! 单个蓝图处理器 - 编排层
//!
//! 按蓝图完成一张试卷的组卷：
//!
//! 1. 建立草稿试卷（含空分区）
//! 2. 逐分区加入固定题目
//! 3. 执行按条件补题规则，不足时记录缺口
//! 4. 完整性检查
//! 5. 蓝图要求时发布
//!
//! 单个步骤失败只影响当前蓝图，批处理继续。

use crate::models::{AddQuestionsRequest, TestBlueprint};
use crate::utils::logging::{append_log_line, truncate_text};
use crate::workflow::{CallerCtx, TestCatalog};
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// 补题统计
#[derive(Debug, Default)]
pub struct FillStats {
    pub explicit: usize,
    pub filled: usize,
    pub shortfall: usize,
}

/// 处理单个蓝图
///
/// # 参数
/// - `catalog`: 试卷目录
/// - `blueprint`: 蓝图
/// - `index`: 蓝图索引（用于日志）
/// - `log_file_path`: 运行日志文件
///
/// # 返回
/// 试卷是否完成组卷（且在要求时已发布）
pub async fn process_blueprint(
    catalog: &TestCatalog,
    blueprint: TestBlueprint,
    index: usize,
    log_file_path: &str,
) -> Result<bool> {
    let ctx = CallerCtx::system();
    log_blueprint_start(index, &blueprint);

    let test = catalog
        .create_test(&ctx, blueprint.to_new_test())
        .await
        .with_context(|| format!("建卷失败: {}", blueprint.code))?;
    let test_id = test.test_id.clone();
    info!("[蓝图 {}] ✓ 草稿已创建: {}", index, test_id);

    let mut stats = FillStats::default();

    // ========== 固定题目 ==========
    for section in &blueprint.sections {
        if section.question_ids.is_empty() {
            continue;
        }
        let request = AddQuestionsRequest {
            section_id: section.section_id.clone(),
            question_ids: section.question_ids.clone(),
            starting_seq: None,
            marks: None,
            negative_marks: None,
            is_bonus: false,
            is_optional: false,
        };
        let committed = catalog
            .add_questions(&ctx, &test_id, request)
            .await
            .with_context(|| format!("分区 {} 加入固定题目失败", section.section_id))?;
        stats.explicit += committed.value.len();
    }

    // ========== 按条件补题 ==========
    for request in blueprint.fill_requests() {
        let section_id = request.section_id.clone();
        match catalog.bulk_add_questions(&ctx, &test_id, request).await {
            Ok(outcome) => {
                stats.filled += outcome.fulfilled;
                stats.shortfall += outcome.shortfall;
            }
            Err(e) => {
                error!("[蓝图 {}] 分区 {} 补题失败: {}", index, section_id, e);
                return Ok(false);
            }
        }
    }

    // ========== 检查与发布 ==========
    let report = catalog
        .validate(&ctx, &test_id)
        .await
        .context("完整性检查失败")?;
    if !report.is_valid() {
        for violation in &report.violations {
            warn!("[蓝图 {}]   - {}", index, violation);
        }
    }

    if blueprint.publish {
        match catalog.publish(&ctx, &test_id).await {
            Ok(_) => info!("[蓝图 {}] 📤 试卷已发布", index),
            Err(e) => {
                error!("[蓝图 {}] 发布失败: {}", index, e);
                log_blueprint_complete(index, &blueprint.code, &stats, false, log_file_path);
                return Ok(false);
            }
        }
    }

    log_blueprint_complete(index, &blueprint.code, &stats, true, log_file_path);
    Ok(stats.shortfall == 0)
}

fn log_blueprint_start(index: usize, blueprint: &TestBlueprint) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[蓝图 {}] 📄 {} ({})",
        index,
        truncate_text(&blueprint.name, 40),
        blueprint.code
    );
    info!(
        "[蓝图 {}] 分区 {} 个，补题规则 {} 条",
        index,
        blueprint.sections.len(),
        blueprint.fill_requests().len()
    );
}

fn log_blueprint_complete(
    index: usize,
    code: &str,
    stats: &FillStats,
    ok: bool,
    log_file_path: &str,
) {
    let line = format!(
        "{} {}: 固定 {} 道, 补题 {} 道, 缺口 {} 道",
        if ok { "✓" } else { "✗" },
        code,
        stats.explicit,
        stats.filled,
        stats.shortfall
    );
    info!("[蓝图 {}] {}", index, line);
    if let Err(e) = append_log_line(log_file_path, &line) {
        warn!("[蓝图 {}] 写入运行日志失败: {}", index, e);
    }
}
