//! 试卷目录 - 流程层
//!
//! 核心职责：把每个对外操作编排为"加载 → 纯内存变换 → compare-and-swap 写回"。
//!
//! - 外部调用（题库、分类、依赖方）只发生在加载之前或写回之后，不与写入交织
//! - 变换失败时不写入，调用方看到的结构保持不变
//! - 版本冲突原样返回给调用方，这里不做自动重试

use chrono::Utc;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::{DependentRegistry, QuestionStore, TaxonomyStore};
use crate::config::Config;
use crate::error::{CatalogError, CatalogResult, NotFoundError, ValidationError};
use crate::infrastructure::StructureStore;
use crate::models::{
    AddQuestionsRequest, AnswerKeyView, BulkAddOutcome, BulkAddRequest, Committed, MarksOverride,
    NewSection, NewTest, QuestionReference, QuestionSummary, ReorderEntry, ReplaceRequest,
    ResyncOutcome, Section, Test, TestFilter, TestMetadataUpdate, TestPage, TestStats, TestStatus,
    TestView, ValidationReport,
};
use crate::services::{
    bulk_assembler, marking, projection, sequencer, validator, CheckOptions, ContentMode,
    ReferenceFlags,
};
use crate::workflow::ctx::CallerCtx;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug 正则无效")
});

/// 试卷目录
///
/// 持有结构存储与外部协作方，本身无状态，可在任务间共享（`Arc<TestCatalog>`）。
pub struct TestCatalog {
    structure: Arc<dyn StructureStore>,
    questions: Arc<dyn QuestionStore>,
    taxonomy: Arc<dyn TaxonomyStore>,
    dependents: Arc<dyn DependentRegistry>,
    strict_taxonomy: bool,
    max_bulk_count: usize,
}

impl TestCatalog {
    /// 创建新的试卷目录
    pub fn new(
        structure: Arc<dyn StructureStore>,
        questions: Arc<dyn QuestionStore>,
        taxonomy: Arc<dyn TaxonomyStore>,
        dependents: Arc<dyn DependentRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            structure,
            questions,
            taxonomy,
            dependents,
            strict_taxonomy: config.strict_taxonomy_check,
            max_bulk_count: config.max_bulk_count,
        }
    }

    // ========== 试卷 ==========

    /// 新建草稿试卷
    ///
    /// 未指定系列时生成独立系列 `standalone_<uuid>`，套号为 1；
    /// 指定系列但未指定套号时取该系列当前最大套号 + 1。
    pub async fn create_test(&self, ctx: &CallerCtx, new_test: NewTest) -> CatalogResult<Test> {
        if !is_valid_slug(&new_test.slug) {
            return Err(ValidationError::InvalidSlug {
                slug: new_test.slug,
            }
            .into());
        }

        let subjects: BTreeSet<&str> = new_test
            .sections
            .iter()
            .map(|s| s.subject_id.as_str())
            .collect();
        for subject_id in subjects {
            self.ensure_subject(subject_id).await?;
        }

        let (series_id, test_number) = match (new_test.series_id, new_test.test_number) {
            (Some(series_id), Some(n)) => (series_id, n),
            (Some(series_id), None) => {
                let next = self.next_test_number(&series_id).await?;
                (series_id, next)
            }
            (None, n) => (
                format!("standalone_{}", Uuid::new_v4().simple()),
                n.unwrap_or(1),
            ),
        };

        let test_id = format!("test_{}", Uuid::new_v4().simple());
        let mut sections = Vec::with_capacity(new_test.sections.len());
        let mut seen_ids = BTreeSet::new();
        for (idx, new_section) in new_test.sections.into_iter().enumerate() {
            let section = build_section(new_section, idx as u32 + 1)?;
            for q in &section.questions {
                if !seen_ids.insert(q.question_id.clone()) {
                    return Err(ValidationError::DuplicateInRequest {
                        question_ids: vec![q.question_id.clone()],
                    }
                    .into());
                }
            }
            ensure_section_unique(&sections, &section)?;
            sections.push(section);
        }

        let now = Utc::now();
        let mut test = Test {
            test_id,
            code: new_test.code,
            slug: new_test.slug,
            series_id,
            test_number,
            name: new_test.name,
            description: new_test.description,
            sections,
            settings: new_test.settings,
            solutions: new_test.solutions,
            status: TestStatus::Draft,
            is_active: true,
            tags: new_test.tags,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        test.version = self.structure.insert(test.clone()).await?;
        info!(
            "{} ✓ 新建试卷 {} ({}): {} 个分区",
            ctx,
            test.test_id,
            test.code,
            test.sections.len()
        );
        Ok(test)
    }

    pub async fn get_test(&self, _ctx: &CallerCtx, test_id: &str) -> CatalogResult<Test> {
        self.structure.load(test_id).await
    }

    pub async fn list_tests(&self, _ctx: &CallerCtx, filter: &TestFilter) -> CatalogResult<TestPage> {
        self.structure.list(filter).await
    }

    /// 修改试卷元数据、分区元数据与分区顺序
    pub async fn update_test_metadata(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        update: TestMetadataUpdate,
    ) -> CatalogResult<Test> {
        let mut test = self.load_for_write(ctx, test_id).await?;

        if let Some(name) = update.name {
            test.name = name;
        }
        if let Some(description) = update.description {
            test.description = Some(description);
        }
        if let Some(settings) = update.settings {
            test.settings = settings;
        }
        if let Some(solutions) = update.solutions {
            test.solutions = solutions;
        }
        if let Some(is_active) = update.is_active {
            test.is_active = is_active;
        }
        if let Some(tags) = update.tags {
            test.tags = tags;
        }

        for patch in update.sections {
            let idx = section_index(&test, &patch.section_id)?;
            let section = &mut test.sections[idx];
            if let Some(name) = patch.name {
                section.name = name;
            }
            if let Some(scheme) = patch.marking_scheme {
                section.marking_scheme = scheme;
            }
            if let Some(duration) = patch.duration_minutes {
                section.duration_minutes = Some(duration);
            }
            if let Some(is_optional) = patch.is_optional {
                section.is_optional = is_optional;
            }
        }

        if let Some(order) = update.section_order {
            apply_section_order(&mut test, &order)?;
        }

        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 试卷 {} 元数据已更新 (版本 {})", ctx, test_id, version);
        Ok(test)
    }

    /// 删除试卷；仍有依赖方引用时拒绝
    pub async fn delete_test(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<()> {
        let dependents = self.dependents.dependents(test_id).await?;
        if !dependents.is_empty() {
            warn!("{} ⚠️ 试卷 {} 仍被 {} 处引用，拒绝删除", ctx, test_id, dependents.len());
            return Err(ValidationError::TestInUse {
                test_id: test_id.to_string(),
                dependents,
            }
            .into());
        }

        let test = self.load_for_write(ctx, test_id).await?;
        self.structure.delete(test_id, test.version).await?;
        info!("{} ✓ 试卷 {} 已删除", ctx, test_id);
        Ok(())
    }

    // ========== 分区 ==========

    /// 追加分区，`display_order` 取 N+1
    pub async fn add_section(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        new_section: NewSection,
    ) -> CatalogResult<Committed<Section>> {
        self.ensure_subject(&new_section.subject_id).await?;

        let mut test = self.load_for_write(ctx, test_id).await?;
        let section = build_section(new_section, test.sections.len() as u32 + 1)?;
        ensure_section_unique(&test.sections, &section)?;

        let existing = test.question_ids();
        let clashes: Vec<String> = section
            .questions
            .iter()
            .filter(|q| existing.contains(&q.question_id))
            .map(|q| q.question_id.clone())
            .collect();
        if !clashes.is_empty() {
            return Err(ValidationError::AlreadyInTest {
                question_ids: clashes,
            }
            .into());
        }

        test.sections.push(section.clone());
        let version = self.commit(ctx, &mut test).await?;
        info!(
            "{} ✓ 试卷 {} 新增分区 {} (版本 {})",
            ctx, test_id, section.section_id, version
        );
        Ok(Committed {
            version,
            value: section,
        })
    }

    /// 删除分区及其全部引用，其余分区的显示顺序重新压缩
    pub async fn remove_section(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        section_id: &str,
    ) -> CatalogResult<Committed<Section>> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = section_index(&test, section_id)?;
        let removed = test.sections.remove(idx);
        compact_display_order(&mut test);

        let version = self.commit(ctx, &mut test).await?;
        info!(
            "{} ✓ 试卷 {} 删除分区 {} ({} 道题) (版本 {})",
            ctx,
            test_id,
            section_id,
            removed.questions.len(),
            version
        );
        Ok(Committed {
            version,
            value: removed,
        })
    }

    // ========== 题目引用 ==========

    /// 按 ID 加题
    ///
    /// 题目必须存在、学科与分区一致、分值可解析，且不能已在试卷中。
    /// 指定 `starting_seq` 时从该位置插入，否则追加到末尾。
    pub async fn add_questions(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        request: AddQuestionsRequest,
    ) -> CatalogResult<Committed<Vec<QuestionReference>>> {
        if request.question_ids.is_empty() {
            return Err(ValidationError::EmptyQuestionIds.into());
        }
        let mut seen = BTreeSet::new();
        let repeated: Vec<String> = request
            .question_ids
            .iter()
            .filter(|id| !seen.insert(id.as_str()))
            .cloned()
            .collect();
        if !repeated.is_empty() {
            return Err(ValidationError::DuplicateInRequest {
                question_ids: repeated,
            }
            .into());
        }

        let summaries = self.fetch_summaries(&request.question_ids).await?;

        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = section_index(&test, &request.section_id)?;

        let existing = test.question_ids();
        let already: Vec<String> = request
            .question_ids
            .iter()
            .filter(|id| existing.contains(*id))
            .cloned()
            .collect();
        if !already.is_empty() {
            return Err(ValidationError::AlreadyInTest {
                question_ids: already,
            }
            .into());
        }

        let flags = ReferenceFlags {
            marks: request.marks,
            negative_marks: request.negative_marks,
            is_bonus: request.is_bonus,
            is_optional: request.is_optional,
        };
        let refs = summaries
            .iter()
            .map(|q| bulk_assembler::snapshot(&test.sections[idx], q, flags))
            .collect::<CatalogResult<Vec<_>>>()?;

        let section = &mut test.sections[idx];
        let added = match request.starting_seq {
            Some(at) => sequencer::insert_at(section, at, refs)?,
            None => sequencer::append(section, refs),
        };

        let version = self.commit(ctx, &mut test).await?;
        info!(
            "{} ✓ 分区 {} 加入 {} 道题 (版本 {})",
            ctx,
            request.section_id,
            added.len(),
            version
        );
        Ok(Committed {
            version,
            value: added,
        })
    }

    /// 按条件批量加题
    ///
    /// 候选不足时加入全部可用题目并报告缺口；一道候选都没有时返回错误。
    pub async fn bulk_add_questions(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        request: BulkAddRequest,
    ) -> CatalogResult<BulkAddOutcome> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = section_index(&test, &request.section_id)?;
        let query =
            bulk_assembler::build_query(&test, &test.sections[idx], &request, self.max_bulk_count)?;
        for topic_id in &query.criteria.topic_ids {
            self.ensure_topic(topic_id, &test.sections[idx].subject_id).await?;
        }

        let candidates = bulk_assembler::select(
            self.questions.as_ref(),
            &query,
            request.strategy,
            request.count,
            request.seed,
        )
        .await?;
        if candidates.is_empty() {
            warn!("{} ⚠️ 分区 {} 没有符合条件的候选题", ctx, request.section_id);
            return Err(ValidationError::NoCandidates {
                section_id: request.section_id,
            }
            .into());
        }

        let refs = candidates
            .iter()
            .map(|q| bulk_assembler::snapshot(&test.sections[idx], q, ReferenceFlags::default()))
            .collect::<CatalogResult<Vec<_>>>()?;
        let added = sequencer::append(&mut test.sections[idx], refs);

        let version = self.commit(ctx, &mut test).await?;
        let fulfilled = added.len();
        let shortfall = request.count.saturating_sub(fulfilled);
        if shortfall > 0 {
            warn!(
                "{} ⚠️ 分区 {} 批量加题不足: 需要 {}, 实际 {}",
                ctx, request.section_id, request.count, fulfilled
            );
        } else {
            info!(
                "{} ✓ 分区 {} 按 {} 策略加入 {} 道题 (版本 {})",
                ctx,
                request.section_id,
                request.strategy.as_str(),
                fulfilled,
                version
            );
        }

        Ok(BulkAddOutcome {
            version,
            section_id: request.section_id,
            strategy: request.strategy,
            requested: request.count,
            fulfilled,
            shortfall,
            added,
        })
    }

    /// 删除题目引用，所在分区序号随之压缩
    pub async fn remove_question(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        question_id: &str,
    ) -> CatalogResult<Committed<QuestionReference>> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = test
            .locate(question_id)
            .ok_or_else(|| CatalogError::reference_not_found(test_id, question_id))?;
        let removed = sequencer::remove(&mut test.sections[idx], question_id)
            .ok_or_else(|| CatalogError::reference_not_found(test_id, question_id))?;

        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 移除题目 {} (版本 {})", ctx, question_id, version);
        Ok(Committed {
            version,
            value: removed,
        })
    }

    /// 整体重排一个分区
    pub async fn reorder_section(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        section_id: &str,
        entries: &[ReorderEntry],
    ) -> CatalogResult<Committed<Vec<QuestionReference>>> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = section_index(&test, section_id)?;
        sequencer::reorder(&mut test.sections[idx], entries)?;
        let ordered = test.sections[idx].questions.clone();

        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 分区 {} 已重排 (版本 {})", ctx, section_id, version);
        Ok(Committed {
            version,
            value: ordered,
        })
    }

    /// 替换题目，保留原引用的分值覆盖与标记
    pub async fn replace_question(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        old_question_id: &str,
        request: ReplaceRequest,
    ) -> CatalogResult<Committed<QuestionReference>> {
        let mut summaries = self
            .fetch_summaries(std::slice::from_ref(&request.new_question_id))
            .await?;
        let new_question = summaries
            .pop()
            .ok_or_else(|| CatalogError::malformed("fetch", "批量读取返回为空"))?;

        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = test
            .locate(old_question_id)
            .ok_or_else(|| CatalogError::reference_not_found(test_id, old_question_id))?;
        if request.new_question_id != old_question_id
            && test.locate(&request.new_question_id).is_some()
        {
            return Err(ValidationError::AlreadyInTest {
                question_ids: vec![request.new_question_id],
            }
            .into());
        }

        let section = &test.sections[idx];
        let flags = section
            .questions
            .iter()
            .find(|q| q.question_id == old_question_id)
            .map(ReferenceFlags::from)
            .unwrap_or_default();
        let new_ref = bulk_assembler::snapshot(section, &new_question, flags)?;
        let placed = sequencer::replace(
            &mut test.sections[idx],
            old_question_id,
            new_ref,
            request.keep_seq,
            request.target_seq,
        )?;

        let version = self.commit(ctx, &mut test).await?;
        info!(
            "{} ✓ 题目 {} 替换为 {} (seq {}, 版本 {})",
            ctx, old_question_id, placed.question_id, placed.seq, version
        );
        Ok(Committed {
            version,
            value: placed,
        })
    }

    /// 单题分值覆盖，只影响这一道题
    pub async fn override_marks(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
        question_id: &str,
        patch: MarksOverride,
    ) -> CatalogResult<Committed<QuestionReference>> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let idx = test
            .locate(question_id)
            .ok_or_else(|| CatalogError::reference_not_found(test_id, question_id))?;
        let section = &mut test.sections[idx];
        let pos = section
            .position_of(question_id)
            .ok_or_else(|| CatalogError::reference_not_found(test_id, question_id))?;
        marking::apply_override(&mut section.questions[pos], &patch);
        let updated = section.questions[pos].clone();

        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 题目 {} 分值已更新 (版本 {})", ctx, question_id, version);
        Ok(Committed {
            version,
            value: updated,
        })
    }

    /// 用题库当前数据刷新全部快照字段
    pub async fn resync_snapshots(
        &self,
        ctx: &CallerCtx,
        test_id: &str,
    ) -> CatalogResult<ResyncOutcome> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        let ids: Vec<String> = test
            .flatten()
            .into_iter()
            .map(|(_, r)| r.question_id.clone())
            .collect();
        let fetched = self.questions.fetch(&ids).await?;
        if fetched.len() != ids.len() {
            return Err(CatalogError::malformed(
                "fetch",
                format!("请求 {} 道题，返回 {} 项", ids.len(), fetched.len()),
            ));
        }

        let mut changed = Vec::new();
        let mut missing = Vec::new();
        for (id, item) in ids.iter().zip(fetched) {
            let Some(current) = item else {
                missing.push(id.clone());
                continue;
            };
            let Some(idx) = test.locate(id) else { continue };
            let section = &mut test.sections[idx];
            let Some(pos) = section.position_of(id) else { continue };
            let reference = &mut section.questions[pos];
            if refresh_snapshot(reference, &current.summary()) {
                changed.push(id.clone());
            }
        }

        if changed.is_empty() {
            debug!("{} 试卷 {} 快照无变化", ctx, test_id);
            return Ok(ResyncOutcome {
                version: test.version,
                changed,
                missing,
            });
        }

        let version = self.commit(ctx, &mut test).await?;
        info!(
            "{} ✓ 试卷 {} 快照已同步: 变化 {}, 缺失 {} (版本 {})",
            ctx,
            test_id,
            changed.len(),
            missing.len(),
            version
        );
        Ok(ResyncOutcome {
            version,
            changed,
            missing,
        })
    }

    // ========== 校验与状态 ==========

    /// 完整性检查（任何状态都可调用）
    pub async fn validate(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<ValidationReport> {
        let test = self.structure.load(test_id).await?;
        let report = validator::validate(&test, self.questions.as_ref(), self.check_options(false)).await?;
        if !report.is_valid() {
            info!("{} 试卷 {} 检查发现 {} 项违规", ctx, test_id, report.violations.len());
        }
        Ok(report)
    }

    /// 发布：检查必须完全通过，否则保持草稿
    pub async fn publish(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<Test> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        ensure_transition(&test, TestStatus::Published)?;

        let report = validator::validate(&test, self.questions.as_ref(), self.check_options(true)).await?;
        if !report.is_valid() {
            warn!(
                "{} ⚠️ 试卷 {} 发布被拒: {} 项违规",
                ctx,
                test_id,
                report.violations.len()
            );
            for violation in &report.violations {
                debug!("{}   - {}", ctx, violation);
            }
            return Err(CatalogError::Integrity(report));
        }

        test.status = TestStatus::Published;
        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 试卷 {} 已发布 (版本 {})", ctx, test_id, version);
        Ok(test)
    }

    pub async fn archive(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<Test> {
        let mut test = self.load_for_write(ctx, test_id).await?;
        ensure_transition(&test, TestStatus::Archived)?;
        test.status = TestStatus::Archived;
        let version = self.commit(ctx, &mut test).await?;
        info!("{} ✓ 试卷 {} 已归档 (版本 {})", ctx, test_id, version);
        Ok(test)
    }

    // ========== 读视图 ==========

    /// 预览：不含答案与解析
    pub async fn get_preview(&self, _ctx: &CallerCtx, test_id: &str) -> CatalogResult<TestView> {
        let test = self.structure.load(test_id).await?;
        let contents = projection::fetch_contents(&test, self.questions.as_ref()).await?;
        projection::merge(&test, contents, ContentMode::Preview)
    }

    /// 含答案与解析，受解析开放配置限制
    pub async fn get_with_solutions(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<TestView> {
        let test = self.structure.load(test_id).await?;
        ensure_solutions_released(ctx, &test)?;
        let contents = projection::fetch_contents(&test, self.questions.as_ref()).await?;
        projection::merge(&test, contents, ContentMode::WithSolutions)
    }

    /// 答案表，受解析开放配置限制
    pub async fn get_answer_key(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<AnswerKeyView> {
        let test = self.structure.load(test_id).await?;
        ensure_solutions_released(ctx, &test)?;
        let contents = projection::fetch_contents(&test, self.questions.as_ref()).await?;
        Ok(projection::answer_key(&test, &contents))
    }

    /// 统计，不访问题库
    pub async fn get_stats(&self, _ctx: &CallerCtx, test_id: &str) -> CatalogResult<TestStats> {
        let test = self.structure.load(test_id).await?;
        Ok(projection::stats(&test))
    }

    // ========== 内部辅助 ==========

    /// 加载待修改的试卷，并检查调用方的版本前置条件
    async fn load_for_write(&self, ctx: &CallerCtx, test_id: &str) -> CatalogResult<Test> {
        let test = self.structure.load(test_id).await?;
        if let Some(expected) = ctx.expected_version {
            if expected != test.version {
                warn!(
                    "{} ⚠️ 试卷 {} 已被修改: 期望版本 {}, 当前版本 {}",
                    ctx, test_id, expected, test.version
                );
                return Err(CatalogError::Conflict {
                    test_id: test_id.to_string(),
                    expected,
                    actual: test.version,
                });
            }
        }
        Ok(test)
    }

    /// 写回修改后的试卷，成功后把新版本号写入 `test`
    async fn commit(&self, ctx: &CallerCtx, test: &mut Test) -> CatalogResult<u64> {
        let expected = test.version;
        test.touch();
        let result = self
            .structure
            .compare_and_swap(&test.test_id, expected, test.clone())
            .await;
        match result {
            Ok(version) => {
                test.version = version;
                Ok(version)
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!("{} ⚠️ 写入冲突，需要重新加载: {}", ctx, e);
                }
                Err(e)
            }
        }
    }

    async fn ensure_subject(&self, subject_id: &str) -> CatalogResult<()> {
        if self.taxonomy.subject_exists(subject_id).await? {
            Ok(())
        } else {
            Err(ValidationError::UnknownSubject {
                subject_id: subject_id.to_string(),
            }
            .into())
        }
    }

    async fn ensure_topic(&self, topic_id: &str, subject_id: &str) -> CatalogResult<()> {
        if self.taxonomy.topic_exists(topic_id, subject_id).await? {
            Ok(())
        } else {
            Err(ValidationError::UnknownTopic {
                topic_id: topic_id.to_string(),
                subject_id: subject_id.to_string(),
            }
            .into())
        }
    }

    /// 系列中的下一个套号
    async fn next_test_number(&self, series_id: &str) -> CatalogResult<u32> {
        let page = self
            .structure
            .list(&TestFilter {
                series_id: Some(series_id.to_string()),
                limit: usize::MAX,
                ..Default::default()
            })
            .await?;
        Ok(page.items.iter().map(|t| t.test_number).max().unwrap_or(0) + 1)
    }

    /// 按请求顺序读取题目摘要；缺失的题目一次性列出
    async fn fetch_summaries(&self, ids: &[String]) -> CatalogResult<Vec<QuestionSummary>> {
        let fetched = self.questions.fetch(ids).await?;
        if fetched.len() != ids.len() {
            return Err(CatalogError::malformed(
                "fetch",
                format!("请求 {} 道题，返回 {} 项", ids.len(), fetched.len()),
            ));
        }

        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for (id, item) in ids.iter().zip(fetched) {
            match item {
                Some(content) => found.push(content.summary()),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(NotFoundError::Questions {
                question_ids: missing,
            }
            .into());
        }
        Ok(found)
    }

    fn check_options(&self, for_publish: bool) -> CheckOptions {
        CheckOptions {
            strict_taxonomy: self.strict_taxonomy,
            for_publish,
        }
    }
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

fn section_index(test: &Test, section_id: &str) -> CatalogResult<usize> {
    test.sections
        .iter()
        .position(|s| s.section_id == section_id)
        .ok_or_else(|| CatalogError::section_not_found(&test.test_id, section_id))
}

/// 由请求构造分区；初始引用必须学科一致、互不重复、seq 连续
fn build_section(new_section: NewSection, display_order: u32) -> CatalogResult<Section> {
    let mut seen = BTreeSet::new();
    let repeated: Vec<String> = new_section
        .questions
        .iter()
        .filter(|q| !seen.insert(q.question_id.as_str()))
        .map(|q| q.question_id.clone())
        .collect();
    if !repeated.is_empty() {
        return Err(ValidationError::DuplicateInRequest {
            question_ids: repeated,
        }
        .into());
    }

    for q in &new_section.questions {
        if q.subject_id != new_section.subject_id {
            return Err(ValidationError::SubjectMismatch {
                question_id: q.question_id.clone(),
                expected: new_section.subject_id.clone(),
                actual: q.subject_id.clone(),
            }
            .into());
        }
    }

    let mut section = Section {
        section_id: new_section.section_id,
        section_code: new_section.section_code,
        name: new_section.name,
        display_order,
        subject_id: new_section.subject_id,
        total_questions: 0,
        marking_scheme: new_section.marking_scheme,
        duration_minutes: new_section.duration_minutes,
        is_optional: new_section.is_optional,
        questions: new_section.questions,
    };
    section.refresh_count();
    if !sequencer::is_contiguous(&section) {
        return Err(ValidationError::InvalidPermutation {
            section_id: section.section_id.clone(),
            reason: format!("初始序号不连续: {:?}", sequencer::seq_values(&section)),
        }
        .into());
    }
    section.questions.sort_by_key(|q| q.seq);
    Ok(section)
}

fn ensure_section_unique(sections: &[Section], section: &Section) -> CatalogResult<()> {
    if sections.iter().any(|s| s.section_id == section.section_id) {
        return Err(ValidationError::DuplicateSectionId {
            section_id: section.section_id.clone(),
        }
        .into());
    }
    if sections.iter().any(|s| s.section_code == section.section_code) {
        return Err(ValidationError::DuplicateSectionCode {
            section_code: section.section_code.clone(),
        }
        .into());
    }
    Ok(())
}

/// `order` 必须恰好包含每个分区一次
fn apply_section_order(test: &mut Test, order: &[String]) -> CatalogResult<()> {
    let current: BTreeSet<&str> = test.sections.iter().map(|s| s.section_id.as_str()).collect();
    let requested: BTreeSet<&str> = order.iter().map(String::as_str).collect();
    if requested.len() != order.len() || requested != current {
        return Err(ValidationError::MalformedStructure {
            reason: format!("分区顺序必须恰好覆盖全部分区: {:?}", order),
        }
        .into());
    }
    for section in test.sections.iter_mut() {
        if let Some(pos) = order.iter().position(|id| id == &section.section_id) {
            section.display_order = pos as u32 + 1;
        }
    }
    test.sections.sort_by_key(|s| s.display_order);
    Ok(())
}

fn compact_display_order(test: &mut Test) {
    test.sections.sort_by_key(|s| s.display_order);
    for (i, section) in test.sections.iter_mut().enumerate() {
        section.display_order = i as u32 + 1;
    }
}

fn ensure_transition(test: &Test, to: TestStatus) -> CatalogResult<()> {
    if test.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTransition {
            from: test.status,
            to,
        }
        .into())
    }
}

fn ensure_solutions_released(ctx: &CallerCtx, test: &Test) -> CatalogResult<()> {
    match test.solutions.locked_reason(Utc::now()) {
        Some(reason) => {
            debug!("{} 试卷 {} 解析未开放: {}", ctx, test.test_id, reason);
            Err(CatalogError::SolutionsLocked { reason })
        }
        None => Ok(()),
    }
}

/// 用题库当前字段覆盖快照，返回是否有变化
fn refresh_snapshot(reference: &mut QuestionReference, current: &QuestionSummary) -> bool {
    let changed = reference.question_type != current.question_type
        || reference.subject_id != current.subject_id
        || reference.topic_ids != current.topic_ids
        || reference.difficulty != current.difficulty;
    if changed {
        reference.question_type = current.question_type;
        reference.subject_id = current.subject_id.clone();
        reference.topic_ids = current.topic_ids.clone();
        reference.difficulty = current.difficulty;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionType, SolutionsConfig, TestSettings};

    fn empty_test() -> Test {
        Test {
            test_id: "t1".to_string(),
            code: "T1".to_string(),
            slug: "t1".to_string(),
            series_id: "series".to_string(),
            test_number: 1,
            name: "Test".to_string(),
            description: None,
            sections: Vec::new(),
            settings: TestSettings::default(),
            solutions: SolutionsConfig::default(),
            status: TestStatus::Draft,
            is_active: true,
            tags: Vec::new(),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn new_section(id: &str, code: &str) -> NewSection {
        NewSection {
            section_id: id.to_string(),
            section_code: code.to_string(),
            name: id.to_string(),
            subject_id: "phy".to_string(),
            marking_scheme: Default::default(),
            duration_minutes: None,
            is_optional: false,
            questions: Vec::new(),
        }
    }

    #[test]
    fn test_slug_format() {
        assert!(is_valid_slug("jee-main-2024"));
        assert!(is_valid_slug("mock1"));
        assert!(!is_valid_slug("Mock-1"));
        assert!(!is_valid_slug("mock--1"));
        assert!(!is_valid_slug("-mock"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn test_section_order_must_cover_all_sections() {
        let mut test = empty_test();
        test.sections.push(build_section(new_section("a", "A"), 1).unwrap());
        test.sections.push(build_section(new_section("b", "B"), 2).unwrap());

        assert!(apply_section_order(&mut test, &["a".to_string()]).is_err());
        assert!(apply_section_order(&mut test, &["a".to_string(), "a".to_string()]).is_err());

        apply_section_order(&mut test, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(test.sections[0].section_id, "b");
        assert_eq!(test.sections[0].display_order, 1);
        assert_eq!(test.sections[1].display_order, 2);
    }

    #[test]
    fn test_compact_display_order_after_removal() {
        let mut test = empty_test();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            test.sections
                .push(build_section(new_section(id, &id.to_uppercase()), i as u32 + 1).unwrap());
        }
        test.sections.remove(1);
        compact_display_order(&mut test);
        let orders: Vec<(String, u32)> = test
            .sections
            .iter()
            .map(|s| (s.section_id.clone(), s.display_order))
            .collect();
        assert_eq!(orders, vec![("a".to_string(), 1), ("c".to_string(), 2)]);
    }

    #[test]
    fn test_build_section_rejects_gapped_initial_refs() {
        let mut section = new_section("a", "A");
        section.questions.push(QuestionReference {
            seq: 2,
            question_id: "q1".to_string(),
            question_type: QuestionType::Mcq,
            subject_id: "phy".to_string(),
            topic_ids: Vec::new(),
            difficulty: 1,
            marks: None,
            negative_marks: None,
            is_bonus: false,
            is_optional: false,
        });
        assert!(matches!(
            build_section(section, 1),
            Err(CatalogError::Validation(ValidationError::InvalidPermutation { .. }))
        ));
    }

    #[test]
    fn test_build_section_rejects_repeated_refs() {
        let mut section = new_section("a", "A");
        for seq in [1, 2] {
            section.questions.push(QuestionReference {
                seq,
                question_id: "q1".to_string(),
                question_type: QuestionType::Mcq,
                subject_id: "phy".to_string(),
                topic_ids: Vec::new(),
                difficulty: 1,
                marks: None,
                negative_marks: None,
                is_bonus: false,
                is_optional: false,
            });
        }
        match build_section(section, 1) {
            Err(CatalogError::Validation(ValidationError::DuplicateInRequest { question_ids })) => {
                assert_eq!(question_ids, vec!["q1".to_string()]);
            }
            other => panic!("期望重复错误，实际: {:?}", other.map(|s| s.section_id)),
        }
    }

    #[test]
    fn test_refresh_snapshot_reports_change() {
        let mut reference = QuestionReference {
            seq: 1,
            question_id: "q1".to_string(),
            question_type: QuestionType::Mcq,
            subject_id: "phy".to_string(),
            topic_ids: vec!["optics".to_string()],
            difficulty: 1,
            marks: Some(3.0),
            negative_marks: None,
            is_bonus: false,
            is_optional: false,
        };
        let mut current = QuestionSummary {
            question_id: "q1".to_string(),
            question_type: QuestionType::Mcq,
            subject_id: "phy".to_string(),
            topic_ids: vec!["optics".to_string()],
            difficulty: 1,
            created_at: None,
            is_active: true,
        };
        assert!(!refresh_snapshot(&mut reference, &current));

        current.difficulty = 4;
        assert!(refresh_snapshot(&mut reference, &current));
        assert_eq!(reference.difficulty, 4);
        assert_eq!(reference.marks, Some(3.0));
    }
}
