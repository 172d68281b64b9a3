pub mod blueprint;
pub mod loaders;
pub mod question;
pub mod request;
pub mod view;

pub use blueprint::{FillRule, SectionBlueprint, TestBlueprint};
pub use loaders::{load_all_blueprints, load_blueprint};
pub use question::{AnswerKey, OptionDoc, QuestionContent, QuestionSummary, QuestionType, SolutionDoc};
pub use request::{
    AddQuestionsRequest, BulkAddRequest, BulkCriteria, DifficultyRange, DiscoveryOrder,
    MarksOverride, NewSection, NewTest, QuestionQuery, ReorderEntry, ReplaceRequest, SectionPatch,
    SelectionStrategy, SortField, SortOrder, TestFilter, TestMetadataUpdate,
};
pub use test::{
    MarkingRule, MarkingScheme, QuestionReference, ReleaseMode, Section, SolutionsConfig, Test,
    TestSettings, TestStatus,
};
pub use view::{
    AnswerKeyEntry, AnswerKeyView, BulkAddOutcome, Committed, MergedQuestion, QuestionBody,
    ResolvedMarks, ResyncOutcome, SectionStats, SectionView, TestPage, TestStats, TestView,
    ValidationReport, Violation,
};
