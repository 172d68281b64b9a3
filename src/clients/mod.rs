pub mod http_client;
pub mod memory;
pub mod question_store;

pub use http_client::{HttpClient, HttpQuestionStore, HttpTaxonomyStore};
pub use memory::{InMemoryDependents, InMemoryQuestionStore, InMemoryTaxonomy};
pub use question_store::{DependentRegistry, NoDependents, QuestionStore, TaxonomyStore};
