pub mod catalog;
pub mod ctx;

pub use catalog::TestCatalog;
pub use ctx::CallerCtx;
