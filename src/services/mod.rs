pub mod bulk_assembler;
pub mod marking;
pub mod projection;
pub mod sequencer;
pub mod validator;

pub use bulk_assembler::ReferenceFlags;
pub use projection::ContentMode;
pub use validator::CheckOptions;
