//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod analysis_repo;
pub mod conversation_repo;
pub mod result_repo;

pub use analysis_repo::AnalysisRepo;
pub use conversation_repo::ConversationRepo;
pub use result_repo::ResultRepo;
