//! Entity models for the tables shared with the dispatcher.

pub mod analysis;
pub mod conversation;
pub mod result;

pub use analysis::Analysis;
pub use conversation::Conversation;
pub use result::AnalysisResult;
