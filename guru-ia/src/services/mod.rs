//! Service layer for guru-ia

pub mod job_queue;
pub mod model_gateway;
pub mod pipeline;
pub mod prompt_library;
pub mod reference;
pub mod result_sink;

pub use job_queue::{AnalysisJob, JobQueue};
pub use model_gateway::{AzureChatModel, ChatModel, ModelError};
pub use pipeline::ClassificationPipeline;
pub use prompt_library::PromptLibrary;
pub use reference::ReferenceTables;
pub use result_sink::ResultSink;
