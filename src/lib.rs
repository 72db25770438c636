#![forbid(unsafe_code)]

pub mod audit;
pub mod cache;
pub mod cli;
pub mod compare;
pub mod encode;
pub mod error;
pub mod escape;
pub mod evidence;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod validate;

pub use error::{PackError, PackResult};
pub use model::{RunConfig, RunSummary, Variant};
pub use orchestrator::{EvidencePipeline, PipelineStage, run_pipeline};
