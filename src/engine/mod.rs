//! Run orchestration: the fetch → scan → execute pipeline and bet execution.

pub mod executor;
pub mod pipeline;

pub use executor::{ExecutionReport, Executor};
pub use pipeline::{Pipeline, PipelineOptions, RunReport, StepRecord};
