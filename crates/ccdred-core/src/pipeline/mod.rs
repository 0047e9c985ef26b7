pub mod config;
mod orchestrator;
mod types;

pub use config::{CalibrationConfig, OutputConfig, RunConfig};
pub use orchestrator::{
    build_masters, build_masters_reported, calibrated_path, reduce_science_reported,
    run_pipeline, run_pipeline_reported, Masters,
};
pub use types::{
    CalibrationSummary, NoOpReporter, PipelineStage, ProgressReporter, ReductionSummary,
    RunSummary,
};
