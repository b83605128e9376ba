// Trade → withdraw → stake workflow and the polling loop driving it
pub mod controller;
pub mod pipeline;

pub use controller::{ControllerSettings, TickOutcome, WorkflowController};
pub use pipeline::{PipelineOutcome, PipelineSettings, StakePipeline};
