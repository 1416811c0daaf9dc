//! Stage orchestration (spec §4.8): the common runner every S1-S12 stage
//! binary drives through, plus signal-driven graceful shutdown.

mod cascade_builder;
pub mod llm;
mod runner;
mod shutdown;

pub use cascade_builder::build_cascade;
pub use runner::{run_fanout_stage, run_stage, StageConfig, StageSummary};
pub use shutdown::{watch as watch_shutdown, ShutdownFlag};
