// src/config/mod.rs
pub mod env;
pub mod pipeline;

pub use env::{BatchEnv, ProducerEnv};
pub use pipeline::{NewsSchedule, PipelineConfig, QuoteSchedule};
