// modgraph-core/src/frontier/mod.rs
pub mod engine;
mod worker;

pub use engine::{EngineOptions, FrontierEngine};
