//! Pipeline module.
//!
//! Chains reader, profiler, cleaner, artifact writers and sinks for one table
//! at a time.

mod executor;
pub mod stage;

pub use executor::TablePipeline;
pub use stage::EtlStage;
