// crates/jobs/src/lib.rs
//! Background execution for prepared jobs: a versioned record store, an
//! in-process task queue, a bounded worker pool, and the manager that ties
//! them to the orchestration service.

pub mod manager;
pub mod queue;
pub mod record;
pub mod store;
pub mod worker;

pub use manager::*;
pub use queue::*;
pub use record::*;
pub use store::*;
pub use worker::*;
