// crates/core/src/lib.rs
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod progress;
pub mod ranges;
pub mod result;
pub mod service;
pub mod staging;
pub mod testing;
pub mod workspace;

mod archive;
mod ops;

pub use config::*;
pub use dispatch::*;
pub use engine::*;
pub use error::*;
pub use manifest::*;
pub use progress::*;
pub use ranges::*;
pub use result::*;
pub use service::*;
pub use staging::*;
pub use workspace::*;
