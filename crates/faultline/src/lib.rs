#![allow(clippy::must_use_candidate)]

mod config;
mod fault;
mod middleware;
mod trail;

pub use config::FaultConfig;
pub use fault::Fault;
pub use middleware::fault_middleware;
pub use trail::{FaultTrail, MiddlewareNotInstalled};
