//! poliSEE core: agent-based simulation of economic policy side effects.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod narrative;
pub mod policy;
pub mod population;
pub mod request;
pub mod rng;
pub mod snapshot;
pub mod types;
