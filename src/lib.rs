pub mod config;
pub mod error;
pub mod entity;
pub mod grammar;
pub mod graph;
pub mod db;
pub mod store;
pub mod ingest;
pub mod export;

pub use config::Config;
pub use error::{DepgraphError, Result};
pub use entity::{decode, Entity, Kind, Provider};
pub use graph::{build, build_with, load, Batch, Filters, Graph, GraphConfig, Task};
