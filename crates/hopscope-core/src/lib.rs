//! Hopscope Core - hop-count measurement for DHT clusters
//!
//! This crate measures how many routing hops the nodes of a DHT cluster need
//! to resolve a key. The cluster is treated as a black box reachable through
//! two HTTP endpoints on every node: `POST /store` and `POST /get`.
//!
//! # Overview
//!
//! A run has three sequential phases:
//!
//! - **Store**: write one key/value pair to a designated node
//! - **Query sweep**: ask every node in a contiguous port range for the key
//! - **Aggregate**: count successes and failures, average the hop counts
//!
//! # Example
//!
//! ```rust,no_run
//! use hopscope_core::{ExperimentConfig, ExperimentDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = ExperimentDriver::http(ExperimentConfig::default())?;
//!     let report = driver.run(10).await?;
//!
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod outcome;
pub mod protocol;
pub mod summary;
pub mod transport;

// Re-exports
pub use config::ExperimentConfig;
pub use driver::{ExperimentDriver, StoreOutcome};
pub use error::{ExperimentError, Result, TransportError};
pub use outcome::{NodeQuery, QueryOutcome};
pub use protocol::{Endpoint, GetReply, GetRequest, NodeAddress, RawResponse, StoreReply, StoreRequest};
pub use summary::{ExperimentReport, ExperimentSummary, StoreAck};
pub use transport::{HttpNodeClient, NodeClient};
