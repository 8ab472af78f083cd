//! Experiment configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ExperimentError, Result};
use crate::protocol::NodeAddress;

/// Experiment configuration
///
/// Fixed for the lifetime of a run and handed to the driver at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Host every node listens on
    pub host: String,
    /// Port of node 0 in the swept range
    pub base_port: u16,
    /// Port of the node that receives the initial write
    pub store_port: u16,
    /// Key stored and looked up
    pub key: String,
    /// Value stored under `key` and expected back from every node
    pub value: String,
    /// Timeout for the single store request
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Timeout for each query request
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,
    /// Bound on opening a connection; half the shorter request timeout if unset
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    /// Pause after a successful store, to let replication settle
    #[serde(with = "humantime_serde")]
    pub settle_duration: Duration,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            base_port: 8000,
            store_port: 8002,
            key: "123".to_string(),
            value: "Mustafa".to_string(),
            store_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(2),
            connect_timeout: None,
            settle_duration: Duration::from_secs(1),
        }
    }
}

impl ExperimentConfig {
    /// Create a configuration for local testing: loopback host, no settle pause
    pub fn local_test(base_port: u16, store_port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port,
            store_port,
            store_timeout: Duration::from_secs(2),
            query_timeout: Duration::from_secs(1),
            connect_timeout: Some(Duration::from_millis(300)),
            settle_duration: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Address of the store-target node
    pub fn store_address(&self) -> NodeAddress {
        NodeAddress::new(&self.host, self.store_port)
    }

    /// Address of the node at `index` in the swept range, if it fits in the port space
    pub fn node_address(&self, index: usize) -> Option<NodeAddress> {
        let port = usize::from(self.base_port).checked_add(index)?;
        u16::try_from(port)
            .ok()
            .map(|port| NodeAddress::new(&self.host, port))
    }

    /// Addresses of nodes `0..node_count`
    pub fn swept_range(&self, node_count: usize) -> Result<Vec<NodeAddress>> {
        (0..node_count)
            .map(|index| {
                self.node_address(index).ok_or_else(|| {
                    ExperimentError::Config(format!(
                        "{} nodes starting at port {} exceed the port range",
                        node_count, self.base_port
                    ))
                })
            })
            .collect()
    }

    /// Time allowed for opening a connection
    ///
    /// Must fire before the request timeout so a node that never accepts is
    /// reported as unreachable, not slow.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
            .unwrap_or_else(|| self.store_timeout.min(self.query_timeout) / 2)
    }

    /// Check the configuration before any network activity
    pub fn validate(&self, node_count: usize) -> Result<()> {
        if node_count == 0 {
            return Err(ExperimentError::Config(
                "node count must be at least 1".to_string(),
            ));
        }
        self.swept_range(node_count)?;
        if self.host.is_empty() {
            return Err(ExperimentError::Config("host must not be empty".to_string()));
        }
        if self.key.is_empty() || self.value.is_empty() {
            return Err(ExperimentError::Config(
                "key and value must not be empty".to_string(),
            ));
        }
        if self.store_timeout.is_zero() || self.query_timeout.is_zero() {
            return Err(ExperimentError::Config(
                "request timeouts must be non-zero".to_string(),
            ));
        }
        let connect_timeout = self.connect_timeout();
        if connect_timeout.is_zero()
            || connect_timeout >= self.store_timeout
            || connect_timeout >= self.query_timeout
        {
            return Err(ExperimentError::Config(format!(
                "connect timeout {:?} must be non-zero and shorter than both request timeouts",
                connect_timeout
            )));
        }
        Ok(())
    }
}
