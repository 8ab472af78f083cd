//! Experiment driver
//!
//! Runs the three phases of a hop-count measurement against a DHT cluster:
//!
//! 1. **Store**: write the test key once to the store-target node. Any failure
//!    here is fatal and no query is ever issued.
//! 2. **Query sweep**: ask every node in the swept range for the key, strictly
//!    in index order with one request in flight. Per-node failures are
//!    recorded and never stop the sweep.
//! 3. **Aggregate**: fold the outcomes into an [`ExperimentSummary`].

use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::error::{ExperimentError, Result};
use crate::outcome::{NodeQuery, QueryOutcome};
use crate::protocol::{GetRequest, StoreReply, StoreRequest};
use crate::summary::{ExperimentReport, ExperimentSummary, StoreAck};
use crate::transport::{HttpNodeClient, NodeClient};

/// Result of the store phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// HTTP 200 with a truthy `success` flag
    Stored {
        message: Option<String>,
        key_hash: Option<String>,
    },
    /// The node answered, but did not acknowledge the write
    Rejected { status: u16, body: String },
    /// No usable answer (connection error, timeout, undecodable body)
    Failed { reason: String },
}

/// Drives one experiment run against a cluster
pub struct ExperimentDriver<C> {
    config: ExperimentConfig,
    client: C,
}

impl ExperimentDriver<HttpNodeClient> {
    /// Driver talking HTTP to real nodes
    pub fn http(config: ExperimentConfig) -> Result<Self> {
        let client = HttpNodeClient::new(config.connect_timeout())?;
        Ok(Self::new(config, client))
    }
}

impl<C: NodeClient> ExperimentDriver<C> {
    pub fn new(config: ExperimentConfig, client: C) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run all three phases for `node_count` nodes
    ///
    /// Returns an error only for configuration problems and store failures;
    /// query failures are part of the report.
    pub async fn run(&self, node_count: usize) -> Result<ExperimentReport> {
        self.config.validate(node_count)?;

        let started_at = Utc::now();
        let start = Instant::now();
        let key = self.config.key.clone();
        let value = self.config.value.clone();
        let store_port = self.config.store_port;

        info!("--- STARTING EXPERIMENT (Nodes: {}) ---", node_count);
        info!("[1/3] Storing key '{}' on node {}...", key, store_port);

        let store = match self.store(&key, &value).await {
            StoreOutcome::Stored { message, key_hash } => {
                info!("      Store successful.");
                StoreAck {
                    port: store_port,
                    message,
                    key_hash,
                }
            }
            StoreOutcome::Rejected { status, body } => {
                return Err(ExperimentError::StoreRejected {
                    port: store_port,
                    status,
                    body,
                });
            }
            StoreOutcome::Failed { reason } => {
                return Err(ExperimentError::StoreFailed {
                    port: store_port,
                    reason,
                });
            }
        };

        // Heuristic only: nothing confirms replication has finished
        if !self.config.settle_duration.is_zero() {
            debug!(
                "Waiting {:?} for replication to settle",
                self.config.settle_duration
            );
            tokio::time::sleep(self.config.settle_duration).await;
        }

        info!("[2/3] Querying '{}' from all {} nodes...", key, node_count);
        let results = self.query_all(&key, &value, node_count).await?;

        info!("[3/3] Results Analysis");
        let summary = Self::summarize(&results);

        Ok(ExperimentReport {
            started_at,
            elapsed: start.elapsed(),
            key,
            store,
            summary,
            results,
        })
    }

    /// Write `key = value` to the store-target node
    pub async fn store(&self, key: &str, value: &str) -> StoreOutcome {
        let addr = self.config.store_address();
        let request = StoreRequest {
            key: key.to_string(),
            value: value.to_string(),
        };

        let response = match self
            .client
            .store(&addr, &request, self.config.store_timeout)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("      Connection to {} failed: {}", addr, e);
                return StoreOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if !response.is_ok() {
            warn!("      Store failed: HTTP {} {}", response.status, response.text());
            return StoreOutcome::Rejected {
                status: response.status,
                body: response.text(),
            };
        }

        match StoreReply::decode(&response.body) {
            Ok(reply) if reply.acknowledged() => {
                if let Some(hash) = &reply.key_hash {
                    debug!("Key '{}' stored under hash {}", key, hash);
                }
                StoreOutcome::Stored {
                    message: reply.message,
                    key_hash: reply.key_hash,
                }
            }
            Ok(_) => {
                warn!("      Store failed: {}", response.text());
                StoreOutcome::Rejected {
                    status: response.status,
                    body: response.text(),
                }
            }
            Err(reason) => {
                warn!("      Store reply unreadable: {}", reason);
                StoreOutcome::Failed { reason }
            }
        }
    }

    /// Query nodes `0..node_count` in order and classify each answer
    ///
    /// Returns exactly `node_count` results. A range running past the end of
    /// the port space is a configuration error and nothing is sent.
    pub async fn query_all(
        &self,
        key: &str,
        expected_value: &str,
        node_count: usize,
    ) -> Result<Vec<NodeQuery>> {
        let addrs = self.config.swept_range(node_count)?;
        let request = GetRequest {
            key: key.to_string(),
        };
        let mut results = Vec::with_capacity(node_count);

        for (index, addr) in addrs.into_iter().enumerate() {
            let start = Instant::now();
            let response = self
                .client
                .get(&addr, &request, self.config.query_timeout)
                .await;
            let latency = start.elapsed();
            let outcome = QueryOutcome::classify(response, expected_value);

            match &outcome {
                QueryOutcome::Success { hop_count, .. } => {
                    debug!("    Node {}: found in {} hops", addr.port, hop_count);
                }
                QueryOutcome::WrongValue { returned_value } => {
                    warn!(
                        "    Node {}: wrong value returned! ({})",
                        addr.port,
                        returned_value.as_deref().unwrap_or("no value")
                    );
                }
                QueryOutcome::Unreachable { .. } => {
                    warn!("    Node {}: node unreachable (is it running?)", addr.port);
                }
                QueryOutcome::HttpError { status_code } => {
                    warn!("    Node {}: HTTP {}", addr.port, status_code);
                }
                QueryOutcome::OtherError { message } => {
                    warn!("    Node {}: error {}", addr.port, message);
                }
            }

            results.push(NodeQuery {
                index,
                port: addr.port,
                outcome,
                latency,
            });
        }

        Ok(results)
    }

    /// Aggregate sweep results
    pub fn summarize(results: &[NodeQuery]) -> ExperimentSummary {
        ExperimentSummary::summarize(results)
    }
}
