//! Hop-count aggregation and the final report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::outcome::NodeQuery;

const RULE: &str = "---------------------------------------------";

/// Aggregate over every node queried in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub node_count: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    /// Sum of hop counts over successful queries only
    pub total_hops: u64,
    /// `total_hops / successful_count`, `None` when nothing succeeded
    pub average_hops: Option<f64>,
}

impl ExperimentSummary {
    /// Fold per-node outcomes into a summary. Never fails.
    pub fn summarize(results: &[NodeQuery]) -> Self {
        let successful_count = results.iter().filter(|q| q.outcome.is_success()).count();
        let total_hops: u64 = results.iter().map(|q| q.outcome.hops()).sum();

        let average_hops = if successful_count > 0 {
            Some(total_hops as f64 / successful_count as f64)
        } else {
            None
        };

        Self {
            node_count: results.len(),
            successful_count,
            failed_count: results.len() - successful_count,
            total_hops,
            average_hops,
        }
    }
}

impl fmt::Display for ExperimentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Total Nodes Tested:  {}", self.node_count)?;
        writeln!(f, "Successful Queries:  {}", self.successful_count)?;
        writeln!(f, "Failed Queries:      {}", self.failed_count)?;
        match self.average_hops {
            Some(avg) => {
                writeln!(f, "{}", RULE)?;
                writeln!(f, "Total Hops Accumulated: {}", self.total_hops)?;
                writeln!(f, "AVERAGE HOP COUNT:      {:.4}", avg)?;
                write!(f, "{}", RULE)
            }
            None => write!(f, "No successful queries. Cannot calculate average."),
        }
    }
}

/// Acknowledgement returned by the store-target node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreAck {
    pub port: u16,
    pub message: Option<String>,
    pub key_hash: Option<String>,
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub key: String,
    pub store: StoreAck,
    pub summary: ExperimentSummary,
    pub results: Vec<NodeQuery>,
}
