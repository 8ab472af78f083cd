//! Per-node query outcomes and their classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;
use crate::protocol::{GetReply, RawResponse};

/// Result of querying a single node for the test key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Node resolved the key to the expected value
    Success { value: String, hop_count: u64 },
    /// Node answered 200 with a different (or missing) value
    WrongValue { returned_value: Option<String> },
    /// Node answered with a non-200 status
    HttpError { status_code: u16 },
    /// No connection could be made
    Unreachable { reason: String },
    /// Any other transport or protocol failure
    OtherError { message: String },
}

impl QueryOutcome {
    /// Classify a finished exchange against the expected value
    ///
    /// Priority: unreachable, other transport failure, bad status, wrong
    /// value, success. A malformed body on a 200 is an `OtherError`.
    pub fn classify(
        response: Result<RawResponse, TransportError>,
        expected_value: &str,
    ) -> Self {
        let response = match response {
            Ok(r) => r,
            Err(TransportError::Unreachable(reason)) => {
                return QueryOutcome::Unreachable { reason };
            }
            Err(other) => {
                return QueryOutcome::OtherError {
                    message: other.to_string(),
                };
            }
        };

        if !response.is_ok() {
            return QueryOutcome::HttpError {
                status_code: response.status,
            };
        }

        let reply = match GetReply::decode(&response.body) {
            Ok(reply) => reply,
            Err(message) => return QueryOutcome::OtherError { message },
        };

        if !reply.value_matches(expected_value) {
            return QueryOutcome::WrongValue {
                returned_value: reply.value_text(),
            };
        }

        match reply.hop_count() {
            Ok(hop_count) => QueryOutcome::Success {
                value: expected_value.to_string(),
                hop_count,
            },
            Err(message) => QueryOutcome::OtherError { message },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryOutcome::Success { .. })
    }

    /// Hops contributed to the total; zero for every failure
    pub fn hops(&self) -> u64 {
        match self {
            QueryOutcome::Success { hop_count, .. } => *hop_count,
            _ => 0,
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Success { hop_count, .. } => write!(f, "found in {} hops", hop_count),
            QueryOutcome::WrongValue {
                returned_value: Some(v),
            } => write!(f, "wrong value returned ({:?})", v),
            QueryOutcome::WrongValue {
                returned_value: None,
            } => write!(f, "wrong value returned (no value)"),
            QueryOutcome::HttpError { status_code } => write!(f, "HTTP error {}", status_code),
            QueryOutcome::Unreachable { reason } => {
                write!(f, "node unreachable (is it running?): {}", reason)
            }
            QueryOutcome::OtherError { message } => write!(f, "error: {}", message),
        }
    }
}

/// Outcome of one node in the sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeQuery {
    /// Index in the swept range
    pub index: usize,
    /// Port the node was queried on
    pub port: u16,
    #[serde(flatten)]
    pub outcome: QueryOutcome,
    /// Wall-clock time of the exchange
    #[serde(with = "humantime_serde")]
    pub latency: Duration,
}
