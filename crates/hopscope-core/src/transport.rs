//! Node transport
//!
//! The driver talks to nodes only through [`NodeClient`], one request at a
//! time. [`HttpNodeClient`] is the production implementation over `reqwest`.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::protocol::{Endpoint, GetRequest, NodeAddress, RawResponse, StoreRequest};

/// Access to the two node endpoints the harness consumes
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `POST /store` on `addr`
    async fn store(
        &self,
        addr: &NodeAddress,
        request: &StoreRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;

    /// `POST /get` on `addr`
    async fn get(
        &self,
        addr: &NodeAddress,
        request: &GetRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// HTTP client for DHT node APIs
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    /// Client whose connection attempts give up after `connect_timeout`
    ///
    /// Keep `connect_timeout` below every per-request timeout, otherwise a
    /// node that never accepts surfaces as a request timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hopscope/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn post<T: serde::Serialize + Sync>(
        &self,
        addr: &NodeAddress,
        endpoint: Endpoint,
        body: &T,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let url = addr.url(endpoint);
        trace!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn store(
        &self,
        addr: &NodeAddress,
        request: &StoreRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        self.post(addr, Endpoint::Store, request, timeout).await
    }

    async fn get(
        &self,
        addr: &NodeAddress,
        request: &GetRequest,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        self.post(addr, Endpoint::Get, request, timeout).await
    }
}

/// Map a `reqwest` failure onto the harness's transport taxonomy
///
/// Connect failures (including connect timeouts) and connections the peer
/// dropped before answering come first, so that a dead node is always
/// reported as unreachable rather than slow.
fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_connect() || connection_lost(&err) {
        TransportError::Unreachable(error_chain(&err))
    } else if err.is_timeout() {
        TransportError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        }
    } else {
        TransportError::Protocol(error_chain(&err))
    }
}

/// Whether the peer closed or reset the connection mid-exchange
fn connection_lost(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
